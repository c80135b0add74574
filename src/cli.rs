//! Argument parsing shared by `canopy-train` and `canopy-evaluate`.
//!
//! Both stages take exactly one required flag, `--timestamp <value>`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CliError {
    #[error("--timestamp requires a value")]
    MissingValue,
    #[error("--timestamp must not be empty")]
    EmptyTimestamp,
    #[error("--timestamp given more than once")]
    DuplicateTimestamp,
    #[error("Unknown argument: {arg}\n\n{help}")]
    UnknownArgument { arg: String, help: String },
    #[error("--timestamp is required\n\n{0}")]
    MissingTimestamp(String),
}

/// What a stage binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run { timestamp: String },
    Help(String),
}

/// Parse the arguments after the program name.
pub fn parse_args(program: &str, summary: &str, args: Vec<String>) -> Result<Command, CliError> {
    let mut timestamp: Option<String> = None;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let value = match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help(help_text(program, summary))),
            "--timestamp" => iter.next().ok_or(CliError::MissingValue)?,
            other => match other.strip_prefix("--timestamp=") {
                Some(value) => value.to_string(),
                None => {
                    return Err(CliError::UnknownArgument {
                        arg: arg.clone(),
                        help: help_text(program, summary),
                    });
                }
            },
        };
        if value.trim().is_empty() {
            return Err(CliError::EmptyTimestamp);
        }
        if timestamp.replace(value).is_some() {
            return Err(CliError::DuplicateTimestamp);
        }
    }
    timestamp
        .map(|timestamp| Command::Run { timestamp })
        .ok_or_else(|| CliError::MissingTimestamp(help_text(program, summary)))
}

pub fn help_text(program: &str, summary: &str) -> String {
    [
        program.to_string(),
        String::new(),
        summary.to_string(),
        String::new(),
        "Usage:".to_string(),
        format!("  {program} --timestamp <value>"),
        String::new(),
        "Options:".to_string(),
        "  --timestamp <value>  Token naming this run's artifacts (required).".to_string(),
        "  -h, --help           Show this help.".to_string(),
        String::new(),
        format!(
            "Paths resolve against the current directory or ${}.",
            crate::app_dirs::HOME_ENV_VAR
        ),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, CliError> {
        parse_args(
            "canopy-train",
            "Trains the model.",
            args.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn accepts_separate_and_inline_values() {
        let expected = Command::Run {
            timestamp: "20240101_000000".to_string(),
        };
        assert_eq!(parse(&["--timestamp", "20240101_000000"]).unwrap(), expected);
        assert_eq!(parse(&["--timestamp=20240101_000000"]).unwrap(), expected);
    }

    #[test]
    fn timestamp_is_required() {
        assert!(matches!(parse(&[]), Err(CliError::MissingTimestamp(_))));
        assert_eq!(parse(&["--timestamp"]), Err(CliError::MissingValue));
        assert_eq!(parse(&["--timestamp", " "]), Err(CliError::EmptyTimestamp));
    }

    #[test]
    fn rejects_extra_arguments() {
        assert!(matches!(
            parse(&["--timestamp", "a", "--seed", "1"]),
            Err(CliError::UnknownArgument { .. })
        ));
        assert_eq!(
            parse(&["--timestamp", "a", "--timestamp", "b"]),
            Err(CliError::DuplicateTimestamp)
        );
    }

    #[test]
    fn help_wins_over_missing_timestamp() {
        match parse(&["--help"]).unwrap() {
            Command::Help(text) => assert!(text.contains("--timestamp <value>")),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

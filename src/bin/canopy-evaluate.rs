//! Evaluation stage: score a trained model and write its metrics report.

use canopy::cli::{self, Command};
use canopy::config::Settings;
use canopy::pipeline::{self, SplitCheck};
use canopy::{PipelineError, logging};

const PROGRAM: &str = "canopy-evaluate";
const SUMMARY: &str = "Scores the model saved under a timestamp against the stored test split and writes a metrics report.";

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), PipelineError> {
    let timestamp = match cli::parse_args(PROGRAM, SUMMARY, std::env::args().skip(1).collect())? {
        Command::Run { timestamp } => timestamp,
        Command::Help(text) => {
            println!("{text}");
            return Ok(());
        }
    };
    let settings = Settings::load()?;
    if let Err(err) = logging::init(&settings, "evaluate") {
        eprintln!("Logging disabled: {err}");
    }
    println!("Evaluating model for timestamp {timestamp}");

    let summary = pipeline::run_evaluation(&settings, &timestamp)?;
    if summary.split_check == SplitCheck::Mismatch {
        println!("warning: test split was replaced by a later training run");
    }
    println!(
        "accuracy: {:.4}  f1_score: {:.4}  ({} rows)",
        summary.metrics.accuracy, summary.metrics.f1_score, summary.rows
    );
    println!("Metrics saved → {}", summary.metrics_path.display());
    Ok(())
}

//! Tracing setup for `canopy-train` and `canopy-evaluate`.
//!
//! Events go to stderr and to `logs/canopy_<stage>_<local time>.log`. Stdout is left
//! to the progress lines the binaries print. Only the newest [`MAX_LOG_FILES`] logs
//! are kept.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::OnceLock,
    time::SystemTime,
};

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::{app_dirs, config::Settings};

pub const MAX_LOG_FILES: usize = 10;
const LOG_FILE_PREFIX: &str = "canopy";
const DEFAULT_FILTER: &str = "info";

static FILE_WRITER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Cannot use log directory: {0}")]
    CreateDir(#[from] app_dirs::AppDirError),
    #[error("Cannot open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot prune old logs at {path}: {source}")]
    Prune {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot format log file time: {0}")]
    FormatTime(#[from] time::error::Format),
    #[error("A global tracing subscriber is already installed: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install the global subscriber for one stage run.
///
/// A second call in the same process does nothing. Callers treat an error as
/// "run without logs" rather than a reason to stop.
pub fn init(settings: &Settings, stage: &str) -> Result<(), LoggingError> {
    if FILE_WRITER_GUARD.get().is_some() {
        return Ok(());
    }

    let dir = app_dirs::ensure_dir(&settings.logs_dir())?;
    let file_name = log_file_name(stage, now_local_or_utc())?;
    let path = touch(&dir.join(&file_name))?;
    let (file_writer, guard) = tracing_appender::non_blocking(rolling::never(&dir, &file_name));
    prune_old_logs(&dir, MAX_LOG_FILES)?;

    let timer = local_timer();
    let subscriber = Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .with(
            fmt::layer()
                .with_timer(timer.clone())
                .with_writer(std::io::stderr),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(file_writer),
        );
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = FILE_WRITER_GUARD.set(guard);

    tracing::info!(stage, log = %path.display(), "Logging to file");
    Ok(())
}

/// Local wall-clock time, or UTC when the local offset cannot be determined.
pub fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn touch(path: &Path) -> Result<PathBuf, LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::OpenFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(path.to_path_buf())
}

/// Delete the oldest `.log` files in `dir` until at most `keep` remain.
fn prune_old_logs(dir: &Path, keep: usize) -> Result<(), LoggingError> {
    let prune_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| LoggingError::Prune { path, source }
    };
    let mut logs: Vec<(SystemTime, PathBuf)> = fs::read_dir(dir)
        .map_err(prune_err(dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "log"))
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect();
    logs.sort();

    let excess = logs.len().saturating_sub(keep);
    for (_, path) in logs.into_iter().take(excess) {
        fs::remove_file(&path).map_err(prune_err(&path))?;
    }
    Ok(())
}

fn log_file_name(stage: &str, now: OffsetDateTime) -> Result<String, LoggingError> {
    const STAMP: &[FormatItem<'_>] =
        format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    Ok(format!("{LOG_FILE_PREFIX}_{stage}_{}.log", now.format(STAMP)?))
}

fn local_timer() -> fmt::time::OffsetTime<&'static [FormatItem<'static>]> {
    const EVENT_TIME: &[FormatItem<'static>] =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, EVENT_TIME)
}

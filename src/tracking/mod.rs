//! Local file-backed experiment tracking.
//!
//! Layout under the tracking root (`mlruns/` by default):
//!
//! ```text
//! <experiment_id>/meta.json
//! <experiment_id>/<run_id>/meta.json
//! <experiment_id>/<run_id>/params/<key>    raw value
//! <experiment_id>/<run_id>/metrics/<key>   "<unix_ms> <value> <step>" per line
//! <experiment_id>/<run_id>/tags/<key>      raw value
//! ```

mod run;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use crate::app_dirs::{self, AppDirError};

pub use run::{ActiveRun, MetricPoint, RunMeta, RunRecord, RunStatus};

const META_FILE_NAME: &str = "meta.json";

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error(transparent)]
    Dir(#[from] AppDirError),
    #[error("Tracking store IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid tracking metadata at {path}: {source}")]
    Meta {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid tracking key {0:?}")]
    InvalidKey(String),
    #[error("Param {key} already logged as {existing:?}, refusing to overwrite with {new:?}")]
    ParamConflict {
        key: String,
        existing: String,
        new: String,
    },
    #[error("Malformed metric line in {path}: {line:?}")]
    MalformedMetric { path: PathBuf, line: String },
    #[error("Failed to format experiment time: {0}")]
    FormatTime(#[from] time::error::Format),
}

/// Metadata persisted for each experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentMeta {
    pub experiment_id: String,
    pub name: String,
    pub artifact_location: PathBuf,
    pub lifecycle_stage: String,
    /// Unix milliseconds.
    pub creation_time: u64,
}

/// Handle on a tracking store directory.
#[derive(Debug, Clone)]
pub struct Tracker {
    root: PathBuf,
}

impl Tracker {
    /// Open (and create if needed) the store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, TrackingError> {
        let root = app_dirs::ensure_dir(&root.into())?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the experiment called `name`, creating it when absent.
    pub fn set_experiment(&self, name: &str) -> Result<Experiment, TrackingError> {
        if let Some(existing) = self.experiments()?.into_iter().find(|meta| meta.name == name) {
            return Ok(Experiment {
                dir: self.root.join(&existing.experiment_id),
                meta: existing,
            });
        }
        let experiment_id = self.next_experiment_id()?.to_string();
        let dir = app_dirs::ensure_dir(&self.root.join(&experiment_id))?;
        let meta = ExperimentMeta {
            experiment_id,
            name: name.to_string(),
            artifact_location: dir.clone(),
            lifecycle_stage: "active".to_string(),
            creation_time: now_ms(),
        };
        write_meta(&dir.join(META_FILE_NAME), &meta)?;
        tracing::info!(experiment = %meta.name, id = %meta.experiment_id, "Created experiment");
        Ok(Experiment { meta, dir })
    }

    /// Every experiment in the store, ordered by id.
    pub fn experiments(&self) -> Result<Vec<ExperimentMeta>, TrackingError> {
        let mut out = Vec::new();
        for (_, dir) in self.numbered_dirs()? {
            let meta_path = dir.join(META_FILE_NAME);
            if meta_path.is_file() {
                out.push(read_meta(&meta_path)?);
            }
        }
        Ok(out)
    }

    /// Load a run with its params, metrics and tags.
    pub fn load_run(&self, experiment_id: &str, run_id: &str) -> Result<RunRecord, TrackingError> {
        RunRecord::load(&self.root.join(experiment_id).join(run_id))
    }

    fn next_experiment_id(&self) -> Result<u64, TrackingError> {
        Ok(self
            .numbered_dirs()?
            .last()
            .map(|(id, _)| id + 1)
            .unwrap_or(1))
    }

    fn numbered_dirs(&self) -> Result<Vec<(u64, PathBuf)>, TrackingError> {
        let entries = std::fs::read_dir(&self.root).map_err(|source| TrackingError::Io {
            path: self.root.clone(),
            source,
        })?;
        let mut dirs: Vec<(u64, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false))
            .filter_map(|entry| {
                let id = entry.file_name().to_str()?.parse::<u64>().ok()?;
                Some((id, entry.path()))
            })
            .collect();
        dirs.sort();
        Ok(dirs)
    }
}

/// An experiment that runs can be started under.
#[derive(Debug, Clone)]
pub struct Experiment {
    meta: ExperimentMeta,
    dir: PathBuf,
}

impl Experiment {
    pub fn id(&self) -> &str {
        &self.meta.experiment_id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn meta(&self) -> &ExperimentMeta {
        &self.meta
    }

    /// Start a new run; it is marked `FAILED` unless [`ActiveRun::finish`] is called.
    pub fn start_run(&self, run_name: &str) -> Result<ActiveRun, TrackingError> {
        ActiveRun::start(&self.dir, self.id(), run_name)
    }
}

/// Experiment name of the form `<prefix>_<YYYYmmdd_HHMMSS>`.
pub fn experiment_name(prefix: &str, now: OffsetDateTime) -> Result<String, TrackingError> {
    const NAME_FORMAT: &[FormatItem<'_>] =
        format_description!("[year][month][day]_[hour][minute][second]");
    Ok(format!("{prefix}_{}", now.format(NAME_FORMAT)?))
}

pub(crate) fn validate_key(key: &str) -> Result<(), TrackingError> {
    let valid = !key.is_empty()
        && key != "."
        && key != ".."
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '));
    if valid {
        Ok(())
    } else {
        Err(TrackingError::InvalidKey(key.to_string()))
    }
}

pub(crate) fn now_ms() -> u64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as u64
}

pub(crate) fn write_meta<T: Serialize>(path: &Path, meta: &T) -> Result<(), TrackingError> {
    let bytes = serde_json::to_vec_pretty(meta).map_err(|source| TrackingError::Meta {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, bytes).map_err(|source| TrackingError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_meta<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, TrackingError> {
    let bytes = std::fs::read(path).map_err(|source| TrackingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| TrackingError::Meta {
        path: path.to_path_buf(),
        source,
    })
}

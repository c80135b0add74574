use std::{
    collections::BTreeMap,
    fmt::Display,
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{META_FILE_NAME, TrackingError, now_ms, read_meta, validate_key, write_meta};
use crate::app_dirs;

const PARAMS_DIR: &str = "params";
const METRICS_DIR: &str = "metrics";
const TAGS_DIR: &str = "tags";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// Metadata persisted for each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub run_name: String,
    pub experiment_id: String,
    pub status: RunStatus,
    /// Unix milliseconds.
    pub start_time: u64,
    pub end_time: Option<u64>,
}

/// One recorded metric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricPoint {
    pub timestamp_ms: u64,
    pub value: f64,
    pub step: u64,
}

/// A run in progress.
///
/// Dropping the run without calling [`ActiveRun::finish`] records it as `FAILED`.
#[derive(Debug)]
pub struct ActiveRun {
    meta: RunMeta,
    dir: PathBuf,
    closed: bool,
}

impl ActiveRun {
    pub(super) fn start(
        experiment_dir: &Path,
        experiment_id: &str,
        run_name: &str,
    ) -> Result<Self, TrackingError> {
        let run_id = Uuid::new_v4().simple().to_string();
        let dir = app_dirs::ensure_dir(&experiment_dir.join(&run_id))?;
        for sub in [PARAMS_DIR, METRICS_DIR, TAGS_DIR] {
            app_dirs::ensure_dir(&dir.join(sub))?;
        }
        let meta = RunMeta {
            run_id,
            run_name: run_name.to_string(),
            experiment_id: experiment_id.to_string(),
            status: RunStatus::Running,
            start_time: now_ms(),
            end_time: None,
        };
        write_meta(&dir.join(META_FILE_NAME), &meta)?;
        tracing::debug!(run_id = %meta.run_id, run_name, "Started tracking run");
        Ok(Self {
            meta,
            dir,
            closed: false,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.meta.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record a parameter; logging the same key twice must repeat the same value.
    pub fn log_param(&mut self, key: &str, value: impl Display) -> Result<(), TrackingError> {
        validate_key(key)?;
        let value = value.to_string();
        let path = self.dir.join(PARAMS_DIR).join(key);
        if let Ok(existing) = std::fs::read_to_string(&path) {
            if existing == value {
                return Ok(());
            }
            return Err(TrackingError::ParamConflict {
                key: key.to_string(),
                existing,
                new: value,
            });
        }
        write_file(&path, value.as_bytes())
    }

    pub fn log_metric(&mut self, key: &str, value: f64) -> Result<(), TrackingError> {
        self.log_metric_at(key, value, 0)
    }

    /// Append a metric value recorded at `step`.
    pub fn log_metric_at(&mut self, key: &str, value: f64, step: u64) -> Result<(), TrackingError> {
        validate_key(key)?;
        let path = self.dir.join(METRICS_DIR).join(key);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| TrackingError::Io {
                path: path.clone(),
                source,
            })?;
        writeln!(file, "{} {} {}", now_ms(), value, step)
            .map_err(|source| TrackingError::Io { path, source })
    }

    pub fn set_tag(&mut self, key: &str, value: impl Display) -> Result<(), TrackingError> {
        validate_key(key)?;
        write_file(&self.dir.join(TAGS_DIR).join(key), value.to_string().as_bytes())
    }

    /// Mark the run `FINISHED` and return its final metadata.
    pub fn finish(mut self) -> Result<RunMeta, TrackingError> {
        self.close(RunStatus::Finished)?;
        Ok(self.meta.clone())
    }

    fn close(&mut self, status: RunStatus) -> Result<(), TrackingError> {
        self.closed = true;
        self.meta.status = status;
        self.meta.end_time = Some(now_ms());
        write_meta(&self.dir.join(META_FILE_NAME), &self.meta)
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.close(RunStatus::Failed) {
            tracing::warn!(run_id = %self.meta.run_id, "Failed to mark run as failed: {err}");
        }
    }
}

/// Everything recorded for a single run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub meta: RunMeta,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, Vec<MetricPoint>>,
    pub tags: BTreeMap<String, String>,
}

impl RunRecord {
    pub(super) fn load(dir: &Path) -> Result<Self, TrackingError> {
        let meta: RunMeta = read_meta(&dir.join(META_FILE_NAME))?;
        let params = read_values(&dir.join(PARAMS_DIR))?;
        let tags = read_values(&dir.join(TAGS_DIR))?;
        let mut metrics = BTreeMap::new();
        for (key, text) in read_values(&dir.join(METRICS_DIR))? {
            let path = dir.join(METRICS_DIR).join(&key);
            let points = text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| parse_metric_line(&path, line))
                .collect::<Result<Vec<_>, _>>()?;
            metrics.insert(key, points);
        }
        Ok(Self {
            meta,
            params,
            metrics,
            tags,
        })
    }

    /// Most recent value logged for `key`.
    pub fn latest_metric(&self, key: &str) -> Option<f64> {
        self.metrics
            .get(key)
            .and_then(|points| points.last())
            .map(|point| point.value)
    }
}

fn parse_metric_line(path: &Path, line: &str) -> Result<MetricPoint, TrackingError> {
    let malformed = || TrackingError::MalformedMetric {
        path: path.to_path_buf(),
        line: line.to_string(),
    };
    let mut parts = line.split_whitespace();
    let timestamp_ms = parts.next().and_then(|v| v.parse().ok()).ok_or_else(malformed)?;
    let value = parts.next().and_then(|v| v.parse().ok()).ok_or_else(malformed)?;
    let step = parts.next().and_then(|v| v.parse().ok()).ok_or_else(malformed)?;
    Ok(MetricPoint {
        timestamp_ms,
        value,
        step,
    })
}

fn read_values(dir: &Path) -> Result<BTreeMap<String, String>, TrackingError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(source) => {
            return Err(TrackingError::Io {
                path: dir.to_path_buf(),
                source,
            });
        }
    };
    let mut out = BTreeMap::new();
    for entry in entries.filter_map(|entry| entry.ok()) {
        let Ok(key) = entry.file_name().into_string() else {
            continue;
        };
        let path = entry.path();
        let value = std::fs::read_to_string(&path)
            .map_err(|source| TrackingError::Io { path, source })?;
        out.insert(key, value);
    }
    Ok(out)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), TrackingError> {
    std::fs::write(path, bytes).map_err(|source| TrackingError::Io {
        path: path.to_path_buf(),
        source,
    })
}

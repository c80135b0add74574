//! Filesystem layout for the artifacts shared by the two stages.
//!
//! Training writes `models/model_<timestamp>_rf_model.json` and `data/test_split.json`;
//! evaluation reads both and writes `metrics/<timestamp>_metrics.json`. The timestamp is an
//! opaque token and is spliced into file names verbatim.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::SystemTime,
};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{
    app_dirs::{self, AppDirError},
    config::Settings,
    dataset::TestSplit,
    ml::{forest::RandomForestModel, metrics::MetricsReport},
};

const MODEL_PREFIX: &str = "model_";
const MODEL_SUFFIX: &str = "_rf_model.json";
const TEST_SPLIT_FILE_NAME: &str = "test_split.json";
const METRICS_SUFFIX: &str = "_metrics.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No such file: {path}")]
    NotFound { path: PathBuf },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid model at {path}: {reason}")]
    InvalidModel { path: PathBuf, reason: String },
    #[error("Invalid test split at {path}: {reason}")]
    InvalidSplit { path: PathBuf, reason: String },
    #[error(transparent)]
    Dir(#[from] AppDirError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Test split as read back from disk.
#[derive(Debug, Clone)]
pub struct LoadedSplit {
    pub split: TestSplit,
    /// blake3 digest of the file bytes.
    pub digest: String,
    pub path: PathBuf,
}

/// Result of persisting the test split.
#[derive(Debug, Clone)]
pub struct SavedSplit {
    pub path: PathBuf,
    pub digest: String,
}

/// Resolved artifact directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    models_dir: PathBuf,
    data_dir: PathBuf,
    metrics_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(
        models_dir: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
        metrics_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            models_dir: models_dir.into(),
            data_dir: data_dir.into(),
            metrics_dir: metrics_dir.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.resolve(&settings.paths.models_dir),
            settings.resolve(&settings.paths.data_dir),
            settings.resolve(&settings.paths.metrics_dir),
        )
    }

    pub fn model_path(&self, timestamp: &str) -> PathBuf {
        self.models_dir
            .join(format!("{MODEL_PREFIX}{timestamp}{MODEL_SUFFIX}"))
    }

    /// Shared by every run; only the latest training run's split exists.
    pub fn test_split_path(&self) -> PathBuf {
        self.data_dir.join(TEST_SPLIT_FILE_NAME)
    }

    pub fn metrics_path(&self, timestamp: &str) -> PathBuf {
        self.metrics_dir.join(format!("{timestamp}{METRICS_SUFFIX}"))
    }

    pub fn save_model(
        &self,
        timestamp: &str,
        model: &RandomForestModel,
    ) -> Result<PathBuf, StoreError> {
        let path = self.model_path(timestamp);
        write_json(&path, model, false)?;
        Ok(path)
    }

    /// Load and validate the model trained under `timestamp`.
    pub fn load_model(&self, timestamp: &str) -> Result<RandomForestModel, StoreError> {
        let path = self.model_path(timestamp);
        let model: RandomForestModel = read_json(&path)?;
        model
            .validate()
            .map_err(|reason| StoreError::InvalidModel { path, reason })?;
        Ok(model)
    }

    pub fn save_test_split(&self, split: &TestSplit) -> Result<SavedSplit, StoreError> {
        let path = self.test_split_path();
        let bytes = write_json(&path, split, false)?;
        Ok(SavedSplit {
            path,
            digest: blake3::hash(&bytes).to_hex().to_string(),
        })
    }

    /// Read the persisted split back, rejecting rows and labels that do not line up.
    pub fn load_test_split(&self) -> Result<LoadedSplit, StoreError> {
        let path = self.test_split_path();
        let bytes = read_bytes(&path)?;
        let split: TestSplit = serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        if let Err(reason) = split.validate() {
            return Err(StoreError::InvalidSplit { path, reason });
        }
        Ok(LoadedSplit {
            split,
            digest: blake3::hash(&bytes).to_hex().to_string(),
            path,
        })
    }

    /// Write the report as pretty-printed JSON, replacing any previous report.
    pub fn write_metrics(
        &self,
        timestamp: &str,
        report: &MetricsReport,
    ) -> Result<PathBuf, StoreError> {
        let path = self.metrics_path(timestamp);
        write_json(&path, report, true)?;
        Ok(path)
    }

    pub fn read_metrics(&self, timestamp: &str) -> Result<MetricsReport, StoreError> {
        read_json(&self.metrics_path(timestamp))
    }

    /// Timestamps of every stored model, oldest modification first.
    pub fn model_timestamps(&self) -> Result<Vec<String>, StoreError> {
        let entries = match std::fs::read_dir(&self.models_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.models_dir.clone(),
                    source,
                });
            }
        };
        let mut found: Vec<(SystemTime, String)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let timestamp = parse_model_file_name(&name)?.to_string();
                let modified = entry
                    .metadata()
                    .and_then(|meta| meta.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                Some((modified, timestamp))
            })
            .collect();
        found.sort();
        Ok(found.into_iter().map(|(_, timestamp)| timestamp).collect())
    }

    /// Timestamp of the most recently written model, if any.
    pub fn latest_model_timestamp(&self) -> Result<Option<String>, StoreError> {
        Ok(self.model_timestamps()?.pop())
    }
}

/// Extract the timestamp from a `model_<timestamp>_rf_model.json` file name.
pub fn parse_model_file_name(name: &str) -> Option<&str> {
    let timestamp = name.strip_prefix(MODEL_PREFIX)?.strip_suffix(MODEL_SUFFIX)?;
    (!timestamp.is_empty()).then_some(timestamp)
}

fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<Vec<u8>, StoreError> {
    app_dirs::ensure_parent(path)?;
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    }
    .map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, &bytes).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(bytes)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, StoreError> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            StoreError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            StoreError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::forest::{ALGORITHM_NAME, DecisionTree, Node};
    use tempfile::tempdir;

    fn store(root: &Path) -> ArtifactStore {
        ArtifactStore::from_settings(&Settings::with_root(root))
    }

    fn tiny_model() -> RandomForestModel {
        RandomForestModel {
            model_version: 1,
            algorithm: ALGORITHM_NAME.to_string(),
            feature_len: 1,
            feature_names: vec!["x".into()],
            classes: vec!["a".into(), "b".into()],
            trees: vec![DecisionTree {
                nodes: vec![Node::Leaf {
                    proba: vec![0.5, 0.5],
                }],
            }],
            test_split_digest: None,
        }
    }

    #[test]
    fn paths_follow_layout() {
        let store = store(Path::new("/work"));
        assert_eq!(
            store.model_path("20240101_000000"),
            Path::new("/work/models/model_20240101_000000_rf_model.json")
        );
        assert_eq!(store.test_split_path(), Path::new("/work/data/test_split.json"));
        assert_eq!(
            store.metrics_path("20240101_000000"),
            Path::new("/work/metrics/20240101_000000_metrics.json")
        );
    }

    #[test]
    fn model_round_trips_and_creates_directories() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let path = store.save_model("t1", &tiny_model()).unwrap();
        assert!(path.is_file());
        assert_eq!(store.load_model("t1").unwrap(), tiny_model());
    }

    #[test]
    fn missing_model_is_not_found() {
        let dir = tempdir().unwrap();
        let err = store(dir.path()).load_model("nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn invalid_model_is_rejected() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let mut model = tiny_model();
        model.trees.clear();
        store.save_model("bad", &model).unwrap();
        assert!(matches!(
            store.load_model("bad").unwrap_err(),
            StoreError::InvalidModel { .. }
        ));
    }

    #[test]
    fn split_digest_matches_between_save_and_load() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let split = TestSplit {
            feature_names: vec!["x".into()],
            classes: vec!["a".into(), "b".into()],
            x: vec![vec![1.0], vec![2.0]],
            y: vec![0, 1],
        };
        let saved = store.save_test_split(&split).unwrap();
        let loaded = store.load_test_split().unwrap();
        assert_eq!(loaded.split, split);
        assert_eq!(loaded.digest, saved.digest);
    }

    #[test]
    fn load_rejects_split_with_missing_labels() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let split = TestSplit {
            feature_names: vec!["x".into()],
            classes: vec!["a".into(), "b".into()],
            x: vec![vec![1.0], vec![2.0], vec![3.0]],
            y: vec![0],
        };
        store.save_test_split(&split).unwrap();
        assert!(matches!(
            store.load_test_split().unwrap_err(),
            StoreError::InvalidSplit { .. }
        ));
    }

    #[test]
    fn load_rejects_split_with_unknown_label() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let split = TestSplit {
            feature_names: vec!["x".into()],
            classes: vec!["a".into(), "b".into()],
            x: vec![vec![1.0], vec![2.0]],
            y: vec![7, 1],
        };
        store.save_test_split(&split).unwrap();
        let err = store.load_test_split().unwrap_err();
        assert!(matches!(err, StoreError::InvalidSplit { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn metrics_are_pretty_printed() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let report = MetricsReport {
            accuracy: 0.9561,
            f1_score: 1.0,
        };
        let path = store.write_metrics("t", &report).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, "{\n  \"accuracy\": 0.9561,\n  \"f1_score\": 1.0\n}");
        assert_eq!(store.read_metrics("t").unwrap(), report);
    }

    #[test]
    fn model_file_names_parse_timestamps() {
        assert_eq!(
            parse_model_file_name("model_20240101_000000_rf_model.json"),
            Some("20240101_000000")
        );
        assert_eq!(parse_model_file_name("model__rf_model.json"), None);
        assert_eq!(parse_model_file_name("notes.txt"), None);
    }

    #[test]
    fn latest_timestamp_tracks_most_recent_write() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        assert_eq!(store.latest_model_timestamp().unwrap(), None);
        store.save_model("first", &tiny_model()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        store.save_model("second", &tiny_model()).unwrap();
        std::fs::write(dir.path().join("models").join("README"), "x").unwrap();
        assert_eq!(store.model_timestamps().unwrap(), vec!["first", "second"]);
        assert_eq!(
            store.latest_model_timestamp().unwrap().as_deref(),
            Some("second")
        );
    }
}

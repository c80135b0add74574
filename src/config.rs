//! Pipeline settings loaded from an optional `canopy.toml` in the workspace root.
//!
//! Every section and key is optional; a missing file yields the defaults, which
//! reproduce the fixed layout and hyperparameters the CI jobs rely on.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;

/// Default filename for the settings file.
pub const CONFIG_FILE_NAME: &str = "canopy.toml";

/// Errors raised while locating or parsing settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Unable to resolve workspace root: {0}")]
    Root(#[from] app_dirs::AppDirError),
}

/// Aggregate settings for both stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Directory every relative path below is resolved against.
    #[serde(skip)]
    pub root: PathBuf,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub training: TrainingSettings,
    #[serde(default)]
    pub tracking: TrackingSettings,
}

/// Artifact directories, relative to the workspace root.
///
/// Config keys: `models_dir`, `data_dir`, `metrics_dir`, `tracking_dir`, `logs_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_metrics_dir")]
    pub metrics_dir: PathBuf,
    #[serde(default = "default_tracking_dir")]
    pub tracking_dir: PathBuf,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            data_dir: default_data_dir(),
            metrics_dir: default_metrics_dir(),
            tracking_dir: default_tracking_dir(),
            logs_dir: default_logs_dir(),
        }
    }
}

/// Split and forest hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// Seed shared by the train/test shuffle and the forest.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Fraction of rows held out for evaluation.
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,
    /// `None` grows trees until leaves are pure.
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            test_fraction: default_test_fraction(),
            n_trees: default_n_trees(),
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
        }
    }
}

/// Naming used when recording runs in the tracking store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSettings {
    /// Experiment names are `<prefix>_<YYYYmmdd_HHMMSS>`.
    #[serde(default = "default_experiment_prefix")]
    pub experiment_prefix: String,
    #[serde(default = "default_run_name")]
    pub run_name: String,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            experiment_prefix: default_experiment_prefix(),
            run_name: default_run_name(),
        }
    }
}

impl Settings {
    /// Load settings for the current workspace root.
    pub fn load() -> Result<Self, ConfigError> {
        let root = app_dirs::workspace_root()?;
        Self::load_from_root(&root)
    }

    /// Load `canopy.toml` from `root`, falling back to defaults when absent.
    pub fn load_from_root(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE_NAME);
        let mut settings = if path.is_file() {
            load_settings_from(&path)?
        } else {
            Settings::default()
        };
        settings.root = root.to_path_buf();
        Ok(settings.normalized())
    }

    /// Defaults anchored at `root`, ignoring any settings file.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Resolve a possibly relative path against the workspace root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.resolve(&self.paths.logs_dir)
    }

    pub fn tracking_dir(&self) -> PathBuf {
        self.resolve(&self.paths.tracking_dir)
    }

    fn normalized(mut self) -> Self {
        self.training.test_fraction = clamp_test_fraction(self.training.test_fraction);
        self.training.n_trees = self.training.n_trees.max(1);
        self.training.min_samples_split = self.training.min_samples_split.max(2);
        self.training.min_samples_leaf = self.training.min_samples_leaf.max(1);
        self
    }
}

fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

fn clamp_test_fraction(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.01, 0.99)
    } else {
        default_test_fraction()
    }
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_metrics_dir() -> PathBuf {
    PathBuf::from("metrics")
}

fn default_tracking_dir() -> PathBuf {
    PathBuf::from("mlruns")
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_seed() -> u64 {
    42
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_n_trees() -> usize {
    100
}

fn default_min_samples_split() -> usize {
    2
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_experiment_prefix() -> String {
    "breast_cancer".to_string()
}

fn default_run_name() -> String {
    "RandomForest_BreastCancer".to_string()
}

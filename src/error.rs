//! Crate-wide error type returned by both stages.

use std::path::PathBuf;

use thiserror::Error;

use crate::{
    cli::CliError,
    config::ConfigError,
    dataset::DatasetError,
    ml::{forest::FeatureMismatch, metrics::LengthMismatch},
    store::StoreError,
    tracking::TrackingError,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Cli(#[from] CliError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    #[error("Training failed: {0}")]
    Training(String),
    #[error("Feature mismatch: {0}")]
    FeatureMismatch(#[from] FeatureMismatch),
    #[error("Cannot score predictions: {0}")]
    Metrics(#[from] LengthMismatch),
    #[error("Test split at {path} has classes {found:?} but the model was trained on {expected:?}")]
    ClassMismatch {
        path: PathBuf,
        found: Vec<String>,
        expected: Vec<String>,
    },
}

impl PipelineError {
    /// True when a required model or test-split artifact does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PipelineError::Store(err) if err.is_not_found())
    }
}

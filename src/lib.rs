//! Library exports shared by the training and evaluation binaries.
/// Workspace root resolution.
pub mod app_dirs;
/// Argument parsing for the stage binaries.
pub mod cli;
/// Settings loaded from `canopy.toml`.
pub mod config;
/// Bundled dataset and train/test splitting.
pub mod dataset;
/// Crate-wide error type.
pub mod error;
/// Tracing subscriber setup.
pub mod logging;
/// Classifier training, inference and metrics.
pub mod ml;
/// Training and evaluation stages.
pub mod pipeline;
/// Filesystem layout for models, splits and reports.
pub mod store;
/// Local experiment tracking store.
pub mod tracking;

pub use error::PipelineError;

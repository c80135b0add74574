//! The two pipeline stages.
//!
//! Training and evaluation share no process state: training leaves a model and a test
//! split on disk, and evaluation picks them up again by timestamp.

mod evaluate;
mod train;

pub use evaluate::{EvaluationSummary, SplitCheck, run_evaluation};
pub use train::{TrainingSummary, run_training, run_training_on, train_options};

/// Decimal places kept in the metrics report.
pub const REPORT_DECIMALS: usize = 4;

//! Bundled tabular dataset and deterministic train/test partitioning.

mod loader;
mod split;

pub use loader::{BREAST_CANCER_CLASSES, Dataset, DatasetError, from_row_major, load_breast_cancer};
pub use split::{Partition, TestSplit, test_len, train_test_split};

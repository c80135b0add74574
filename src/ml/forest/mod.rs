//! Deterministic random-forest classifier.
//!
//! Bagged CART trees with Gini impurity and random feature subsets per split:
//! - Every tree draws its seed from a single forest RNG, so a fit is a pure function of
//!   the training rows and [`TrainOptions`].
//! - Predictions average per-tree leaf class frequencies and take the argmax.
//! - Models round-trip through serde JSON.

mod model;
mod train;

pub use model::{ALGORITHM_NAME, DecisionTree, FeatureMismatch, Node, RandomForestModel};
pub use train::{MaxFeatures, TrainDataset, TrainOptions, train_random_forest};

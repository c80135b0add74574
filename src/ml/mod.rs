//! Machine learning helpers for training and inference.
//!
//! The forest is trained and evaluated entirely in Rust; models serialize to JSON so the
//! evaluation stage can reload them without retraining.

pub mod forest;
pub mod metrics;

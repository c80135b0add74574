//! Evaluation metrics for classification models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Class index treated as positive by binary F1 (`benign` for the bundled dataset).
pub const POSITIVE_CLASS: usize = 1;

#[derive(Debug, Clone)]
/// Confusion matrix for a `K`-class classifier.
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    /// Build a matrix from aligned truth/prediction sequences.
    pub fn from_predictions(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Self {
        let mut cm = Self::new(n_classes);
        for (&truth, &predicted) in y_true.iter().zip(y_pred.iter()) {
            cm.add(truth, predicted);
        }
        cm
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Precision/recall statistics for a single class.
pub struct PerClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f64,
    /// `TP / (TP + FN)`.
    pub recall: f64,
    /// Total number of true examples for the class.
    pub support: u32,
}

impl PerClassStats {
    /// Harmonic mean of precision and recall, zero when both are zero.
    pub fn f1(&self) -> f64 {
        let denom = self.precision + self.recall;
        if denom == 0.0 {
            0.0
        } else {
            2.0 * self.precision * self.recall / denom
        }
    }
}

/// Compute per-class precision and recall from a confusion matrix.
pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    let mut stats = Vec::with_capacity(k);
    for class_idx in 0..k {
        let tp = cm.get(class_idx, class_idx) as f64;
        let mut fp = 0f64;
        let mut fn_ = 0f64;
        let mut support = 0u32;
        for j in 0..k {
            let v = cm.get(class_idx, j);
            support = support.saturating_add(v);
            if j != class_idx {
                fn_ += v as f64;
            }
        }
        for i in 0..k {
            if i != class_idx {
                fp += cm.get(i, class_idx) as f64;
            }
        }
        let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
        let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
        stats.push(PerClassStats {
            precision,
            recall,
            support,
        });
    }
    stats
}

/// Compute overall accuracy from a confusion matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
    let mut correct = 0u64;
    for class_idx in 0..cm.n_classes {
        correct += cm.get(class_idx, class_idx) as u64;
    }
    let total = cm.total();
    if total == 0 {
        0.0
    } else {
        (correct as f64) / (total as f64)
    }
}

/// F1 score of `positive_class` against every other class.
pub fn f1_binary(cm: &ConfusionMatrix, positive_class: usize) -> f64 {
    precision_recall_by_class(cm)
        .get(positive_class)
        .map(PerClassStats::f1)
        .unwrap_or(0.0)
}

/// Truth and prediction sequences of different lengths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{truth} true labels but {predicted} predictions")]
pub struct LengthMismatch {
    pub truth: usize,
    pub predicted: usize,
}

/// Metrics written to `metrics/<timestamp>_metrics.json`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub accuracy: f64,
    pub f1_score: f64,
}

impl MetricsReport {
    /// Score aligned truth/prediction sequences.
    pub fn from_predictions(
        y_true: &[usize],
        y_pred: &[usize],
        n_classes: usize,
    ) -> Result<Self, LengthMismatch> {
        if y_true.len() != y_pred.len() {
            return Err(LengthMismatch {
                truth: y_true.len(),
                predicted: y_pred.len(),
            });
        }
        let cm = ConfusionMatrix::from_predictions(y_true, y_pred, n_classes);
        Ok(Self {
            accuracy: accuracy(&cm),
            f1_score: f1_binary(&cm, POSITIVE_CLASS),
        })
    }

    /// Round both scores to `decimals` places, as decimal text would show them.
    pub fn rounded(self, decimals: usize) -> Self {
        Self {
            accuracy: round_to(self.accuracy, decimals),
            f1_score: round_to(self.f1_score, decimals),
        }
    }
}

/// Round on the exact decimal expansion of `value`, not on `value * 10^decimals`.
fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{value:.decimals$}").parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_counts_diagonal() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 1, 1], &[0, 1, 1, 1], 2);
        assert_eq!(cm.total(), 4);
        assert_eq!(accuracy(&cm), 0.75);
    }

    #[test]
    fn binary_f1_uses_positive_class() {
        // TP=2 FP=1 FN=1 for class 1.
        let cm = ConfusionMatrix::from_predictions(&[1, 1, 1, 0, 0], &[1, 1, 0, 1, 0], 2);
        let f1 = f1_binary(&cm, POSITIVE_CLASS);
        assert!((f1 - 2.0 / 3.0).abs() < 1e-12);
        let stats = precision_recall_by_class(&cm);
        assert_eq!(stats[1].support, 3);
        assert_eq!(stats[0].support, 2);
    }

    #[test]
    fn f1_is_zero_without_positive_predictions() {
        let cm = ConfusionMatrix::from_predictions(&[1, 0], &[0, 0], 2);
        assert_eq!(f1_binary(&cm, POSITIVE_CLASS), 0.0);
    }

    #[test]
    fn empty_matrix_scores_zero() {
        let report = MetricsReport::from_predictions(&[], &[], 2).unwrap();
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.f1_score, 0.0);
    }

    #[test]
    fn report_rejects_unaligned_sequences() {
        let err = MetricsReport::from_predictions(&[0, 1, 1], &[0, 1], 2).unwrap_err();
        assert_eq!(
            err,
            LengthMismatch {
                truth: 3,
                predicted: 2
            }
        );
    }

    #[test]
    fn out_of_range_labels_are_ignored() {
        let cm = ConfusionMatrix::from_predictions(&[0, 5], &[0, 0], 2);
        assert_eq!(cm.total(), 1);
    }

    #[test]
    fn rounding_keeps_four_decimals() {
        let report = MetricsReport {
            accuracy: 0.956140350877193,
            f1_score: 0.96551724137931,
        }
        .rounded(4);
        assert_eq!(report.accuracy, 0.9561);
        assert_eq!(report.f1_score, 0.9655);
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"accuracy":0.9561,"f1_score":0.9655}"#);
    }

    #[test]
    fn rounding_follows_decimal_value() {
        // 0.00035 is stored just below the tie, 0.12345 just above it.
        assert_eq!(round_to(0.00035, 4), 0.0003);
        assert_eq!(round_to(0.12345, 4), 0.1235);
        assert_eq!(round_to(1.0, 4), 1.0);
        assert_eq!(round_to(0.0, 4), 0.0);
    }
}

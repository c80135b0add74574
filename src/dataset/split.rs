use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use super::{Dataset, DatasetError};

/// A subset of dataset rows together with the labels needed to interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub feature_names: Vec<String>,
    pub classes: Vec<String>,
    /// Feature matrix, row-major.
    pub x: Vec<Vec<f32>>,
    /// Class indices aligned with `x`.
    pub y: Vec<usize>,
}

/// Rows held out from fitting and persisted for the evaluation stage.
pub type TestSplit = Partition;

impl Partition {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Number of `f32` values per feature row.
    pub fn feature_len(&self) -> usize {
        self.feature_names.len()
    }

    /// Check that labels and rows line up with the recorded names and classes.
    pub fn validate(&self) -> Result<(), String> {
        if self.x.len() != self.y.len() {
            return Err(format!(
                "{} feature rows but {} labels",
                self.x.len(),
                self.y.len()
            ));
        }
        if self.classes.len() < 2 {
            return Err("Need at least 2 classes".to_string());
        }
        if let Some((row, &label)) = self
            .y
            .iter()
            .enumerate()
            .find(|(_, label)| **label >= self.classes.len())
        {
            return Err(format!(
                "Label {label} at row {row} is outside the {} classes",
                self.classes.len()
            ));
        }
        let width = self.feature_len();
        if let Some((row, values)) = self
            .x
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != width)
        {
            return Err(format!(
                "Row {row} has {} values but {width} feature names",
                values.len()
            ));
        }
        Ok(())
    }

    fn from_indices(dataset: &Dataset, indices: &[usize]) -> Self {
        Self {
            feature_names: dataset.feature_names.clone(),
            classes: dataset.classes.clone(),
            x: indices.iter().map(|&i| dataset.x[i].clone()).collect(),
            y: indices.iter().map(|&i| dataset.y[i]).collect(),
        }
    }
}

/// Number of rows placed in the test partition for `rows` total rows.
///
/// Rounds up, and always leaves at least one row on each side.
pub fn test_len(rows: usize, test_fraction: f64) -> usize {
    let raw = (rows as f64 * test_fraction).ceil() as usize;
    raw.clamp(1, rows.saturating_sub(1).max(1))
}

/// Shuffle row indices with a seeded RNG and cut off the test partition.
///
/// The same dataset, fraction and seed always produce the same partition.
pub fn train_test_split(
    dataset: &Dataset,
    test_fraction: f64,
    seed: u64,
) -> Result<(Partition, Partition), DatasetError> {
    let rows = dataset.len();
    if rows < 2 || !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(DatasetError::InvalidSplit {
            rows,
            fraction: test_fraction,
        });
    }
    let mut indices: Vec<usize> = (0..rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(test_len(rows, test_fraction));
    let train = Partition::from_indices(dataset, train_idx);
    let test = Partition::from_indices(dataset, test_idx);
    tracing::debug!(train = train.len(), test = test.len(), seed, "Split dataset");
    Ok((train, test))
}

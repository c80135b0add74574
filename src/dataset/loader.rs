//! Loader for the breast-cancer dataset bundled with `smartcore`.

use smartcore::dataset::breast_cancer;
use thiserror::Error;

/// Class names in target-index order.
pub const BREAST_CANCER_CLASSES: [&str; 2] = ["malignant", "benign"];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset has no feature columns")]
    NoFeatures,
    #[error("dataset is empty")]
    Empty,
    #[error("feature buffer holds {values} values, expected {rows} rows x {features} features")]
    ShapeMismatch {
        values: usize,
        rows: usize,
        features: usize,
    },
    #[error("target {target} at row {row} is outside the {classes} known classes")]
    UnknownTarget {
        row: usize,
        target: usize,
        classes: usize,
    },
    #[error("dataset with {rows} rows cannot be split with test fraction {fraction}")]
    InvalidSplit { rows: usize, fraction: f64 },
}

/// Immutable in-memory feature table with class labels.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Column names aligned with each feature row.
    pub feature_names: Vec<String>,
    /// Ordered class names; `y` values index into this list.
    pub classes: Vec<String>,
    /// Feature matrix, row-major.
    pub x: Vec<Vec<f32>>,
    /// Class indices aligned with `x`.
    pub y: Vec<usize>,
}

impl Dataset {
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
}

/// Load the Wisconsin breast-cancer table (569 rows, 30 features, binary target).
pub fn load_breast_cancer() -> Result<Dataset, DatasetError> {
    let raw = breast_cancer::load_dataset();
    let data: Vec<f32> = raw.data.iter().map(|&v| v as f32).collect();
    let target: Vec<usize> = raw.target.iter().map(|&t| t as usize).collect();
    let feature_names = if raw.feature_names.len() == raw.num_features {
        raw.feature_names.clone()
    } else {
        (0..raw.num_features).map(|idx| format!("feature_{idx}")).collect()
    };
    let classes = BREAST_CANCER_CLASSES.iter().map(|c| c.to_string()).collect();
    let dataset = from_row_major(data, target, feature_names, classes)?;
    tracing::debug!(
        rows = dataset.len(),
        features = dataset.feature_len(),
        "Loaded breast cancer dataset"
    );
    Ok(dataset)
}

/// Build a [`Dataset`] from a flat row-major buffer, validating its shape.
pub fn from_row_major(
    data: Vec<f32>,
    target: Vec<usize>,
    feature_names: Vec<String>,
    classes: Vec<String>,
) -> Result<Dataset, DatasetError> {
    let features = feature_names.len();
    if features == 0 {
        return Err(DatasetError::NoFeatures);
    }
    if target.is_empty() {
        return Err(DatasetError::Empty);
    }
    if data.len() != target.len() * features {
        return Err(DatasetError::ShapeMismatch {
            values: data.len(),
            rows: target.len(),
            features,
        });
    }
    if let Some((row, &bad)) = target
        .iter()
        .enumerate()
        .find(|(_, t)| **t >= classes.len())
    {
        return Err(DatasetError::UnknownTarget {
            row,
            target: bad,
            classes: classes.len(),
        });
    }
    let x = data.chunks_exact(features).map(|row| row.to_vec()).collect();
    Ok(Dataset {
        feature_names,
        classes,
        x,
        y: target,
    })
}

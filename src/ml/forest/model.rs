use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Algorithm identifier recorded in models and tracking runs.
pub const ALGORITHM_NAME: &str = "RandomForestClassifier";

/// Input row whose width does not match the layout the model was fitted on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {row} has {found} features but the model expects {expected}")]
pub struct FeatureMismatch {
    pub row: usize,
    pub found: usize,
    pub expected: usize,
}

/// Tree node; children always sit at higher indices than their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        /// Feature index used for the split.
        feature_index: u16,
        /// Rows with `feature <= threshold` go left.
        threshold: f32,
        left: u32,
        right: u32,
    },
    Leaf {
        /// Training class frequencies that reached this leaf.
        proba: Vec<f32>,
    },
}

/// Single CART tree stored as a flat node list rooted at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    /// Class frequencies of the leaf `features` falls into.
    pub fn leaf_proba(&self, features: &[f32]) -> &[f32] {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { proba } => return proba,
                Node::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features
                        .get(*feature_index as usize)
                        .copied()
                        .unwrap_or(0.0);
                    idx = if value <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
            }
        }
    }

    /// Longest root-to-leaf path, counting edges.
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + walk(nodes, *left as usize).max(walk(nodes, *right as usize))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    fn validate(&self, n_classes: usize, feature_len: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        let len = self.nodes.len();
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { proba } => {
                    if proba.len() != n_classes {
                        return Err(format!(
                            "Leaf {idx} has {} class weights but expected {n_classes}",
                            proba.len()
                        ));
                    }
                }
                Node::Split {
                    feature_index,
                    left,
                    right,
                    ..
                } => {
                    if *feature_index as usize >= feature_len {
                        return Err(format!(
                            "Node {idx} splits on feature {feature_index} outside {feature_len}"
                        ));
                    }
                    for child in [*left as usize, *right as usize] {
                        if child <= idx || child >= len {
                            return Err(format!("Node {idx} has invalid child index {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Bagged decision-tree ensemble for multi-class classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestModel {
    /// Model format version.
    pub model_version: i64,
    pub algorithm: String,
    /// Number of `f32` values per feature row.
    pub feature_len: usize,
    pub feature_names: Vec<String>,
    /// Ordered list of class names.
    pub classes: Vec<String>,
    pub trees: Vec<DecisionTree>,
    /// blake3 digest of the test split persisted alongside this model.
    #[serde(default)]
    pub test_split_digest: Option<String>,
}

impl RandomForestModel {
    /// Validate structural invariants of the model.
    pub fn validate(&self) -> Result<(), String> {
        if self.classes.len() < 2 {
            return Err("Model must contain at least 2 classes".to_string());
        }
        if self.feature_len == 0 {
            return Err("Model must expect at least one feature".to_string());
        }
        if self.feature_names.len() != self.feature_len {
            return Err("feature_names length must match feature_len".to_string());
        }
        if self.trees.is_empty() {
            return Err("Model must contain at least one tree".to_string());
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.classes.len(), self.feature_len)
                .map_err(|err| format!("Tree {tree_idx}: {err}"))?;
        }
        Ok(())
    }

    /// Mean of the per-tree leaf class frequencies.
    pub fn predict_proba(&self, features: &[f32]) -> Vec<f32> {
        let mut sums = vec![0.0f32; self.classes.len()];
        for tree in &self.trees {
            for (sum, p) in sums.iter_mut().zip(tree.leaf_proba(features)) {
                *sum += p;
            }
        }
        let n = self.trees.len().max(1) as f32;
        sums.iter().map(|s| s / n).collect()
    }

    /// Predict the best class index for a feature vector.
    pub fn predict_class_index(&self, features: &[f32]) -> usize {
        argmax(&self.predict_proba(features))
    }

    /// Predict one class index per row, rejecting rows of the wrong width.
    pub fn predict(&self, rows: &[Vec<f32>]) -> Result<Vec<usize>, FeatureMismatch> {
        self.check_feature_layout(rows)?;
        Ok(rows.iter().map(|row| self.predict_class_index(row)).collect())
    }

    /// Ensure every row matches the fitted feature width.
    pub fn check_feature_layout(&self, rows: &[Vec<f32>]) -> Result<(), FeatureMismatch> {
        match rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.feature_len)
        {
            Some((row, values)) => Err(FeatureMismatch {
                row,
                found: values.len(),
                expected: self.feature_len,
            }),
            None => Ok(()),
        }
    }
}

fn argmax(values: &[f32]) -> usize {
    let mut best_idx = 0usize;
    let mut best_val = f32::NEG_INFINITY;
    for (idx, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_idx = idx;
        }
    }
    best_idx
}

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::model::{ALGORITHM_NAME, DecisionTree, Node, RandomForestModel};

/// Number of features considered at each split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFeatures {
    /// `floor(sqrt(feature_len))`, at least one.
    Sqrt,
    All,
    Fixed(usize),
}

impl MaxFeatures {
    fn resolve(self, feature_len: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (feature_len as f64).sqrt().floor() as usize,
            MaxFeatures::All => feature_len,
            MaxFeatures::Fixed(k) => k,
        };
        k.clamp(1, feature_len.max(1))
    }
}

/// Forest hyperparameters.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub n_trees: usize,
    /// `None` grows each tree until its leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Fit each tree on a bootstrap resample instead of all rows.
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

/// In-memory dataset used for fitting.
#[derive(Debug, Clone)]
pub struct TrainDataset {
    pub feature_names: Vec<String>,
    /// Ordered list of class names.
    pub classes: Vec<String>,
    /// Feature matrix, row-major.
    pub x: Vec<Vec<f32>>,
    /// Class indices aligned with `x`.
    pub y: Vec<usize>,
}

/// Fit a random forest on `dataset`.
pub fn train_random_forest(
    dataset: &TrainDataset,
    options: &TrainOptions,
) -> Result<RandomForestModel, String> {
    if dataset.x.len() != dataset.y.len() {
        return Err("Mismatched X/Y lengths".to_string());
    }
    if dataset.x.is_empty() {
        return Err("Empty dataset".to_string());
    }
    let n_classes = dataset.classes.len();
    if n_classes < 2 {
        return Err("Need at least 2 classes".to_string());
    }
    let feature_len = dataset.feature_names.len();
    if feature_len == 0 || feature_len > u16::MAX as usize {
        return Err(format!("Unsupported feature length {feature_len}"));
    }
    if dataset.x.iter().any(|row| row.len() != feature_len) {
        return Err("Inconsistent feature row length".to_string());
    }
    if dataset.y.iter().any(|&label| label >= n_classes) {
        return Err("Label outside class list".to_string());
    }
    if options.n_trees == 0 {
        return Err("Need at least 1 tree".to_string());
    }

    let n = dataset.x.len();
    let mut forest_rng = StdRng::seed_from_u64(options.seed);
    let mut trees = Vec::with_capacity(options.n_trees);
    for _ in 0..options.n_trees {
        let tree_seed: u64 = forest_rng.random();
        let mut rng = StdRng::seed_from_u64(tree_seed);
        let mut indices: Vec<usize> = if options.bootstrap {
            (0..n).map(|_| rng.random_range(0..n)).collect()
        } else {
            (0..n).collect()
        };
        let mut builder = TreeBuilder {
            x: &dataset.x,
            y: &dataset.y,
            n_classes,
            feature_len,
            max_features: options.max_features.resolve(feature_len),
            options,
            rng,
            nodes: Vec::new(),
        };
        builder.grow(&mut indices, 0);
        trees.push(DecisionTree {
            nodes: builder.nodes,
        });
    }

    Ok(RandomForestModel {
        model_version: 1,
        algorithm: ALGORITHM_NAME.to_string(),
        feature_len,
        feature_names: dataset.feature_names.clone(),
        classes: dataset.classes.clone(),
        trees,
        test_split_digest: None,
    })
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f32>],
    y: &'a [usize],
    n_classes: usize,
    feature_len: usize,
    max_features: usize,
    options: &'a TrainOptions,
    rng: StdRng,
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    /// Sum of child impurities weighted by child size.
    score: f64,
    feature_index: usize,
    threshold: f32,
}

impl TreeBuilder<'_> {
    /// Grow the subtree for `indices` and return its root node index.
    fn grow(&mut self, indices: &mut [usize], depth: usize) -> u32 {
        let node_idx = self.nodes.len() as u32;
        let counts = class_counts(self.y, indices, self.n_classes);
        self.nodes.push(Node::Leaf {
            proba: frequencies(&counts),
        });

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let depth_reached = self.options.max_depth.is_some_and(|max| depth >= max);
        if pure || depth_reached || indices.len() < self.options.min_samples_split {
            return node_idx;
        }
        let Some(split) = self.best_split(indices) else {
            return node_idx;
        };

        let mid = partition_in_place(indices, |i| {
            self.x[i][split.feature_index] <= split.threshold
        });
        let (left_rows, right_rows) = indices.split_at_mut(mid);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[node_idx as usize] = Node::Split {
            feature_index: split.feature_index as u16,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }

    /// Visit shuffled features until `max_features` were tried and a split exists.
    fn best_split(&mut self, indices: &[usize]) -> Option<BestSplit> {
        let mut features: Vec<usize> = (0..self.feature_len).collect();
        features.shuffle(&mut self.rng);

        let mut best: Option<BestSplit> = None;
        for (visited, &feature_idx) in features.iter().enumerate() {
            if visited >= self.max_features && best.is_some() {
                break;
            }
            if let Some(split) = self.best_split_for_feature(indices, feature_idx)
                && best.is_none_or(|b| split.score < b.score)
            {
                best = Some(split);
            }
        }
        best
    }

    fn best_split_for_feature(&self, indices: &[usize], feature_idx: usize) -> Option<BestSplit> {
        let mut column: Vec<(f32, usize)> = indices
            .iter()
            .map(|&i| (self.x[i][feature_idx], self.y[i]))
            .collect();
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total = column.len();
        let min_leaf = self.options.min_samples_leaf.max(1);
        let mut right_counts = vec![0usize; self.n_classes];
        for &(_, label) in &column {
            right_counts[label] += 1;
        }
        let mut left_counts = vec![0usize; self.n_classes];

        let mut best: Option<BestSplit> = None;
        for pos in 0..total.saturating_sub(1) {
            let (value, label) = column[pos];
            left_counts[label] += 1;
            right_counts[label] -= 1;
            let next = column[pos + 1].0;
            if value >= next {
                continue;
            }
            let left_n = pos + 1;
            let right_n = total - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }
            let score = weighted_gini(&left_counts, left_n) + weighted_gini(&right_counts, right_n);
            if best.is_none_or(|b| score < b.score) {
                best = Some(BestSplit {
                    score,
                    feature_index: feature_idx,
                    threshold: midpoint(value, next),
                });
            }
        }
        best
    }
}

fn class_counts(y: &[usize], indices: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &i in indices {
        counts[y[i]] += 1;
    }
    counts
}

fn frequencies(counts: &[usize]) -> Vec<f32> {
    let total = counts.iter().sum::<usize>().max(1) as f32;
    counts.iter().map(|&c| c as f32 / total).collect()
}

/// `n * gini(counts)`, i.e. `n - sum(c^2) / n`.
fn weighted_gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let sum_sq: f64 = counts.iter().map(|&c| (c as f64) * (c as f64)).sum();
    n - sum_sq / n
}

/// Threshold between two adjacent distinct values that still sends `low` left.
fn midpoint(low: f32, high: f32) -> f32 {
    let mid = low + (high - low) / 2.0;
    if mid >= high { low } else { mid }
}

/// Reorder `indices` so rows matching `goes_left` come first; returns their count.
fn partition_in_place(indices: &mut [usize], goes_left: impl Fn(usize) -> bool) -> usize {
    let (left, right): (Vec<usize>, Vec<usize>) = indices.iter().partition(|&&i| goes_left(i));
    let mid = left.len();
    indices[..mid].copy_from_slice(&left);
    indices[mid..].copy_from_slice(&right);
    mid
}

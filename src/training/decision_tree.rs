//! Decision tree implementation
//!
//! Binary CART classifier with weighted Gini impurity. Sample weights carry
//! both bootstrap multiplicity and class weighting, so a forest never has to
//! materialise resampled matrices.

use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::{seq::index, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node holding the weighted fraction of positive samples
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Weighted class totals of a node
#[derive(Debug, Clone, Copy, Default)]
struct NodeStats {
    weight: f64,
    positive: f64,
}

impl NodeStats {
    fn gini(&self) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        let p = self.positive / self.weight;
        2.0 * p * (1.0 - p)
    }

    fn is_pure(&self) -> bool {
        self.positive <= 0.0 || self.positive >= self.weight
    }

    fn value(&self) -> f64 {
        if self.weight <= 0.0 {
            0.0
        } else {
            self.positive / self.weight
        }
    }
}

/// Best split found for a node
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree classifier for 0/1 labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn per split (None = all)
    pub max_features: Option<usize>,
    /// Seed for feature subsampling
    pub random_state: u64,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: 0,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set number of features drawn per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit with unit sample weights
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<&mut Self> {
        let weights = vec![1.0; x.nrows()];
        self.fit_weighted(x, y, &weights)
    }

    /// Fit with per-sample weights. Zero-weight samples are ignored.
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<i64>,
        sample_weight: &[f64],
    ) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() || n_samples != sample_weight.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} labels and weights", n_samples),
                actual: format!("{} labels, {} weights", y.len(), sample_weight.len()),
            });
        }
        if y.iter().any(|&label| label != 0 && label != 1) {
            return Err(ChurnError::ValidationError(
                "DecisionTree expects 0/1 labels".to_string(),
            ));
        }

        let indices: Vec<usize> = (0..n_samples).filter(|&i| sample_weight[i] > 0.0).collect();
        if indices.is_empty() {
            return Err(ChurnError::TrainingError("no samples with positive weight".to_string()));
        }

        self.n_features = n_features;
        let mut importances = vec![0.0; n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        let mut builder = Builder {
            tree: self,
            x,
            y,
            w: sample_weight,
            rng: &mut rng,
            importances: &mut importances,
        };
        let root = builder.build(indices, 0);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        self.root = Some(root);
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    /// Probability of the positive class for one row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let mut node = self.root.as_ref().ok_or(ChurnError::ModelNotFitted)?;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return Ok(*value),
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    /// Probability of the positive class for every row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(x)?;
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }

    /// Class labels (probability >= 0.5)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        Ok(self.predict_proba(x)?.mapv(|p| i64::from(p >= 0.5)))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    /// Depth of the fitted tree (0 for a single leaf)
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if self.root.is_none() {
            return Err(ChurnError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }
}

/// Recursive growth state for one fit call
struct Builder<'a> {
    tree: &'a DecisionTree,
    x: &'a Array2<f64>,
    y: &'a Array1<i64>,
    w: &'a [f64],
    rng: &'a mut ChaCha8Rng,
    importances: &'a mut [f64],
}

impl Builder<'_> {
    fn stats(&self, indices: &[usize]) -> NodeStats {
        indices.iter().fold(NodeStats::default(), |mut acc, &i| {
            acc.weight += self.w[i];
            if self.y[i] == 1 {
                acc.positive += self.w[i];
            }
            acc
        })
    }

    fn build(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let stats = self.stats(&indices);
        let leaf = TreeNode::Leaf {
            value: stats.value(),
            n_samples,
        };

        let should_stop = n_samples < self.tree.min_samples_split
            || n_samples < 2 * self.tree.min_samples_leaf
            || self.tree.max_depth.map_or(false, |d| depth >= d)
            || stats.is_pure();
        if should_stop {
            return leaf;
        }

        let Some(best) = self.find_best_split(&indices, &stats) else {
            return leaf;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[[i, best.feature_idx]] <= best.threshold);

        self.importances[best.feature_idx] += stats.weight * best.gain;

        let left = Box::new(self.build(left, depth + 1));
        let right = Box::new(self.build(right, depth + 1));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity: stats.gini(),
        }
    }

    /// Sorted sweep over a random feature subset
    fn find_best_split(&mut self, indices: &[usize], parent: &NodeStats) -> Option<SplitCandidate> {
        let n_features = self.x.ncols();
        let n_try = self.tree.max_features.unwrap_or(n_features).min(n_features);
        let features = index::sample(&mut *self.rng, n_features, n_try).into_vec();

        let parent_impurity = parent.gini();
        let min_leaf = self.tree.min_samples_leaf;
        let mut best: Option<SplitCandidate> = None;
        let mut order: Vec<usize> = indices.to_vec();

        for feature_idx in features {
            order.sort_by(|&a, &b| {
                self.x[[a, feature_idx]].total_cmp(&self.x[[b, feature_idx]])
            });

            let mut left = NodeStats::default();
            for pos in 0..order.len() - 1 {
                let i = order[pos];
                left.weight += self.w[i];
                if self.y[i] == 1 {
                    left.positive += self.w[i];
                }

                let current = self.x[[i, feature_idx]];
                let next = self.x[[order[pos + 1], feature_idx]];
                if next <= current {
                    continue;
                }
                let n_left = pos + 1;
                if n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }

                let right = NodeStats {
                    weight: parent.weight - left.weight,
                    positive: parent.positive - left.positive,
                };
                let child_impurity =
                    (left.weight * left.gini() + right.weight * right.gini()) / parent.weight;
                let gain = parent_impurity - child_impurity;

                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold: current + (next - current) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fits_separable_data() {
        let x = array![[0.0, 5.0], [0.1, 3.0], [0.2, 4.0], [1.0, 5.0], [1.1, 3.0], [1.2, 4.0]];
        let y = array![0, 0, 0, 1, 1, 1];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.depth(), 1);
        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_leaf_value_is_weighted_fraction() {
        let x = array![[0.0], [0.0], [0.0]];
        let y = array![1, 0, 0];

        let mut tree = DecisionTree::new();
        tree.fit_weighted(&x, &y, &[2.0, 1.0, 1.0]).unwrap();

        let p = tree.predict_proba(&array![[0.0]]).unwrap();
        assert!((p[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0]];
        let y = array![0, 1, 0, 1, 0, 1, 0, 1];

        let mut tree = DecisionTree::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 2);
        assert!(tree.n_leaves() <= 4);
    }

    #[test]
    fn test_zero_weight_samples_ignored() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![0, 1, 1];

        let mut tree = DecisionTree::new();
        tree.fit_weighted(&x, &y, &[1.0, 0.0, 1.0]).unwrap();
        if let Some(TreeNode::Split { n_samples, .. }) = tree.root() {
            assert_eq!(*n_samples, 2);
        } else {
            panic!("expected a split");
        }
    }

    #[test]
    fn test_rejects_non_binary_labels() {
        let x = array![[0.0], [1.0]];
        let y = array![0, 2];
        assert!(DecisionTree::new().fit(&x, &y).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::new();
        assert!(matches!(tree.predict(&array![[0.0]]), Err(ChurnError::ModelNotFitted)));
    }
}

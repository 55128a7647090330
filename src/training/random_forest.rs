//! Random Forest implementation

use super::config::{ClassWeight, TrainingConfig};
use super::decision_tree::DecisionTree;
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

/// Random Forest binary classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Maximum features per split (sqrt by default)
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Class weighting
    pub class_weight: ClassWeight,
    /// Random state; tree `i` is seeded with `random_state + i`
    pub random_state: u64,
    /// Weights applied to class 0 and class 1 during the last fit
    class_weights: [f64; 2],
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    /// Create a new forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            class_weight: ClassWeight::Uniform,
            random_state: 42,
            class_weights: [1.0, 1.0],
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Forest hyperparameters from a training configuration
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: config.max_features,
            bootstrap: config.bootstrap,
            class_weight: config.class_weight,
            random_state: config.random_state,
            ..Self::new(config.n_estimators)
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set class weighting
    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    /// Enable or disable bootstrap sampling
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).floor() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }

    fn compute_class_weights(&self, y: &Array1<i64>) -> Result<[f64; 2]> {
        let positives = y.iter().filter(|&&label| label == 1).count();
        let negatives = y.len() - positives;
        if positives == 0 || negatives == 0 {
            return Err(ChurnError::TrainingError(
                "training labels contain a single class".to_string(),
            ));
        }
        Ok(match self.class_weight {
            ClassWeight::Uniform => [1.0, 1.0],
            ClassWeight::Balanced => {
                let n = y.len() as f64;
                [n / (2.0 * negatives as f64), n / (2.0 * positives as f64)]
            }
        })
    }

    /// Fit the forest to 0/1 labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<&mut Self> {
        let start = Instant::now();
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.n_estimators == 0 {
            return Err(ChurnError::ConfigError("n_estimators must be at least 1".to_string()));
        }
        if y.iter().any(|&label| label != 0 && label != 1) {
            return Err(ChurnError::ValidationError(
                "RandomForest expects 0/1 labels".to_string(),
            ));
        }

        let class_weights = self.compute_class_weights(y)?;
        let max_features = self.compute_max_features(n_features);
        let base_seed = self.random_state;

        // Build trees in parallel; each tree owns its seed so the result does
        // not depend on scheduling.
        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let mut weights = vec![0.0; n_samples];
                if self.bootstrap {
                    for _ in 0..n_samples {
                        weights[rng.gen_range(0..n_samples)] += 1.0;
                    }
                } else {
                    weights.iter_mut().for_each(|w| *w = 1.0);
                }
                for (w, &label) in weights.iter_mut().zip(y.iter()) {
                    *w *= class_weights[label as usize];
                }

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_random_state(rng.next_u64());
                tree.max_depth = self.max_depth;

                tree.fit_weighted(x, y, &weights)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.n_features = n_features;
        self.class_weights = class_weights;
        self.compute_feature_importances();

        info!(
            trees = self.trees.len(),
            max_depth = ?self.max_depth,
            max_features,
            samples = n_samples,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Random forest fitted"
        );
        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total_importances = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (total, &val) in total_importances.iter_mut().zip(imp.iter()) {
                    *total += val;
                }
            }
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Probability of class 1: mean of the per-tree leaf probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ChurnError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;

        // Summed in tree order so results are bit-identical across runs
        let mut sum = Array1::<f64>::zeros(x.nrows());
        for proba in &per_tree {
            sum += proba;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Class labels: 1 when the probability is at least 0.5
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        Ok(self.predict_proba(x)?.mapv(|p| i64::from(p >= 0.5)))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Class weights used in the last fit, indexed by label
    pub fn class_weights(&self) -> [f64; 2] {
        self.class_weights
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<i64>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [0.3, 0.1],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
        ];
        let y = array![0, 0, 0, 0, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_classifier() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new(20).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| p == a)
            .count() as f64
            / y.len() as f64;

        assert!(accuracy >= 0.8, "Accuracy too low: {}", accuracy);
    }

    #[test]
    fn test_predict_proba_range_and_threshold() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new(15).with_max_depth(3);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        let labels = rf.predict(&x).unwrap();
        for (p, l) in proba.iter().zip(labels.iter()) {
            assert!((0.0..=1.0).contains(p));
            assert_eq!(*l, i64::from(*p >= 0.5));
        }
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = blobs();
        let mut a = RandomForest::new(10).with_random_state(7);
        let mut b = RandomForest::new(10).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_balanced_class_weights() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new(5).with_class_weight(ClassWeight::Balanced);
        rf.fit(&x, &y).unwrap();

        let [w0, w1] = rf.class_weights();
        assert!((w0 - 7.0 / 8.0).abs() < 1e-12);
        assert!((w1 - 7.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_features_sqrt_floor() {
        let rf = RandomForest::new(1);
        assert_eq!(rf.compute_max_features(45), 6);
        assert_eq!(rf.compute_max_features(1), 1);
    }

    #[test]
    fn test_feature_importances_normalized() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0, 0, 1, 1];

        let mut rf = RandomForest::new(10).with_max_features(MaxFeatures::All);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert!((importances.sum() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_fitted_forest_survives_bincode() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new(6).with_random_state(3);
        rf.fit(&x, &y).unwrap();

        let bytes = bincode::serialize(&rf).unwrap();
        let restored: RandomForest = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored.predict_proba(&x).unwrap(), rf.predict_proba(&x).unwrap());
        assert_eq!(restored.feature_importances(), rf.feature_importances());
    }

    #[test]
    fn test_single_class_rejected() {
        let x = array![[0.0], [1.0]];
        let y = array![1, 1];
        assert!(RandomForest::new(3).fit(&x, &y).is_err());
    }
}

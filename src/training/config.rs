//! Training configuration

use crate::error::{ChurnError, Result};
use crate::preprocessing::PreprocessingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::random_forest::MaxFeatures;

/// Per-class sample weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassWeight {
    /// Every sample weighs 1
    Uniform,
    /// Weights inversely proportional to class frequency: n / (n_classes * count)
    Balanced,
}

/// Configuration for a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of trees
    pub n_estimators: usize,

    /// Maximum depth per tree (None = unlimited)
    pub max_depth: Option<usize>,

    /// Minimum samples to split a node
    pub min_samples_split: usize,

    /// Minimum samples in a leaf
    pub min_samples_leaf: usize,

    /// Features considered per split
    pub max_features: MaxFeatures,

    /// Bootstrap sampling per tree
    pub bootstrap: bool,

    /// Class weighting scheme
    pub class_weight: ClassWeight,

    /// Seed for the split, SMOTE and the forest
    pub random_state: u64,

    /// Fraction of rows held out for evaluation
    pub test_size: f64,

    /// Preserve class ratios in the hold-out split
    pub stratify: bool,

    /// Nearest neighbours used by SMOTE
    pub smote_k_neighbors: usize,

    /// Preprocessing settings
    pub preprocessing: PreprocessingConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: Some(8),
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            class_weight: ClassWeight::Balanced,
            random_state: 42,
            test_size: 0.25,
            stratify: true,
            smote_k_neighbors: 5,
            preprocessing: PreprocessingConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON configuration file; absent keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ChurnError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ChurnError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.preprocessing = preprocessing;
        self
    }

    /// Reject values no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ChurnError::ConfigError("n_estimators must be at least 1".into()));
        }
        if self.max_depth == Some(0) {
            return Err(ChurnError::ConfigError("max_depth must be at least 1".into()));
        }
        if self.min_samples_split < 2 {
            return Err(ChurnError::ConfigError("min_samples_split must be at least 2".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(ChurnError::ConfigError("min_samples_leaf must be at least 1".into()));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ChurnError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.smote_k_neighbors == 0 {
            return Err(ChurnError::ConfigError("smote_k_neighbors must be at least 1".into()));
        }
        if let MaxFeatures::Fraction(f) = self.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return Err(ChurnError::ConfigError(format!(
                    "max_features fraction must be in (0, 1], got {}",
                    f
                )));
            }
        }
        Ok(())
    }
}

//! Inference configuration

use crate::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Records per frame when scoring a batch
    pub batch_size: usize,

    /// Batches at least this large are scored in parallel
    pub parallel_threshold: usize,

    /// Probability at or above which a record is labelled as churn
    pub classification_threshold: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            parallel_threshold: 512,
            classification_threshold: 0.5,
        }
    }
}

impl InferenceConfig {
    /// Create a new inference configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set batch size
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_parallel_threshold(mut self, rows: usize) -> Self {
        self.parallel_threshold = rows;
        self
    }

    /// Builder method to set classification threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.classification_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ChurnError::ConfigError("batch_size must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.classification_threshold) {
            return Err(ChurnError::ConfigError(format!(
                "classification_threshold must be in [0, 1], got {}",
                self.classification_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InferenceConfig::default();
        assert_eq!(config.classification_threshold, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = InferenceConfig::new()
            .with_batch_size(32)
            .with_parallel_threshold(64)
            .with_threshold(0.3);

        assert_eq!(config.batch_size, 32);
        assert_eq!(config.parallel_threshold, 64);
        assert_eq!(config.classification_threshold, 0.3);
        assert!(InferenceConfig::new().with_threshold(1.5).validate().is_err());
        assert!(InferenceConfig::new().with_batch_size(0).validate().is_err());
    }
}

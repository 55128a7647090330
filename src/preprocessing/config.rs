//! Preprocessing configuration

use serde::{Deserialize, Serialize};

/// Which one-hot level, if any, is dropped per column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropStrategy {
    /// Keep every level
    None,
    /// Drop the first level in sorted order (reference level)
    First,
}

/// What to do with a category that was not seen during fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleUnknown {
    /// Encode as all-zero indicators
    Ignore,
    /// Reject with a validation error
    Error,
}

/// Configuration for data preprocessing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// One-hot level dropping
    pub drop: DropStrategy,

    /// Unseen category handling at transform time
    pub handle_unknown: HandleUnknown,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            drop: DropStrategy::First,
            handle_unknown: HandleUnknown::Ignore,
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the one-hot drop strategy
    pub fn with_drop(mut self, drop: DropStrategy) -> Self {
        self.drop = drop;
        self
    }

    /// Reject unseen categories instead of zero-encoding them
    pub fn with_strict_categories(mut self, strict: bool) -> Self {
        self.handle_unknown = if strict {
            HandleUnknown::Error
        } else {
            HandleUnknown::Ignore
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PreprocessingConfig::default();
        assert_eq!(config.drop, DropStrategy::First);
        assert_eq!(config.handle_unknown, HandleUnknown::Ignore);
    }

    #[test]
    fn test_builder_pattern() {
        let config = PreprocessingConfig::new()
            .with_drop(DropStrategy::None)
            .with_strict_categories(true);

        assert_eq!(config.drop, DropStrategy::None);
        assert_eq!(config.handle_unknown, HandleUnknown::Error);
    }

    #[test]
    fn test_serialized_fields() {
        let value = serde_json::to_value(PreprocessingConfig::default()).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["drop", "handle_unknown"]);
    }
}

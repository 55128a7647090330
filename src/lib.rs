//! Churn Predict - telecom customer churn classifier
//!
//! Trains a class-weighted random forest on the Telco churn CSV and scores
//! single customer records against the persisted pipeline.
//!
//! # Modules
//!
//! ## Data
//! - [`schema`] - Column declarations and the customer record type
//! - [`utils`] - CSV loading and cleaning, synthetic sample data
//! - [`feature_engineering`] - Derived columns shared by training and scoring
//!
//! ## Model
//! - [`preprocessing`] - Standard scaling and one-hot encoding
//! - [`synthetic`] - SMOTE oversampling of the minority class
//! - [`training`] - Decision trees, the random forest and the training engine
//! - [`pipeline`] - The fitted preprocessor + resampler + classifier bundle
//! - [`export`] - Model artifact persistence
//! - [`inference`] - Record scoring
//!
//! ## Services
//! - [`server`] - HTML form and JSON API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod schema;
pub mod utils;
pub mod feature_engineering;

// Model
pub mod preprocessing;
pub mod synthetic;
pub mod training;
pub mod pipeline;
pub mod export;
pub mod inference;

// Services
pub mod server;
pub mod cli;

pub use error::{ChurnError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ChurnError, Result};

    // Data
    pub use crate::schema::{CustomerRecord, SCHEMA_VERSION};
    pub use crate::utils::{ChurnDataset, DataLoader, SampleDataGenerator};
    pub use crate::feature_engineering::{add_derived_features, DerivedFeatures};

    // Preprocessing
    pub use crate::preprocessing::{DataPreprocessor, PreprocessingConfig};

    // Synthetic data
    pub use crate::synthetic::{Sampler, SMOTE};

    // Training
    pub use crate::training::{
        ModelMetrics, RandomForest, TrainEngine, TrainingConfig, TrainingOutcome, TrainingReport,
    };

    // Persistence and scoring
    pub use crate::pipeline::ChurnPipeline;
    pub use crate::export::{ModelArtifact, ModelMetadata, DEFAULT_ARTIFACT_PATH};
    pub use crate::inference::{InferenceConfig, InferenceEngine, InferenceStats, Prediction};
}

//! Inference engine module
//!
//! Loads a model artifact once and scores customer records against it:
//! - Single-record scoring from typed records, form fields or JSON
//! - Batch scoring (sequential or parallel via rayon)
//! - Configurable classification threshold
//! - Prediction counters and latency tracking

mod config;
mod engine;

pub use config::InferenceConfig;
pub use engine::{InferenceEngine, InferenceStats, Prediction};

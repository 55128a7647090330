//! Model artifact persistence
//!
//! A trained pipeline is written once by `churn train` and read by every
//! scoring surface afterwards.

mod serializer;

pub use serializer::{ModelArtifact, ModelMetadata, DEFAULT_ARTIFACT_PATH};

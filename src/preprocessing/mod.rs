//! Data preprocessing module
//!
//! Turns the typed customer frame (base plus derived columns) into the dense
//! numeric matrix the classifier consumes:
//! - Feature scaling (standard z-score, min-max)
//! - One-hot categorical encoding with a dropped reference level and
//!   zero-encoding of unseen categories

mod config;
mod encoder;
mod pipeline;
mod scaler;

pub use config::{DropStrategy, HandleUnknown, PreprocessingConfig};
pub use encoder::Encoder;
pub use pipeline::DataPreprocessor;
pub use scaler::{Scaler, ScalerParams};

//! Application state management

use crate::error::Result;
use crate::inference::{InferenceConfig, InferenceEngine};

use super::ServerConfig;

/// Application state shared across handlers.
///
/// The engine is loaded before the listener binds and never replaced, so
/// handlers read it without locking.
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    pub engine: InferenceEngine,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig, engine: InferenceEngine) -> Self {
        Self {
            config,
            engine,
            started_at: chrono::Utc::now(),
        }
    }

    /// Load the configured artifact
    pub fn load(config: ServerConfig) -> Result<Self> {
        let inference = InferenceConfig::new().with_threshold(config.threshold);
        let engine = InferenceEngine::load(inference, &config.model_path)?;
        Ok(Self::new(config, engine))
    }

    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }
}

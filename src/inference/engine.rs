//! Inference engine implementation
//!
//! Scores customer records against a loaded pipeline:
//! - Arc-shared pipeline and metadata, read-only after load
//! - Parallel batch scoring via rayon
//! - Lock-free latency and error counters

use super::InferenceConfig;
use crate::error::Result;
use crate::export::{ModelArtifact, ModelMetadata};
use crate::pipeline::ChurnPipeline;
use crate::schema::{check_numeric_frame, fields_from_json, CustomerRecord};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Outcome of scoring one record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 1 = churn, 0 = stay
    pub label: u8,
    /// Positive-class probability
    pub probability: f64,
}

impl Prediction {
    pub fn is_churn(&self) -> bool {
        self.label == 1
    }

    /// Human-readable verdict, probability to two decimals
    pub fn verdict(&self) -> String {
        let head = if self.is_churn() {
            "Likely to churn"
        } else {
            "Not likely to churn"
        };
        format!("{} (probability: {:.2})", head, self.probability)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.verdict())
    }
}

/// Inference statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceStats {
    pub total_predictions: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
}

/// Scores records with a fitted churn pipeline
pub struct InferenceEngine {
    config: InferenceConfig,
    pipeline: Arc<ChurnPipeline>,
    metadata: Arc<ModelMetadata>,
    predictions: AtomicU64,
    errors: AtomicU64,
    /// Cumulative scoring time in microseconds
    latency_us: AtomicU64,
}

impl fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("config", &self.config)
            .field("model_id", &self.metadata.model_id)
            .field("predictions", &self.predictions.load(Ordering::Relaxed))
            .finish()
    }
}

impl InferenceEngine {
    /// Create an engine around an already fitted pipeline
    pub fn new(config: InferenceConfig, pipeline: ChurnPipeline, metadata: ModelMetadata) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
            metadata: Arc::new(metadata),
            predictions: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            latency_us: AtomicU64::new(0),
        }
    }

    pub fn from_artifact(config: InferenceConfig, artifact: ModelArtifact) -> Self {
        let (pipeline, metadata) = artifact.into_parts();
        Self::new(config, pipeline, metadata)
    }

    /// Load an artifact file
    pub fn load(config: InferenceConfig, path: impl AsRef<Path>) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_artifact(config, ModelArtifact::load(path)?))
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn pipeline(&self) -> &ChurnPipeline {
        &self.pipeline
    }

    /// Score one record
    pub fn score(&self, record: &CustomerRecord) -> Result<Prediction> {
        let start = Instant::now();
        let result = record
            .validate()
            .and_then(|_| self.pipeline.predict_proba(record))
            .map(|p| self.to_prediction(p));
        self.record(&result, 1, start);
        result
    }

    /// Score a record given as named text fields (form submissions)
    pub fn score_fields(&self, fields: &HashMap<String, String>) -> Result<Prediction> {
        match CustomerRecord::from_fields(fields) {
            Ok(record) => self.score(&record),
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Score a record given as a JSON object
    pub fn score_json(&self, object: &serde_json::Map<String, serde_json::Value>) -> Result<Prediction> {
        self.score_fields(&fields_from_json(object))
    }

    /// Score many records; order of the output matches the input
    pub fn score_batch(&self, records: &[CustomerRecord]) -> Result<Vec<Prediction>> {
        let start = Instant::now();
        let result = self.score_batch_inner(records);
        self.record(&result, records.len() as u64, start);
        result
    }

    fn score_batch_inner(&self, records: &[CustomerRecord]) -> Result<Vec<Prediction>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        for record in records {
            record.validate()?;
        }

        let chunk_size = self.config.batch_size.max(1);
        let chunks: Vec<Vec<Prediction>> = if records.len() >= self.config.parallel_threshold {
            debug!(rows = records.len(), chunk_size, "Scoring batch in parallel");
            records
                .par_chunks(chunk_size)
                .map(|chunk| self.score_chunk(chunk))
                .collect::<Result<_>>()?
        } else {
            records
                .chunks(chunk_size)
                .map(|chunk| self.score_chunk(chunk))
                .collect::<Result<_>>()?
        };

        Ok(chunks.into_iter().flatten().collect())
    }

    fn score_chunk(&self, chunk: &[CustomerRecord]) -> Result<Vec<Prediction>> {
        let mut frames = chunk.iter().map(CustomerRecord::to_frame);
        let mut frame = match frames.next() {
            Some(first) => first?,
            None => return Ok(Vec::new()),
        };
        for next in frames {
            frame.vstack_mut(&next?)?;
        }
        self.score_frame_inner(&frame)
    }

    /// Score every row of a frame holding the base feature columns
    pub fn score_frame(&self, frame: &DataFrame) -> Result<Vec<Prediction>> {
        let start = Instant::now();
        let result = check_numeric_frame(frame).and_then(|_| self.score_frame_inner(frame));
        self.record(&result, frame.height() as u64, start);
        result
    }

    fn score_frame_inner(&self, frame: &DataFrame) -> Result<Vec<Prediction>> {
        let proba = self.pipeline.predict_proba_frame(frame)?;
        Ok(proba.iter().map(|&p| self.to_prediction(p)).collect())
    }

    fn to_prediction(&self, probability: f64) -> Prediction {
        Prediction {
            label: u8::from(probability >= self.config.classification_threshold),
            probability,
        }
    }

    fn record<T>(&self, result: &Result<T>, rows: u64, start: Instant) {
        match result {
            Ok(_) => {
                self.predictions.fetch_add(rows, Ordering::Relaxed);
                self.latency_us
                    .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
            }
            Err(_) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Get inference statistics snapshot
    pub fn stats(&self) -> InferenceStats {
        let total = self.predictions.load(Ordering::Relaxed);
        let latency_us = self.latency_us.load(Ordering::Relaxed);
        InferenceStats {
            total_predictions: total,
            error_count: self.errors.load(Ordering::Relaxed),
            avg_latency_ms: if total > 0 {
                latency_us as f64 / total as f64 / 1000.0
            } else {
                0.0
            },
        }
    }
}

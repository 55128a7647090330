//! Model artifact serialization
//!
//! An artifact is one bincode envelope holding a magic tag, a format version,
//! the metadata, the bincode-encoded [`ChurnPipeline`] and an FNV-1a checksum
//! of that payload.

use crate::error::{ChurnError, Result};
use crate::pipeline::ChurnPipeline;
use crate::schema::SCHEMA_VERSION;
use crate::training::{TrainingConfig, TrainingOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the CLI and server look for the model unless told otherwise
pub const DEFAULT_ARTIFACT_PATH: &str = "rf_churn_model.bin";

/// Descriptive data stored next to the fitted pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Unique id of the training run
    pub model_id: String,
    /// Training timestamp (RFC 3339)
    pub trained_at: String,
    /// Input schema the pipeline was fitted against
    pub schema_version: u32,
    pub model_type: String,
    /// Model input columns after encoding
    pub feature_names: Vec<String>,
    pub hyperparameters: BTreeMap<String, String>,
    /// Hold-out metrics
    pub metrics: BTreeMap<String, f64>,
    pub n_rows: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub n_train_resampled: usize,
}

impl ModelMetadata {
    /// Describe a finished training run
    pub fn from_training(config: &TrainingConfig, outcome: &TrainingOutcome) -> Self {
        let report = &outcome.report;
        let mut hyperparameters = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            hyperparameters.insert(key.to_string(), value);
        };
        put("n_estimators", config.n_estimators.to_string());
        put(
            "max_depth",
            config
                .max_depth
                .map_or_else(|| "none".to_string(), |d| d.to_string()),
        );
        put("min_samples_split", config.min_samples_split.to_string());
        put("min_samples_leaf", config.min_samples_leaf.to_string());
        put("max_features", format!("{:?}", config.max_features));
        put("bootstrap", config.bootstrap.to_string());
        put("class_weight", format!("{:?}", config.class_weight));
        put("random_state", config.random_state.to_string());
        put("test_size", config.test_size.to_string());
        put("smote_k_neighbors", config.smote_k_neighbors.to_string());
        put("one_hot_drop", format!("{:?}", config.preprocessing.drop));
        put("handle_unknown", format!("{:?}", config.preprocessing.handle_unknown));

        Self {
            model_id: uuid::Uuid::new_v4().to_string(),
            trained_at: chrono::Utc::now().to_rfc3339(),
            schema_version: SCHEMA_VERSION,
            model_type: "RandomForestClassifier".to_string(),
            feature_names: outcome.pipeline.feature_names().to_vec(),
            hyperparameters,
            metrics: report.metrics.to_pairs().into_iter().collect(),
            n_rows: report.n_rows,
            n_train: report.n_train,
            n_test: report.n_test,
            n_train_resampled: report.n_train_resampled,
        }
    }
}

/// On-disk layout
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope {
    magic: [u8; 4],
    format_version: u32,
    metadata: ModelMetadata,
    payload: Vec<u8>,
    checksum: u64,
}

impl ArtifactEnvelope {
    const MAGIC: [u8; 4] = *b"CHRN";
    const VERSION: u32 = 1;
}

/// Compute checksum using FNV-1a hash
fn fnv1a(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// A fitted pipeline together with its metadata
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub pipeline: ChurnPipeline,
}

impl ModelArtifact {
    pub fn new(pipeline: ChurnPipeline, metadata: ModelMetadata) -> Self {
        Self { metadata, pipeline }
    }

    /// Wrap the outcome of a training run
    pub fn from_training(config: &TrainingConfig, outcome: TrainingOutcome) -> Self {
        let metadata = ModelMetadata::from_training(config, &outcome);
        Self::new(outcome.pipeline, metadata)
    }

    pub fn into_parts(self) -> (ChurnPipeline, ModelMetadata) {
        (self.pipeline, self.metadata)
    }

    /// Encode to the artifact byte format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(&self.pipeline).map_err(|e| {
            ChurnError::SerializationError(format!("Failed to serialize pipeline: {}", e))
        })?;
        let envelope = ArtifactEnvelope {
            magic: ArtifactEnvelope::MAGIC,
            format_version: ArtifactEnvelope::VERSION,
            metadata: self.metadata.clone(),
            checksum: fnv1a(&payload),
            payload,
        };
        bincode::serialize(&envelope).map_err(|e| {
            ChurnError::SerializationError(format!("Failed to serialize artifact: {}", e))
        })
    }

    /// Decode and verify artifact bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope = Self::decode_envelope(bytes)?;
        if fnv1a(&envelope.payload) != envelope.checksum {
            return Err(ChurnError::ArtifactError(
                "checksum mismatch; the artifact is corrupted".to_string(),
            ));
        }
        let pipeline: ChurnPipeline = bincode::deserialize(&envelope.payload).map_err(|e| {
            ChurnError::ArtifactError(format!("cannot decode fitted pipeline: {}", e))
        })?;
        Ok(Self::new(pipeline, envelope.metadata))
    }

    /// Decode the envelope and check its header fields
    fn decode_envelope(bytes: &[u8]) -> Result<ArtifactEnvelope> {
        if bytes.len() < 4 || bytes[..4] != ArtifactEnvelope::MAGIC {
            return Err(ChurnError::ArtifactError(
                "not a churn model artifact (bad magic)".to_string(),
            ));
        }
        let envelope: ArtifactEnvelope = bincode::deserialize(bytes).map_err(|e| {
            ChurnError::ArtifactError(format!("cannot decode artifact: {}", e))
        })?;
        if envelope.format_version != ArtifactEnvelope::VERSION {
            return Err(ChurnError::ArtifactError(format!(
                "unsupported artifact format version {} (expected {})",
                envelope.format_version,
                ArtifactEnvelope::VERSION
            )));
        }
        if envelope.metadata.schema_version != SCHEMA_VERSION {
            return Err(ChurnError::ArtifactError(format!(
                "artifact was fitted on schema version {}, this build reads version {}",
                envelope.metadata.schema_version, SCHEMA_VERSION
            )));
        }
        Ok(envelope)
    }

    /// Write the artifact; a temporary sibling is renamed into place
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let tmp = temporary_sibling(path);

        {
            let file = File::create(&tmp).map_err(|e| {
                ChurnError::ArtifactError(format!("cannot create {}: {}", tmp.display(), e))
            })?;
            let mut writer = BufWriter::new(file);
            writer
                .write_all(&bytes)
                .and_then(|_| writer.flush())
                .map_err(|e| {
                    ChurnError::ArtifactError(format!("cannot write {}: {}", tmp.display(), e))
                })?;
        }
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            ChurnError::ArtifactError(format!("cannot move artifact to {}: {}", path.display(), e))
        })?;

        info!(
            path = %path.display(),
            bytes = bytes.len(),
            model_id = %self.metadata.model_id,
            "Saved model artifact"
        );
        Ok(())
    }

    /// Read and verify an artifact file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = read_file(path)?;
        let artifact = Self::from_bytes(&bytes)
            .map_err(|e| with_path(e, path))?;
        info!(
            path = %path.display(),
            model_id = %artifact.metadata.model_id,
            trees = artifact.pipeline.classifier().n_trees(),
            "Loaded model artifact"
        );
        Ok(artifact)
    }

    /// Read only the metadata, still checking header and checksum
    pub fn read_metadata(path: impl AsRef<Path>) -> Result<ModelMetadata> {
        let path = path.as_ref();
        let bytes = read_file(path)?;
        let envelope = Self::decode_envelope(&bytes).map_err(|e| with_path(e, path))?;
        if fnv1a(&envelope.payload) != envelope.checksum {
            return Err(ChurnError::ArtifactError(format!(
                "{}: checksum mismatch; the artifact is corrupted",
                path.display()
            )));
        }
        Ok(envelope.metadata)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| {
        ChurnError::ArtifactError(format!("cannot open {}: {}", path.display(), e))
    })?;
    let mut bytes = Vec::new();
    BufReader::new(file).read_to_end(&mut bytes).map_err(|e| {
        ChurnError::ArtifactError(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(bytes)
}

fn with_path(err: ChurnError, path: &Path) -> ChurnError {
    match err {
        ChurnError::ArtifactError(msg) => {
            ChurnError::ArtifactError(format!("{}: {}", path.display(), msg))
        }
        other => other,
    }
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DEFAULT_ARTIFACT_PATH.into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::TrainEngine;
    use crate::utils::{DataLoader, SampleDataGenerator};

    fn artifact() -> ModelArtifact {
        let raw = SampleDataGenerator::new(160).generate().unwrap();
        let data = DataLoader::new().load_frame(&raw).unwrap();
        let config = TrainingConfig::new().with_n_estimators(5).with_max_depth(Some(4));
        let outcome = TrainEngine::new(config.clone()).train(&data).unwrap();
        ModelArtifact::from_training(&config, outcome)
    }

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_metadata_describes_run() {
        let art = artifact();
        let meta = &art.metadata;
        assert_eq!(meta.schema_version, SCHEMA_VERSION);
        assert_eq!(meta.hyperparameters["n_estimators"], "5");
        assert_eq!(meta.hyperparameters["max_depth"], "4");
        assert!(meta.metrics.contains_key("accuracy"));
        assert_eq!(meta.n_train + meta.n_test, meta.n_rows);
        assert!(chrono::DateTime::parse_from_rfc3339(&meta.trained_at).is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let art = artifact();
        art.save(&path).unwrap();

        assert!(!dir.path().join("model.bin.tmp").exists());
        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.metadata, art.metadata);
        assert_eq!(ModelArtifact::read_metadata(&path).unwrap(), art.metadata);
    }

    #[test]
    fn test_corruption_detected() {
        let bytes = artifact().to_bytes().unwrap();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(matches!(
            ModelArtifact::from_bytes(&bad_magic),
            Err(ChurnError::ArtifactError(_))
        ));

        // Last payload byte sits just before the trailing u64 checksum
        let mut flipped = bytes.clone();
        let idx = flipped.len() - 9;
        flipped[idx] ^= 0xFF;
        let err = ModelArtifact::from_bytes(&flipped).unwrap_err();
        assert!(err.to_string().contains("checksum"));

        assert!(matches!(
            ModelArtifact::from_bytes(&bytes[..bytes.len() / 2]),
            Err(ChurnError::ArtifactError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ModelArtifact::load("/nonexistent/dir/model.bin").unwrap_err();
        assert!(matches!(err, ChurnError::ArtifactError(_)));
    }
}

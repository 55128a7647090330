//! Integration test: model artifact persistence and failure modes

use churn_predict::export::{ModelArtifact, DEFAULT_ARTIFACT_PATH};
use churn_predict::schema::SCHEMA_VERSION;
use churn_predict::training::{TrainEngine, TrainingConfig};
use churn_predict::utils::{DataLoader, SampleDataGenerator};
use churn_predict::ChurnError;
use std::fs;

fn saved_artifact(dir: &std::path::Path) -> (std::path::PathBuf, ModelArtifact) {
    let raw = SampleDataGenerator::new(200).generate().unwrap();
    let data = DataLoader::new().load_frame(&raw).unwrap();
    let config = TrainingConfig::new().with_n_estimators(6).with_max_depth(Some(4));
    let outcome = TrainEngine::new(config.clone()).train(&data).unwrap();
    let artifact = ModelArtifact::from_training(&config, outcome);

    let path = dir.join(DEFAULT_ARTIFACT_PATH);
    artifact.save(&path).unwrap();
    (path, artifact)
}

fn assert_artifact_error(result: churn_predict::Result<ModelArtifact>) {
    match result {
        Err(ChurnError::ArtifactError(_)) => {}
        Err(other) => panic!("expected ArtifactError, got {}", other),
        Ok(_) => panic!("expected ArtifactError, got a model"),
    }
}

#[test]
fn test_load_restores_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let (path, original) = saved_artifact(dir.path());

    let loaded = ModelArtifact::load(&path).unwrap();
    assert_eq!(loaded.metadata, original.metadata);
    assert_eq!(loaded.metadata.schema_version, SCHEMA_VERSION);
    assert_eq!(
        loaded.pipeline.feature_names(),
        original.pipeline.feature_names()
    );
    assert_eq!(loaded.pipeline.classifier().n_trees(), 6);
    assert_eq!(loaded.pipeline.sampler().k_neighbors(), 5);
}

#[test]
fn test_overwrite_replaces_model() {
    let dir = tempfile::tempdir().unwrap();
    let (path, first) = saved_artifact(dir.path());
    let (_, second) = saved_artifact(dir.path());

    let loaded = ModelArtifact::load(&path).unwrap();
    assert_ne!(first.metadata.model_id, second.metadata.model_id);
    assert_eq!(loaded.metadata.model_id, second.metadata.model_id);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert_artifact_error(ModelArtifact::load(dir.path().join("absent.bin")));
}

#[test]
fn test_empty_and_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty.bin");
    fs::write(&empty, b"").unwrap();
    assert_artifact_error(ModelArtifact::load(&empty));

    let foreign = dir.path().join("foreign.bin");
    fs::write(&foreign, b"customerID,gender\n1,Male\n").unwrap();
    assert_artifact_error(ModelArtifact::load(&foreign));
}

#[test]
fn test_truncated_file() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = saved_artifact(dir.path());

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 100]).unwrap();
    assert_artifact_error(ModelArtifact::load(&path));
}

#[test]
fn test_corrupted_payload() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = saved_artifact(dir.path());

    let mut bytes = fs::read(&path).unwrap();
    // Payload sits just before the trailing 8-byte checksum
    let idx = bytes.len() - 20;
    bytes[idx] = bytes[idx].wrapping_add(1);
    fs::write(&path, &bytes).unwrap();

    assert_artifact_error(ModelArtifact::load(&path));
    assert!(matches!(
        ModelArtifact::read_metadata(&path),
        Err(ChurnError::ArtifactError(_))
    ));
}

//! Training engine implementation
//!
//! One training run: split, fit the preprocessor on the training part,
//! rebalance it with SMOTE, fit the forest, then score the untouched hold-out
//! part.

use super::config::TrainingConfig;
use super::metrics::ModelMetrics;
use super::random_forest::RandomForest;
use super::split::train_test_split;
use crate::error::{ChurnError, Result};
use crate::feature_engineering::add_derived_features;
use crate::pipeline::ChurnPipeline;
use crate::preprocessing::DataPreprocessor;
use crate::synthetic::{Sampler, SMOTE};
use crate::utils::data_loader::{ChurnDataset, DataLoader};
use ndarray::{Array1, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Summary of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Hold-out metrics
    pub metrics: ModelMetrics,
    /// Rows in the loaded dataset
    pub n_rows: usize,
    /// Rows in the training split, before resampling
    pub n_train: usize,
    /// Rows in the hold-out split
    pub n_test: usize,
    /// Rows the forest was fitted on (training split plus synthetic rows)
    pub n_train_resampled: usize,
    /// Blank `TotalCharges` cells filled during loading
    pub imputed_total_charges: usize,
    /// Fill value used for those cells
    pub total_charges_median: f64,
    /// Width of the model input
    pub n_features: usize,
    pub training_time_secs: f64,
    /// Most important features, descending
    pub top_features: Vec<(String, f64)>,
}

impl TrainingReport {
    /// Generate a text report summarizing the run
    pub fn generate_report(&self) -> String {
        let mut report = String::new();
        report.push_str("=== Churn Model Training Report ===\n\n");

        report.push_str("--- Data ---\n");
        report.push_str(&format!("Rows:            {}\n", self.n_rows));
        report.push_str(&format!("Train / hold-out: {} / {}\n", self.n_train, self.n_test));
        report.push_str(&format!("After SMOTE:     {}\n", self.n_train_resampled));
        report.push_str(&format!(
            "Imputed TotalCharges: {} (median {:.2})\n",
            self.imputed_total_charges, self.total_charges_median
        ));
        report.push_str(&format!("Features:        {}\n\n", self.n_features));

        report.push_str("--- Hold-out Metrics ---\n");
        report.push_str(&format!("Accuracy:  {:.4}\n", self.metrics.accuracy));
        report.push_str(&format!("Precision: {:.4}\n", self.metrics.precision));
        report.push_str(&format!("Recall:    {:.4}\n", self.metrics.recall));
        report.push_str(&format!("F1 Score:  {:.4}\n", self.metrics.f1_score));
        if let Some(v) = self.metrics.roc_auc {
            report.push_str(&format!("ROC AUC:   {:.4}\n", v));
        }
        report.push('\n');

        if !self.top_features.is_empty() {
            report.push_str("--- Feature Importance ---\n");
            for (name, imp) in &self.top_features {
                report.push_str(&format!("  {:<40} {:.4}\n", name, imp));
            }
            report.push('\n');
        }

        report.push_str(&format!("Training time: {:.2}s\n", self.training_time_secs));
        report
    }
}

/// Fitted pipeline plus the report of the run that produced it
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub pipeline: ChurnPipeline,
    pub report: TrainingReport,
}

/// Orchestrates a training run
#[derive(Debug, Clone)]
pub struct TrainEngine {
    config: TrainingConfig,
}

impl TrainEngine {
    /// Number of features listed in the report
    const TOP_FEATURES: usize = 10;

    /// Create a new training engine
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load a CSV and train on it
    pub fn train_csv(&self, path: impl AsRef<Path>) -> Result<TrainingOutcome> {
        let dataset = DataLoader::new().load_csv(path)?;
        self.train(&dataset)
    }

    /// Train on an already loaded dataset
    pub fn train(&self, dataset: &ChurnDataset) -> Result<TrainingOutcome> {
        let start = Instant::now();
        self.config.validate()?;

        if dataset.labels.len() != dataset.len() {
            return Err(ChurnError::DataError(format!(
                "expected {} labels, found {}",
                dataset.len(),
                dataset.labels.len()
            )));
        }
        let y: Array1<i64> = dataset.labels.iter().map(|&label| i64::from(label)).collect();

        let split = train_test_split(
            &y,
            self.config.test_size,
            self.config.stratify,
            self.config.random_state,
        )?;

        let frame = add_derived_features(&dataset.frame)?;
        let train_frame = take_rows(&frame, &split.train_indices)?;
        let test_frame = take_rows(&frame, &split.test_indices)?;
        let y_train = y.select(Axis(0), &split.train_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        info!(
            train = split.train_indices.len(),
            test = split.test_indices.len(),
            stratified = self.config.stratify,
            "Split dataset"
        );

        let mut preprocessor = DataPreprocessor::with_config(self.config.preprocessing.clone());
        let x_train = preprocessor.fit_transform(&train_frame)?;
        let x_test = preprocessor.transform(&test_frame)?;

        let mut sampler = SMOTE::new()
            .with_k_neighbors(self.config.smote_k_neighbors)
            .with_seed(self.config.random_state);
        let resampled = sampler.fit_resample(&x_train, &y_train)?;

        let mut forest = RandomForest::from_config(&self.config);
        forest.fit(&resampled.x, &resampled.y)?;

        let proba = forest.predict_proba(&x_test)?;
        let y_pred = proba.mapv(|p| i64::from(p >= 0.5));
        let metrics = ModelMetrics::compute_classification(&y_test, &y_pred, Some(&proba));

        info!(
            accuracy = metrics.accuracy,
            precision = metrics.precision,
            recall = metrics.recall,
            f1 = metrics.f1_score,
            roc_auc = ?metrics.roc_auc,
            "Hold-out evaluation"
        );

        let pipeline = ChurnPipeline::new(preprocessor, sampler, forest);
        let mut top_features = pipeline.ranked_importances();
        top_features.truncate(Self::TOP_FEATURES);

        let report = TrainingReport {
            metrics,
            n_rows: dataset.len(),
            n_train: split.train_indices.len(),
            n_test: split.test_indices.len(),
            n_train_resampled: resampled.x.nrows(),
            imputed_total_charges: dataset.imputed_total_charges,
            total_charges_median: dataset.total_charges_median,
            n_features: pipeline.feature_names().len(),
            training_time_secs: start.elapsed().as_secs_f64(),
            top_features,
        };

        info!(
            elapsed_secs = report.training_time_secs,
            features = report.n_features,
            "Training run complete"
        );
        Ok(TrainingOutcome { pipeline, report })
    }
}

fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::sample_data::SampleDataGenerator;

    fn dataset(rows: usize) -> ChurnDataset {
        let raw = SampleDataGenerator::new(rows).generate().unwrap();
        DataLoader::new().load_frame(&raw).unwrap()
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig::new().with_n_estimators(15).with_max_depth(Some(5))
    }

    #[test]
    fn test_train_produces_report() {
        let data = dataset(400);
        let outcome = TrainEngine::new(small_config()).train(&data).unwrap();
        let report = &outcome.report;

        assert_eq!(report.n_rows, 400);
        assert_eq!(report.n_train + report.n_test, 400);
        assert!(report.n_train_resampled >= report.n_train);
        assert!(report.metrics.accuracy > 0.5);
        assert!(report.metrics.roc_auc.is_some());
        assert_eq!(outcome.pipeline.classifier().n_trees(), 15);
        assert!(report.generate_report().contains("Hold-out Metrics"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let data = dataset(50);
        let err = TrainEngine::new(TrainingConfig::new().with_test_size(0.0))
            .train(&data)
            .unwrap_err();
        assert!(matches!(err, ChurnError::ConfigError(_)));
    }

    #[test]
    fn test_unlabelled_dataset_rejected() {
        let mut data = dataset(50);
        data.labels.clear();
        let err = TrainEngine::new(small_config()).train(&data).unwrap_err();
        assert!(matches!(err, ChurnError::DataError(_)));
    }
}

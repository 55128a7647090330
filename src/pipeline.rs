//! The fitted churn pipeline
//!
//! Bundles the frozen preprocessor, the resampler configuration used during
//! training and the trained forest. It is produced once by a training run,
//! persisted as a single artifact and only read afterwards.

use crate::error::Result;
use crate::feature_engineering::add_derived_features;
use crate::preprocessing::DataPreprocessor;
use crate::schema::CustomerRecord;
use crate::synthetic::SMOTE;
use crate::training::RandomForest;
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Preprocessor + resampler + classifier, scored as one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnPipeline {
    preprocessor: DataPreprocessor,
    sampler: SMOTE,
    classifier: RandomForest,
}

impl ChurnPipeline {
    pub fn new(preprocessor: DataPreprocessor, sampler: SMOTE, classifier: RandomForest) -> Self {
        Self {
            preprocessor,
            sampler,
            classifier,
        }
    }

    /// Derive features and apply the frozen preprocessing to base columns
    pub fn transform_frame(&self, base: &DataFrame) -> Result<Array2<f64>> {
        let with_derived = add_derived_features(base)?;
        self.preprocessor.transform(&with_derived)
    }

    /// Positive-class probability for every row of a base-column frame
    pub fn predict_proba_frame(&self, base: &DataFrame) -> Result<Array1<f64>> {
        let x = self.transform_frame(base)?;
        self.classifier.predict_proba(&x)
    }

    /// Positive-class probability for one record
    pub fn predict_proba(&self, record: &CustomerRecord) -> Result<f64> {
        let proba = self.predict_proba_frame(&record.to_frame()?)?;
        Ok(proba[0])
    }

    /// Label for one record at the 0.5 threshold
    pub fn predict(&self, record: &CustomerRecord) -> Result<i64> {
        Ok(i64::from(self.predict_proba(record)? >= 0.5))
    }

    pub fn feature_names(&self) -> &[String] {
        self.preprocessor.feature_names()
    }

    pub fn preprocessor(&self) -> &DataPreprocessor {
        &self.preprocessor
    }

    pub fn sampler(&self) -> &SMOTE {
        &self.sampler
    }

    pub fn classifier(&self) -> &RandomForest {
        &self.classifier
    }

    /// Feature names paired with normalised importances, most important first
    pub fn ranked_importances(&self) -> Vec<(String, f64)> {
        let Some(importances) = self.classifier.feature_importances() else {
            return Vec::new();
        };
        let mut ranked: Vec<(String, f64)> = self
            .feature_names()
            .iter()
            .cloned()
            .zip(importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

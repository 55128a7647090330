//! Data preprocessing pipeline

use super::{
    config::PreprocessingConfig,
    encoder::Encoder,
    scaler::Scaler,
};
use crate::error::{ChurnError, Result};
use crate::schema;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Column-type-aware preprocessor: scales numeric columns and one-hot
/// encodes categorical columns into a fixed-order numeric matrix.
///
/// Output order is the numeric columns followed by the one-hot blocks, each
/// in schema order. The order is fixed at fit time and reported by
/// [`DataPreprocessor::feature_names`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPreprocessor {
    config: PreprocessingConfig,
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    scaler: Option<Scaler>,
    encoder: Option<Encoder>,
    feature_names: Vec<String>,
    is_fitted: bool,
    /// Timing: seconds spent in last fit call
    fit_time: Option<f64>,
}

impl Default for DataPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DataPreprocessor {
    /// Create a new preprocessor with default configuration
    pub fn new() -> Self {
        Self::with_config(PreprocessingConfig::default())
    }

    /// Create a new preprocessor with custom configuration
    pub fn with_config(config: PreprocessingConfig) -> Self {
        Self {
            config,
            numeric_columns: schema::numeric_columns().into_iter().map(String::from).collect(),
            categorical_columns: schema::categorical_columns()
                .into_iter()
                .map(String::from)
                .collect(),
            scaler: None,
            encoder: None,
            feature_names: Vec::new(),
            is_fitted: false,
            fit_time: None,
        }
    }

    /// Learn scaling parameters and category vocabularies.
    ///
    /// `df` must already carry the derived feature columns.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let start = Instant::now();
        self.check_columns(df)?;

        let numeric: Vec<&str> = self.numeric_columns.iter().map(String::as_str).collect();
        let categorical: Vec<&str> = self.categorical_columns.iter().map(String::as_str).collect();

        let mut scaler = Scaler::new();
        scaler.fit(df, &numeric)?;

        let mut encoder = Encoder::new(self.config.drop, self.config.handle_unknown);
        encoder.fit(df, &categorical)?;

        self.feature_names = self
            .numeric_columns
            .iter()
            .cloned()
            .chain(encoder.feature_names())
            .collect();
        self.scaler = Some(scaler);
        self.encoder = Some(encoder);
        self.is_fitted = true;
        self.fit_time = Some(start.elapsed().as_secs_f64());

        info!(
            rows = df.height(),
            numeric = self.numeric_columns.len(),
            categorical = self.categorical_columns.len(),
            output_width = self.feature_names.len(),
            "Preprocessor fitted"
        );
        Ok(self)
    }

    /// Apply the frozen parameters, producing one row per input row
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let (scaler, encoder) = match (&self.scaler, &self.encoder) {
            (Some(s), Some(e)) if self.is_fitted => (s, e),
            _ => return Err(ChurnError::ModelNotFitted),
        };
        self.check_columns(df)?;

        let scaled = scaler.transform(df)?;
        let encoded = encoder.transform(df)?;

        let n_rows = df.height();
        let mut out = Array2::<f64>::zeros((n_rows, self.feature_names.len()));

        let sources = self
            .numeric_columns
            .iter()
            .map(|name| scaled.column(name))
            .chain(encoded.get_columns().iter().map(Ok));

        for (j, column) in sources.enumerate() {
            let values = column?.f64()?;
            for (i, value) in values.into_iter().enumerate() {
                out[[i, j]] = value.unwrap_or(0.0);
            }
        }

        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Output column names, in output order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Width of the output matrix
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    pub fn fit_time(&self) -> Option<f64> {
        self.fit_time
    }

    pub fn encoder(&self) -> Option<&Encoder> {
        self.encoder.as_ref()
    }

    pub fn scaler(&self) -> Option<&Scaler> {
        self.scaler.as_ref()
    }

    fn check_columns(&self, df: &DataFrame) -> Result<()> {
        for name in self.numeric_columns.iter().chain(&self.categorical_columns) {
            if df.column(name).is_err() {
                return Err(ChurnError::SchemaError(format!(
                    "input is missing required column '{}'",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_engineering::add_derived_features;
    use crate::utils::sample_data::SampleDataGenerator;
    use crate::utils::DataLoader;

    fn training_frame() -> DataFrame {
        let raw = SampleDataGenerator::new(120).generate().unwrap();
        let dataset = DataLoader::new().load_frame(&raw).unwrap();
        add_derived_features(&dataset.frame).unwrap()
    }

    #[test]
    fn test_fit_transform_shape_and_order() {
        let df = training_frame();
        let mut pre = DataPreprocessor::new();
        let x = pre.fit_transform(&df).unwrap();

        assert_eq!(x.nrows(), df.height());
        assert_eq!(x.ncols(), pre.n_features());
        assert_eq!(&pre.feature_names()[..2], &["SeniorCitizen", "tenure"]);
        assert_eq!(pre.feature_names()[5], "Is_Long_Term");
        assert_eq!(pre.feature_names()[6], "gender_Male");
    }

    #[test]
    fn test_scaled_columns_are_centered() {
        let df = training_frame();
        let mut pre = DataPreprocessor::new();
        let x = pre.fit_transform(&df).unwrap();

        let tenure = x.column(1);
        assert!(tenure.mean().unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_transform_before_fit() {
        let pre = DataPreprocessor::new();
        assert!(matches!(pre.transform(&training_frame()), Err(ChurnError::ModelNotFitted)));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let df = training_frame();
        let mut pre = DataPreprocessor::new();
        pre.fit(&df).unwrap();

        let trimmed = df.drop("Contract").unwrap();
        assert!(matches!(pre.transform(&trimmed), Err(ChurnError::SchemaError(_))));
    }
}

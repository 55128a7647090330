//! Z-score feature scaling

use crate::error::{ChurnError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters for a fitted scaler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// Column mean
    pub center: f64,
    /// Population standard deviation, 1 for a constant column
    pub scale: f64,
}

/// Standard scaler: (x - mean) / std
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scaler {
    params: BTreeMap<String, ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.params.clear();
        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| ChurnError::SchemaError(format!("missing column '{}'", col_name)))?;
            let params = self.compute_params(column.as_materialized_series())?;
            self.params.insert(col_name.to_string(), params);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data.
    /// Scaled columns replace the originals; other columns pass through.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ChurnError::ModelNotFitted);
        }

        let replacements: Vec<Series> = self
            .params
            .iter()
            .map(|(col_name, params)| {
                let column = df.column(col_name).map_err(|_| {
                    ChurnError::SchemaError(format!("missing column '{}'", col_name))
                })?;
                self.scale_series(column.as_materialized_series(), params)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result.with_column(scaled)?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Fitted parameters for one column
    pub fn params(&self, column: &str) -> Option<&ScalerParams> {
        self.params.get(column)
    }

    fn compute_params(&self, series: &Series) -> Result<ScalerParams> {
        let casted = series.cast(&DataType::Float64)?;
        let ca = casted.f64()?;

        // Population standard deviation (ddof = 0)
        let mean = ca.mean().unwrap_or(0.0);
        let std = ca.std(0).unwrap_or(0.0);
        Ok(ScalerParams {
            center: mean,
            scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
        })
    }

    fn scale_series(&self, series: &Series, params: &ScalerParams) -> Result<Series> {
        let casted = series.cast(&DataType::Float64)?;
        let ca = casted.f64()?;

        let scaled: Float64Chunked = ca
            .into_iter()
            .map(|opt| opt.map(|v| (v - params.center) / params.scale))
            .collect();

        Ok(scaled.with_name(series.name().clone()).into_series())
    }
}

//! Derived feature columns
//!
//! The two derived columns are defined once, in [`DerivedFeatures::from_base`],
//! and applied to frames through [`add_derived_features`]. Training applies it
//! to the whole dataset and scoring applies it to a one-row frame, so both
//! paths share the same code.

use crate::error::Result;
use crate::schema::{AVG_CHARGES, IS_LONG_TERM};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tenure (in months) above which a customer counts as long-term
pub const LONG_TERM_MONTHS: f64 = 24.0;

/// Features computed from the base record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    /// Total charges per active month: `total / (tenure + 1)`
    pub avg_charges: f64,
    /// 1.0 if `tenure > 24`, else 0.0
    pub is_long_term: f64,
}

impl DerivedFeatures {
    pub fn from_base(tenure: f64, total_charges: f64) -> Self {
        Self {
            avg_charges: total_charges / (tenure + 1.0),
            is_long_term: if tenure > LONG_TERM_MONTHS { 1.0 } else { 0.0 },
        }
    }
}

/// Return a copy of `df` with `AvgCharges` and `Is_Long_Term` set.
///
/// Existing derived columns are replaced, so applying this twice gives the
/// same frame as applying it once.
pub fn add_derived_features(df: &DataFrame) -> Result<DataFrame> {
    let tenure = df.column("tenure")?.f64()?;
    let total = df.column("TotalCharges")?.f64()?;

    let (avg, long_term): (Vec<f64>, Vec<f64>) = tenure
        .into_iter()
        .zip(total.into_iter())
        .map(|(t, c)| {
            let derived = DerivedFeatures::from_base(t.unwrap_or(0.0), c.unwrap_or(0.0));
            (derived.avg_charges, derived.is_long_term)
        })
        .unzip();

    let mut result = df.clone();
    result.with_column(Column::new(AVG_CHARGES.into(), avg))?;
    result.with_column(Column::new(IS_LONG_TERM.into(), long_term))?;

    debug!(rows = result.height(), "Derived features added");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tenure: &[f64], total: &[f64]) -> DataFrame {
        DataFrame::new(vec![
            Column::new("tenure".into(), tenure.to_vec()),
            Column::new("TotalCharges".into(), total.to_vec()),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_base() {
        let d = DerivedFeatures::from_base(0.0, 70.0);
        assert_eq!(d.avg_charges, 70.0);
        assert_eq!(d.is_long_term, 0.0);

        assert_eq!(DerivedFeatures::from_base(24.0, 0.0).is_long_term, 0.0);
        assert_eq!(DerivedFeatures::from_base(25.0, 0.0).is_long_term, 1.0);
        assert_eq!(DerivedFeatures::from_base(72.0, 0.0).is_long_term, 1.0);
    }

    #[test]
    fn test_add_derived_features() {
        let df = frame(&[0.0, 9.0, 30.0], &[70.0, 100.0, 310.0]);
        let out = add_derived_features(&df).unwrap();

        let avg = out.column(AVG_CHARGES).unwrap().f64().unwrap();
        assert_eq!(avg.get(0), Some(70.0));
        assert_eq!(avg.get(1), Some(10.0));
        assert_eq!(avg.get(2), Some(10.0));

        let flag = out.column(IS_LONG_TERM).unwrap().f64().unwrap();
        assert_eq!(flag.get(2), Some(1.0));
        assert_eq!(flag.get(0), Some(0.0));
    }

    #[test]
    fn test_idempotent() {
        let df = frame(&[3.0, 40.0], &[30.0, 4100.0]);
        let once = add_derived_features(&df).unwrap();
        let twice = add_derived_features(&once).unwrap();
        assert_eq!(once.width(), twice.width());
        assert!(once.equals(&twice));
    }

    #[test]
    fn test_missing_base_column() {
        let df = DataFrame::new(vec![Column::new("tenure".into(), vec![1.0])]).unwrap();
        assert!(add_derived_features(&df).is_err());
    }
}

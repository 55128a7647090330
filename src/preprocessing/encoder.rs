//! One-hot categorical encoding

use super::config::{DropStrategy, HandleUnknown};
use crate::error::{ChurnError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Learned vocabulary for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ColumnVocabulary {
    name: String,
    /// All levels seen during fit, sorted
    categories: Vec<String>,
    /// Index into `categories` of the dropped reference level
    dropped: Option<usize>,
}

impl ColumnVocabulary {
    fn kept(&self) -> impl Iterator<Item = (usize, &String)> {
        self.categories
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != self.dropped)
    }

    fn width(&self) -> usize {
        self.categories.len() - usize::from(self.dropped.is_some())
    }
}

/// One-hot encoder with a frozen, sorted vocabulary per column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encoder {
    drop: DropStrategy,
    handle_unknown: HandleUnknown,
    vocabularies: Vec<ColumnVocabulary>,
    is_fitted: bool,
}

impl Encoder {
    /// Create a new encoder
    pub fn new(drop: DropStrategy, handle_unknown: HandleUnknown) -> Self {
        Self {
            drop,
            handle_unknown,
            vocabularies: Vec::new(),
            is_fitted: false,
        }
    }

    /// Learn the sorted set of levels of every column
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.vocabularies.clear();
        for col_name in columns {
            let values = string_column(df, col_name)?;
            let categories: Vec<String> = values
                .into_iter()
                .flatten()
                .map(str::to_string)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let dropped = match self.drop {
                DropStrategy::First if !categories.is_empty() => Some(0),
                _ => None,
            };

            self.vocabularies.push(ColumnVocabulary {
                name: col_name.to_string(),
                categories,
                dropped,
            });
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Encode into a frame of `f64` indicator columns named `column_level`.
    ///
    /// A level outside the vocabulary (and the dropped reference level)
    /// encodes as all zeros, unless the encoder is strict.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ChurnError::ModelNotFitted);
        }

        let n_rows = df.height();
        let mut columns = Vec::with_capacity(self.n_features());

        for vocab in &self.vocabularies {
            let values = string_column(df, &vocab.name)?;
            let mut indicators = vec![vec![0.0_f64; n_rows]; vocab.width()];

            for (row, value) in values.into_iter().enumerate() {
                let position = value.and_then(|v| {
                    vocab.categories.binary_search_by(|c| c.as_str().cmp(v)).ok()
                });
                match position {
                    Some(idx) => {
                        if let Some(slot) = vocab.kept().position(|(i, _)| i == idx) {
                            indicators[slot][row] = 1.0;
                        }
                    }
                    None if self.handle_unknown == HandleUnknown::Error => {
                        return Err(ChurnError::ValidationError(format!(
                            "unknown category '{}' for column '{}'",
                            value.unwrap_or(""),
                            vocab.name
                        )));
                    }
                    None => {}
                }
            }

            for ((_, level), values) in vocab.kept().zip(indicators) {
                let name = format!("{}_{}", vocab.name, level);
                columns.push(Column::new(name.into(), values));
            }
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Output column names, in output order
    pub fn feature_names(&self) -> Vec<String> {
        self.vocabularies
            .iter()
            .flat_map(|vocab| {
                vocab
                    .kept()
                    .map(|(_, level)| format!("{}_{}", vocab.name, level))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Number of output columns
    pub fn n_features(&self) -> usize {
        self.vocabularies.iter().map(ColumnVocabulary::width).sum()
    }

    /// Levels learned for a column, sorted
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.vocabularies
            .iter()
            .find(|v| v.name == column)
            .map(|v| v.categories.as_slice())
    }
}

fn string_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked> {
    let column = df
        .column(name)
        .map_err(|_| ChurnError::SchemaError(format!("missing column '{}'", name)))?;
    column
        .str()
        .map_err(|_| ChurnError::SchemaError(format!("column '{}' is not categorical text", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(values: &[&str]) -> DataFrame {
        DataFrame::new(vec![Column::new(
            "Contract".into(),
            values.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        )])
        .unwrap()
    }

    fn fitted(drop: DropStrategy, unknown: HandleUnknown) -> Encoder {
        let mut encoder = Encoder::new(drop, unknown);
        encoder
            .fit(&frame(&["Two year", "Month-to-month", "One year", "One year"]), &["Contract"])
            .unwrap();
        encoder
    }

    #[test]
    fn test_drop_first_sorted() {
        let encoder = fitted(DropStrategy::First, HandleUnknown::Ignore);
        assert_eq!(
            encoder.categories("Contract").unwrap(),
            &["Month-to-month", "One year", "Two year"]
        );
        assert_eq!(
            encoder.feature_names(),
            vec!["Contract_One year", "Contract_Two year"]
        );
    }

    #[test]
    fn test_transform_indicators() {
        let encoder = fitted(DropStrategy::First, HandleUnknown::Ignore);
        let out = encoder
            .transform(&frame(&["Month-to-month", "One year", "Two year"]))
            .unwrap();

        let one = out.column("Contract_One year").unwrap().f64().unwrap();
        let two = out.column("Contract_Two year").unwrap().f64().unwrap();
        assert_eq!(one.get(0), Some(0.0));
        assert_eq!(two.get(0), Some(0.0));
        assert_eq!(one.get(1), Some(1.0));
        assert_eq!(two.get(2), Some(1.0));
    }

    #[test]
    fn test_unknown_category_is_all_zero() {
        let encoder = fitted(DropStrategy::First, HandleUnknown::Ignore);
        let out = encoder.transform(&frame(&["Decade"])).unwrap();
        for column in out.get_columns() {
            assert_eq!(column.f64().unwrap().get(0), Some(0.0));
        }
    }

    #[test]
    fn test_strict_rejects_unknown() {
        let encoder = fitted(DropStrategy::First, HandleUnknown::Error);
        let err = encoder.transform(&frame(&["Decade"])).unwrap_err();
        assert!(matches!(err, ChurnError::ValidationError(_)));
    }

    #[test]
    fn test_keep_all_levels() {
        let encoder = fitted(DropStrategy::None, HandleUnknown::Ignore);
        assert_eq!(encoder.n_features(), 3);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let encoder = fitted(DropStrategy::First, HandleUnknown::Ignore);
        let other = DataFrame::new(vec![Column::new("gender".into(), vec!["Male".to_string()])]).unwrap();
        assert!(matches!(encoder.transform(&other), Err(ChurnError::SchemaError(_))));
    }
}

//! Integration test: preprocessing fitted on loaded churn data

use churn_predict::feature_engineering::add_derived_features;
use churn_predict::preprocessing::{DataPreprocessor, DropStrategy, PreprocessingConfig};
use churn_predict::schema::{categorical_columns, numeric_columns};
use churn_predict::utils::{DataLoader, SampleDataGenerator};
use churn_predict::ChurnError;
use polars::prelude::*;

fn engineered_frame(rows: usize) -> DataFrame {
    let raw = SampleDataGenerator::new(rows).generate().unwrap();
    let data = DataLoader::new().load_frame(&raw).unwrap();
    add_derived_features(&data.frame).unwrap()
}

#[test]
fn test_output_layout() {
    let df = engineered_frame(300);
    let mut pre = DataPreprocessor::new();
    let x = pre.fit_transform(&df).unwrap();

    assert_eq!(x.nrows(), 300);
    assert_eq!(x.ncols(), pre.n_features());

    // Numeric columns come first, in declaration order
    let names = pre.feature_names();
    for (i, col) in numeric_columns().iter().enumerate() {
        assert_eq!(names[i], *col);
    }
    assert!(names.iter().any(|n| n == "Contract_One year"));
    assert!(!names.iter().any(|n| n == "Contract_Month-to-month"));
}

#[test]
fn test_scaled_columns_are_standardized() {
    let df = engineered_frame(400);
    let mut pre = DataPreprocessor::new();
    let x = pre.fit_transform(&df).unwrap();

    for j in 0..numeric_columns().len() {
        let col = x.column(j);
        let mean = col.mean().unwrap();
        let var = col.mapv(|v| (v - mean).powi(2)).mean().unwrap();
        assert!(mean.abs() < 1e-9, "column {} mean {}", j, mean);
        assert!((var - 1.0).abs() < 1e-6 || var == 0.0, "column {} var {}", j, var);
    }
}

#[test]
fn test_indicators_are_binary_and_one_hot() {
    let df = engineered_frame(200);
    let mut pre = DataPreprocessor::with_config(PreprocessingConfig::new().with_drop(DropStrategy::None));
    let x = pre.fit_transform(&df).unwrap();

    let n_numeric = numeric_columns().len();
    for row in x.rows() {
        let indicators = row.slice(ndarray::s![n_numeric..]);
        assert!(indicators.iter().all(|&v| v == 0.0 || v == 1.0));
        // Without dropping, each categorical column contributes exactly one 1
        let ones = indicators.iter().filter(|&&v| v == 1.0).count();
        assert_eq!(ones, categorical_columns().len());
    }
}

#[test]
fn test_transform_is_frozen() {
    let train = engineered_frame(300);
    let mut pre = DataPreprocessor::new();
    pre.fit(&train).unwrap();

    let first = pre.transform(&train.head(Some(10))).unwrap();
    let again = pre.transform(&train.head(Some(10))).unwrap();
    assert_eq!(first, again);

    // A single row transforms to the same values it had inside the batch
    let single = pre.transform(&train.slice(3, 1)).unwrap();
    assert_eq!(single.row(0), first.row(3));
}

#[test]
fn test_missing_column_rejected() {
    let df = engineered_frame(100);
    let mut pre = DataPreprocessor::new();
    pre.fit(&df).unwrap();

    let err = pre.transform(&df.drop("PaymentMethod").unwrap()).unwrap_err();
    assert!(matches!(err, ChurnError::SchemaError(_)));
}

#[test]
fn test_strict_categories_reject_unseen() {
    let df = engineered_frame(100);
    let mut lenient = DataPreprocessor::new();
    lenient.fit(&df).unwrap();
    let mut strict = DataPreprocessor::with_config(PreprocessingConfig::new().with_strict_categories(true));
    strict.fit(&df).unwrap();

    let mut odd = df.head(Some(1));
    odd.with_column(Column::new("Contract".into(), vec!["Ten year".to_string()])).unwrap();

    let row = lenient.transform(&odd).unwrap();
    let names = lenient.feature_names();
    for (j, name) in names.iter().enumerate() {
        if name.starts_with("Contract_") {
            assert_eq!(row[[0, j]], 0.0);
        }
    }
    assert!(matches!(strict.transform(&odd), Err(ChurnError::ValidationError(_))));
}

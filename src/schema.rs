//! Explicit column schema for the telco churn dataset
//!
//! Columns are declared once, in file order, with their role. Everything that
//! partitions columns (the loader, the preprocessor, the HTML form) reads this
//! table instead of inspecting runtime value types.

use crate::error::{ChurnError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bumped whenever the column table changes; stored in every artifact.
pub const SCHEMA_VERSION: u32 = 1;

/// Row identifier, dropped at load time
pub const ID_COLUMN: &str = "customerID";
/// Training label
pub const LABEL_COLUMN: &str = "Churn";
/// Derived: total charges per active month
pub const AVG_CHARGES: &str = "AvgCharges";
/// Derived: 1 when tenure exceeds two years
pub const IS_LONG_TERM: &str = "Is_Long_Term";

/// Role of a column in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    Identifier,
    Label,
    Numeric,
    Categorical,
}

/// One declared column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub role: ColumnRole,
}

const fn column(name: &'static str, role: ColumnRole) -> ColumnSpec {
    ColumnSpec { name, role }
}

/// Columns of the training CSV, in file order
pub const CSV_SCHEMA: [ColumnSpec; 21] = [
    column(ID_COLUMN, ColumnRole::Identifier),
    column("gender", ColumnRole::Categorical),
    column("SeniorCitizen", ColumnRole::Numeric),
    column("Partner", ColumnRole::Categorical),
    column("Dependents", ColumnRole::Categorical),
    column("tenure", ColumnRole::Numeric),
    column("PhoneService", ColumnRole::Categorical),
    column("MultipleLines", ColumnRole::Categorical),
    column("InternetService", ColumnRole::Categorical),
    column("OnlineSecurity", ColumnRole::Categorical),
    column("OnlineBackup", ColumnRole::Categorical),
    column("DeviceProtection", ColumnRole::Categorical),
    column("TechSupport", ColumnRole::Categorical),
    column("StreamingTV", ColumnRole::Categorical),
    column("StreamingMovies", ColumnRole::Categorical),
    column("Contract", ColumnRole::Categorical),
    column("PaperlessBilling", ColumnRole::Categorical),
    column("PaymentMethod", ColumnRole::Categorical),
    column("MonthlyCharges", ColumnRole::Numeric),
    column("TotalCharges", ColumnRole::Numeric),
    column(LABEL_COLUMN, ColumnRole::Label),
];

/// Columns added by feature engineering, appended after the base columns
pub const DERIVED_COLUMNS: [ColumnSpec; 2] = [
    column(AVG_CHARGES, ColumnRole::Numeric),
    column(IS_LONG_TERM, ColumnRole::Numeric),
];

const YES_NO: &[&str] = &["Yes", "No"];
const ADD_ON: &[&str] = &["Yes", "No", "No internet service"];

/// Base feature columns (no identifier, no label), in file order
pub fn base_columns() -> impl Iterator<Item = &'static ColumnSpec> {
    CSV_SCHEMA
        .iter()
        .filter(|c| matches!(c.role, ColumnRole::Numeric | ColumnRole::Categorical))
}

/// Numeric model inputs: base numeric columns followed by the derived ones
pub fn numeric_columns() -> Vec<&'static str> {
    base_columns()
        .chain(DERIVED_COLUMNS.iter())
        .filter(|c| c.role == ColumnRole::Numeric)
        .map(|c| c.name)
        .collect()
}

/// Categorical model inputs, in file order
pub fn categorical_columns() -> Vec<&'static str> {
    base_columns()
        .filter(|c| c.role == ColumnRole::Categorical)
        .map(|c| c.name)
        .collect()
}

/// Documented levels of a categorical column.
///
/// These drive the selection widgets of the form; the core does not reject
/// values outside them (see the encoder's unknown-category handling).
pub fn allowed_values(column: &str) -> &'static [&'static str] {
    match column {
        "gender" => &["Male", "Female"],
        "Partner" | "Dependents" | "PhoneService" | "PaperlessBilling" => YES_NO,
        "MultipleLines" => &["Yes", "No", "No phone service"],
        "InternetService" => &["DSL", "Fiber optic", "No"],
        "OnlineSecurity" | "OnlineBackup" | "DeviceProtection" | "TechSupport"
        | "StreamingTV" | "StreamingMovies" => ADD_ON,
        "Contract" => &["Month-to-month", "One year", "Two year"],
        "PaymentMethod" => &[
            "Electronic check",
            "Mailed check",
            "Bank transfer (automatic)",
            "Credit card (automatic)",
        ],
        _ => &[],
    }
}

/// Value of one record field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Number(f64),
    Text(&'a str),
}

/// One customer, without the churn label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    #[serde(rename = "gender")]
    pub gender: String,
    /// 1 for senior citizens, 0 otherwise
    #[serde(rename = "SeniorCitizen")]
    pub senior_citizen: u8,
    #[serde(rename = "Partner")]
    pub partner: String,
    #[serde(rename = "Dependents")]
    pub dependents: String,
    /// Months of service
    #[serde(rename = "tenure")]
    pub tenure: u32,
    #[serde(rename = "PhoneService")]
    pub phone_service: String,
    #[serde(rename = "MultipleLines")]
    pub multiple_lines: String,
    #[serde(rename = "InternetService")]
    pub internet_service: String,
    #[serde(rename = "OnlineSecurity")]
    pub online_security: String,
    #[serde(rename = "OnlineBackup")]
    pub online_backup: String,
    #[serde(rename = "DeviceProtection")]
    pub device_protection: String,
    #[serde(rename = "TechSupport")]
    pub tech_support: String,
    #[serde(rename = "StreamingTV")]
    pub streaming_tv: String,
    #[serde(rename = "StreamingMovies")]
    pub streaming_movies: String,
    #[serde(rename = "Contract")]
    pub contract: String,
    #[serde(rename = "PaperlessBilling")]
    pub paperless_billing: String,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: String,
    #[serde(rename = "MonthlyCharges")]
    pub monthly_charges: f64,
    #[serde(rename = "TotalCharges")]
    pub total_charges: f64,
}

impl CustomerRecord {
    /// Look up a field by its column name
    pub fn field(&self, column: &str) -> Option<FieldValue<'_>> {
        let value = match column {
            "gender" => FieldValue::Text(&self.gender),
            "SeniorCitizen" => FieldValue::Number(self.senior_citizen as f64),
            "Partner" => FieldValue::Text(&self.partner),
            "Dependents" => FieldValue::Text(&self.dependents),
            "tenure" => FieldValue::Number(self.tenure as f64),
            "PhoneService" => FieldValue::Text(&self.phone_service),
            "MultipleLines" => FieldValue::Text(&self.multiple_lines),
            "InternetService" => FieldValue::Text(&self.internet_service),
            "OnlineSecurity" => FieldValue::Text(&self.online_security),
            "OnlineBackup" => FieldValue::Text(&self.online_backup),
            "DeviceProtection" => FieldValue::Text(&self.device_protection),
            "TechSupport" => FieldValue::Text(&self.tech_support),
            "StreamingTV" => FieldValue::Text(&self.streaming_tv),
            "StreamingMovies" => FieldValue::Text(&self.streaming_movies),
            "Contract" => FieldValue::Text(&self.contract),
            "PaperlessBilling" => FieldValue::Text(&self.paperless_billing),
            "PaymentMethod" => FieldValue::Text(&self.payment_method),
            "MonthlyCharges" => FieldValue::Number(self.monthly_charges),
            "TotalCharges" => FieldValue::Number(self.total_charges),
            _ => return None,
        };
        Some(value)
    }

    /// Check the numeric ranges the core relies on
    pub fn validate(&self) -> Result<()> {
        if self.senior_citizen > 1 {
            return Err(ChurnError::ValidationError(format!(
                "SeniorCitizen must be 0 or 1, got {}",
                self.senior_citizen
            )));
        }
        for (name, value) in [
            ("MonthlyCharges", self.monthly_charges),
            ("TotalCharges", self.total_charges),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ChurnError::ValidationError(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// One-row frame with the same column names and dtypes the loader produces
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(CSV_SCHEMA.len());
        for spec in base_columns() {
            let column = match self.field(spec.name) {
                Some(FieldValue::Number(v)) => Column::new(spec.name.into(), vec![v]),
                Some(FieldValue::Text(s)) => Column::new(spec.name.into(), vec![s.to_string()]),
                None => {
                    return Err(ChurnError::SchemaError(format!(
                        "record has no field for column '{}'",
                        spec.name
                    )))
                }
            };
            columns.push(column);
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Build a record from named text fields, as submitted by a form or a JSON body.
    ///
    /// An absent field is a `SchemaError`; a field that is present but does not
    /// parse is a `ValidationError`.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
        let lookup = |name: &str| -> Result<&str> {
            fields
                .get(name)
                .map(|v| v.trim())
                .ok_or_else(|| ChurnError::SchemaError(format!("missing field '{}'", name)))
        };

        Self::assemble(
            |name| {
                let raw = lookup(name)?;
                if name == "SeniorCitizen" {
                    return parse_flag(raw);
                }
                parse_non_negative(name, raw)
            },
            |name| lookup(name).map(str::to_string),
        )
    }

    /// Assemble a record from per-column accessors.
    pub(crate) fn assemble(
        mut number: impl FnMut(&'static str) -> Result<f64>,
        mut text: impl FnMut(&'static str) -> Result<String>,
    ) -> Result<Self> {
        let tenure = number("tenure")?;
        if tenure < 0.0 || tenure.fract() != 0.0 || tenure > u32::MAX as f64 {
            return Err(ChurnError::ValidationError(format!(
                "tenure must be a non-negative whole number of months, got {}",
                tenure
            )));
        }
        let senior = number("SeniorCitizen")?;
        if senior != 0.0 && senior != 1.0 {
            return Err(ChurnError::ValidationError(format!(
                "SeniorCitizen must be 0 or 1, got {}",
                senior
            )));
        }

        let record = Self {
            gender: text("gender")?,
            senior_citizen: senior as u8,
            partner: text("Partner")?,
            dependents: text("Dependents")?,
            tenure: tenure as u32,
            phone_service: text("PhoneService")?,
            multiple_lines: text("MultipleLines")?,
            internet_service: text("InternetService")?,
            online_security: text("OnlineSecurity")?,
            online_backup: text("OnlineBackup")?,
            device_protection: text("DeviceProtection")?,
            tech_support: text("TechSupport")?,
            streaming_tv: text("StreamingTV")?,
            streaming_movies: text("StreamingMovies")?,
            contract: text("Contract")?,
            paperless_billing: text("PaperlessBilling")?,
            payment_method: text("PaymentMethod")?,
            monthly_charges: number("MonthlyCharges")?,
            total_charges: number("TotalCharges")?,
        };
        record.validate()?;
        Ok(record)
    }
}

/// Check the base numeric columns of a scoring frame: present, non-null,
/// finite and non-negative.
pub fn check_numeric_frame(df: &DataFrame) -> Result<()> {
    let numeric = base_columns().filter(|c| c.role == ColumnRole::Numeric);
    for spec in numeric {
        let column = df
            .column(spec.name)
            .map_err(|_| ChurnError::SchemaError(format!("missing column '{}'", spec.name)))?;
        let casted = column.cast(&DataType::Float64)?;
        for (row, value) in casted.f64()?.into_iter().enumerate() {
            match value {
                Some(v) if v.is_finite() && v >= 0.0 => {}
                other => {
                    return Err(ChurnError::ValidationError(format!(
                        "row {}: {} must be a non-negative number, got {}",
                        row + 1,
                        spec.name,
                        other.map_or_else(|| "nothing".to_string(), |v| v.to_string())
                    )))
                }
            }
        }
    }
    Ok(())
}

/// Flatten a JSON object into the text map accepted by [`CustomerRecord::from_fields`].
///
/// Nulls are dropped so they surface as missing fields.
pub fn fields_from_json(object: &serde_json::Map<String, serde_json::Value>) -> HashMap<String, String> {
    object
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Bool(true) => "Yes".to_string(),
                serde_json::Value::Bool(false) => "No".to_string(),
                other => other.to_string(),
            };
            Some((key.clone(), text))
        })
        .collect()
}

fn parse_non_negative(name: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw.parse().map_err(|_| {
        ChurnError::ValidationError(format!("{} is not a number: '{}'", name, raw))
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(ChurnError::ValidationError(format!(
            "{} must be a non-negative number, got {}",
            name, raw
        )));
    }
    Ok(value)
}

fn parse_flag(raw: &str) -> Result<f64> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" => Ok(1.0),
        "0" | "no" | "false" => Ok(0.0),
        _ => Err(ChurnError::ValidationError(format!(
            "SeniorCitizen must be Yes/No or 1/0, got '{}'",
            raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> HashMap<String, String> {
        [
            ("gender", "Female"),
            ("SeniorCitizen", "No"),
            ("Partner", "Yes"),
            ("Dependents", "No"),
            ("tenure", "12"),
            ("PhoneService", "Yes"),
            ("MultipleLines", "No"),
            ("InternetService", "DSL"),
            ("OnlineSecurity", "Yes"),
            ("OnlineBackup", "No"),
            ("DeviceProtection", "No"),
            ("TechSupport", "No"),
            ("StreamingTV", "No"),
            ("StreamingMovies", "No"),
            ("Contract", "One year"),
            ("PaperlessBilling", "No"),
            ("PaymentMethod", "Mailed check"),
            ("MonthlyCharges", "55.5"),
            ("TotalCharges", "666.0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_schema_partition() {
        assert_eq!(
            numeric_columns(),
            vec!["SeniorCitizen", "tenure", "MonthlyCharges", "TotalCharges", AVG_CHARGES, IS_LONG_TERM]
        );
        assert_eq!(categorical_columns().len(), 15);
        assert!(!categorical_columns().contains(&ID_COLUMN));
        assert_eq!(base_columns().count(), 19);
    }

    #[test]
    fn test_every_categorical_has_levels() {
        for name in categorical_columns() {
            assert!(!allowed_values(name).is_empty(), "no levels for {}", name);
        }
    }

    #[test]
    fn test_from_fields() {
        let record = CustomerRecord::from_fields(&sample_fields()).unwrap();
        assert_eq!(record.tenure, 12);
        assert_eq!(record.senior_citizen, 0);
        assert_eq!(record.contract, "One year");
        assert!((record.monthly_charges - 55.5).abs() < 1e-12);
    }

    #[test]
    fn test_from_fields_missing_is_schema_error() {
        let mut fields = sample_fields();
        fields.remove("Contract");
        let err = CustomerRecord::from_fields(&fields).unwrap_err();
        assert!(matches!(err, ChurnError::SchemaError(_)));
    }

    #[test]
    fn test_from_fields_bad_number_is_validation_error() {
        let mut fields = sample_fields();
        fields.insert("MonthlyCharges".to_string(), "-3".to_string());
        let err = CustomerRecord::from_fields(&fields).unwrap_err();
        assert!(matches!(err, ChurnError::ValidationError(_)));

        let mut fields = sample_fields();
        fields.insert("tenure".to_string(), "1.5".to_string());
        assert!(CustomerRecord::from_fields(&fields).is_err());
    }

    #[test]
    fn test_assemble_rejects_negative_tenure() {
        let mut fields = sample_fields();
        fields.insert("tenure".to_string(), "-1".to_string());
        let err = CustomerRecord::assemble(
            |name| Ok(fields[name].parse::<f64>().unwrap_or(0.0)),
            |name| Ok(fields[name].clone()),
        )
        .unwrap_err();
        assert!(matches!(err, ChurnError::ValidationError(_)));
        assert!(err.to_string().contains("tenure"));
    }

    #[test]
    fn test_check_numeric_frame() {
        let record = CustomerRecord::from_fields(&sample_fields()).unwrap();
        let mut frame = record.to_frame().unwrap();
        assert!(check_numeric_frame(&frame).is_ok());

        frame
            .with_column(Column::new("tenure".into(), vec![-1.0]))
            .unwrap();
        let err = check_numeric_frame(&frame).unwrap_err();
        assert!(matches!(err, ChurnError::ValidationError(_)));

        let missing = frame.drop("MonthlyCharges").unwrap();
        assert!(matches!(check_numeric_frame(&missing), Err(ChurnError::SchemaError(_))));
    }

    #[test]
    fn test_fields_from_json() {
        let value = serde_json::json!({
            "tenure": 3,
            "SeniorCitizen": true,
            "Contract": "Two year",
            "gender": null,
        });
        let fields = fields_from_json(value.as_object().unwrap());
        assert_eq!(fields.get("tenure").map(String::as_str), Some("3"));
        assert_eq!(fields.get("SeniorCitizen").map(String::as_str), Some("Yes"));
        assert!(!fields.contains_key("gender"));
    }

    #[test]
    fn test_to_frame_shape() {
        let record = CustomerRecord::from_fields(&sample_fields()).unwrap();
        let frame = record.to_frame().unwrap();
        assert_eq!(frame.height(), 1);
        assert_eq!(frame.width(), 19);
        assert!(frame.column(ID_COLUMN).is_err());
        let tenure = frame.column("tenure").unwrap().f64().unwrap().get(0);
        assert_eq!(tenure, Some(12.0));
    }
}

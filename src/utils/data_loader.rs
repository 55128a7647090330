//! Data loading utilities

use crate::error::{ChurnError, Result};
use crate::schema::{
    base_columns, ColumnRole, CustomerRecord, CSV_SCHEMA, ID_COLUMN, LABEL_COLUMN,
};
use polars::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Column whose unparseable cells are imputed instead of rejected
const LENIENT_COLUMN: &str = "TotalCharges";

/// Cleaned, typed training data.
///
/// `frame` holds the 19 base feature columns (numeric as `f64`, categorical as
/// text) with the identifier and label removed. `labels` is aligned row by row.
#[derive(Debug, Clone)]
pub struct ChurnDataset {
    pub frame: DataFrame,
    pub labels: Vec<u8>,
    /// Median used to fill blank `TotalCharges` cells
    pub total_charges_median: f64,
    /// Number of `TotalCharges` cells that were imputed
    pub imputed_total_charges: usize,
}

impl ChurnDataset {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Fraction of rows labelled as churned
    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().filter(|&&y| y == 1).count() as f64 / self.labels.len() as f64
    }

    /// Materialize every row as a [`CustomerRecord`]
    pub fn records(&self) -> Result<Vec<CustomerRecord>> {
        let mut numeric: HashMap<&str, Vec<f64>> = HashMap::new();
        let mut text: HashMap<&str, Vec<String>> = HashMap::new();

        for spec in base_columns() {
            let column = self.frame.column(spec.name)?;
            match spec.role {
                ColumnRole::Numeric => {
                    let values = column.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect();
                    numeric.insert(spec.name, values);
                }
                _ => {
                    let values = column
                        .str()?
                        .into_iter()
                        .map(|v| v.unwrap_or_default().to_string())
                        .collect();
                    text.insert(spec.name, values);
                }
            }
        }

        (0..self.len())
            .map(|i| {
                CustomerRecord::assemble(
                    |name| {
                        numeric.get(name).map(|c| c[i]).ok_or_else(|| {
                            ChurnError::SchemaError(format!("missing column '{}'", name))
                        })
                    },
                    |name| {
                        text.get(name).map(|c| c[i].clone()).ok_or_else(|| {
                            ChurnError::SchemaError(format!("missing column '{}'", name))
                        })
                    },
                )
            })
            .collect()
    }
}

/// Loader for the telco churn CSV
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Whether the `Churn` column must be present
    require_label: bool,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self { require_label: true }
    }

    /// Accept files without a label column (for batch scoring)
    pub fn with_require_label(mut self, require: bool) -> Self {
        self.require_label = require;
        self
    }

    /// Load and clean a CSV file
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<ChurnDataset> {
        let path = path.as_ref();
        let start = Instant::now();
        let file = File::open(path).map_err(|e| {
            ChurnError::DataError(format!("cannot open {}: {}", path.display(), e))
        })?;

        // Every column is read as text; typing happens against the schema below.
        let raw = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| ChurnError::DataError(format!("{}: {}", path.display(), e)))?;

        let dataset = self.load_frame(&raw)?;
        info!(
            path = %path.display(),
            rows = dataset.len(),
            positive_rate = dataset.positive_rate(),
            imputed_total_charges = dataset.imputed_total_charges,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded churn dataset"
        );
        Ok(dataset)
    }

    /// Clean an all-text frame laid out like the CSV
    pub fn load_frame(&self, raw: &DataFrame) -> Result<ChurnDataset> {
        for spec in CSV_SCHEMA.iter() {
            let optional = spec.role == ColumnRole::Label && !self.require_label;
            if !optional && raw.column(spec.name).is_err() {
                return Err(ChurnError::DataError(format!(
                    "missing required column '{}'",
                    spec.name
                )));
            }
        }
        if raw.height() == 0 {
            return Err(ChurnError::DataError("dataset has no rows".to_string()));
        }
        debug!(dropped = ID_COLUMN, "Dropping identifier column");

        let mut columns = Vec::with_capacity(CSV_SCHEMA.len());
        let mut median = f64::NAN;
        let mut imputed = 0;

        for spec in base_columns() {
            let cells = raw.column(spec.name)?.str()?;
            let column = match spec.role {
                ColumnRole::Numeric if spec.name == LENIENT_COLUMN => {
                    let (values, fill, filled) = impute_lenient(spec.name, cells)?;
                    median = fill;
                    imputed = filled;
                    Column::new(spec.name.into(), values)
                }
                ColumnRole::Numeric => {
                    let values = cells
                        .into_iter()
                        .enumerate()
                        .map(|(row, cell)| parse_strict(spec.name, row, cell))
                        .collect::<Result<Vec<f64>>>()?;
                    Column::new(spec.name.into(), values)
                }
                _ => {
                    let values = cells
                        .into_iter()
                        .enumerate()
                        .map(|(row, cell)| {
                            cell.map(str::to_string).ok_or_else(|| {
                                ChurnError::DataError(format!(
                                    "row {}: empty value in column '{}'",
                                    row + 1,
                                    spec.name
                                ))
                            })
                        })
                        .collect::<Result<Vec<String>>>()?;
                    Column::new(spec.name.into(), values)
                }
            };
            columns.push(column);
        }

        let labels = match raw.column(LABEL_COLUMN) {
            Ok(column) => column
                .str()?
                .into_iter()
                .enumerate()
                .map(|(row, cell)| parse_label(row, cell))
                .collect::<Result<Vec<u8>>>()?,
            Err(_) => Vec::new(),
        };

        Ok(ChurnDataset {
            frame: DataFrame::new(columns)?,
            labels,
            total_charges_median: median,
            imputed_total_charges: imputed,
        })
    }
}

/// Save a frame as CSV
pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|e| ChurnError::DataError(e.to_string()))
}

fn parse_strict(column: &str, row: usize, cell: Option<&str>) -> Result<f64> {
    let raw = cell.map(str::trim).unwrap_or("");
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| {
            ChurnError::DataError(format!(
                "row {}: column '{}' is not a non-negative number: '{}'",
                row + 1,
                column,
                raw
            ))
        })
}

fn parse_label(row: usize, cell: Option<&str>) -> Result<u8> {
    match cell.map(str::trim) {
        Some("Yes") => Ok(1),
        Some("No") => Ok(0),
        other => Err(ChurnError::DataError(format!(
            "row {}: label must be Yes or No, got '{}'",
            row + 1,
            other.unwrap_or("")
        ))),
    }
}

/// Parse a lenient column, filling unparseable or negative cells with the
/// median of the valid ones. Returns the values, the fill value and the fill count.
fn impute_lenient(column: &str, cells: &StringChunked) -> Result<(Vec<f64>, f64, usize)> {
    let parsed: Vec<Option<f64>> = cells
        .into_iter()
        .map(|cell| {
            cell.and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
        })
        .collect();

    let mut present: Vec<f64> = parsed.iter().flatten().copied().collect();
    let fill = median(&mut present).ok_or_else(|| {
        ChurnError::DataError(format!("column '{}' has no numeric values", column))
    })?;

    let filled = parsed.iter().filter(|v| v.is_none()).count();
    let values = parsed.into_iter().map(|v| v.unwrap_or(fill)).collect();
    Ok((values, fill, filled))
}

/// Median with the midpoint rule for even counts
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "customerID,gender,SeniorCitizen,Partner,Dependents,tenure,PhoneService,MultipleLines,InternetService,OnlineSecurity,OnlineBackup,DeviceProtection,TechSupport,StreamingTV,StreamingMovies,Contract,PaperlessBilling,PaymentMethod,MonthlyCharges,TotalCharges,Churn";

    fn row(id: &str, tenure: &str, total: &str, churn: &str) -> String {
        format!(
            "{id},Female,0,Yes,No,{tenure},Yes,No,DSL,No,Yes,No,No,No,No,Month-to-month,Yes,Electronic check,50.0,{total},{churn}"
        )
    }

    fn write_csv(lines: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_load_csv_drops_identifier_and_maps_label() {
        let file = write_csv(&[
            row("0001-A", "1", "50.0", "Yes"),
            row("0002-B", "10", "500.0", "No"),
        ]);
        let dataset = DataLoader::new().load_csv(file.path()).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.labels, vec![1, 0]);
        assert!(dataset.frame.column(ID_COLUMN).is_err());
        assert!(dataset.frame.column(LABEL_COLUMN).is_err());
        assert_eq!(dataset.frame.width(), 19);
    }

    #[test]
    fn test_blank_total_charges_imputed_with_median() {
        let file = write_csv(&[
            row("0001-A", "0", " ", "No"),
            row("0002-B", "1", "100.0", "No"),
            row("0003-C", "2", "200.0", "Yes"),
            row("0004-D", "3", "400.0", "No"),
        ]);
        let dataset = DataLoader::new().load_csv(file.path()).unwrap();

        assert_eq!(dataset.imputed_total_charges, 1);
        assert_eq!(dataset.total_charges_median, 200.0);
        let total = dataset.frame.column("TotalCharges").unwrap().f64().unwrap();
        assert_eq!(total.get(0), Some(200.0));
    }

    #[test]
    fn test_unknown_label_is_data_error() {
        let file = write_csv(&[row("0001-A", "1", "50.0", "Maybe")]);
        let err = DataLoader::new().load_csv(file.path()).unwrap_err();
        assert!(matches!(err, ChurnError::DataError(_)));
    }

    #[test]
    fn test_bad_strict_numeric_is_data_error() {
        let file = write_csv(&[row("0001-A", "abc", "50.0", "No")]);
        let err = DataLoader::new().load_csv(file.path()).unwrap_err();
        assert!(err.to_string().contains("tenure"));
    }

    #[test]
    fn test_negative_tenure_is_data_error() {
        let file = write_csv(&[
            row("0001-A", "-1", "50.0", "No"),
            row("0002-B", "3", "150.0", "Yes"),
        ]);
        let err = DataLoader::new().load_csv(file.path()).unwrap_err();
        assert!(matches!(err, ChurnError::DataError(_)));
        assert!(err.to_string().contains("row 1"));
        assert!(err.to_string().contains("tenure"));
    }

    #[test]
    fn test_negative_total_charges_imputed() {
        let file = write_csv(&[
            row("0001-A", "1", "-20.0", "No"),
            row("0002-B", "2", "100.0", "Yes"),
            row("0003-C", "3", "300.0", "No"),
        ]);
        let dataset = DataLoader::new().load_csv(file.path()).unwrap();

        assert_eq!(dataset.imputed_total_charges, 1);
        assert_eq!(dataset.total_charges_median, 200.0);
        let total = dataset.frame.column("TotalCharges").unwrap().f64().unwrap();
        assert_eq!(total.get(0), Some(200.0));
    }

    #[test]
    fn test_missing_column_is_data_error() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "customerID,gender").unwrap();
        writeln!(file, "0001-A,Male").unwrap();
        file.flush().unwrap();

        let err = DataLoader::new().load_csv(file.path()).unwrap_err();
        assert!(matches!(err, ChurnError::DataError(_)));
    }

    #[test]
    fn test_missing_file_is_data_error() {
        let err = DataLoader::new().load_csv("/nonexistent/churn.csv").unwrap_err();
        assert!(matches!(err, ChurnError::DataError(_)));
    }

    #[test]
    fn test_records_round_trip_frame() {
        let file = write_csv(&[row("0001-A", "7", "350.0", "No")]);
        let dataset = DataLoader::new().load_csv(file.path()).unwrap();
        let records = dataset.records().unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tenure, 7);
        assert_eq!(records[0].payment_method, "Electronic check");
        assert_eq!(records[0].total_charges, 350.0);
    }
}

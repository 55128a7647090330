//! Deterministic synthetic telco dataset
//!
//! Produces a CSV with the exact column layout of the real customer export,
//! including blank `TotalCharges` cells for brand-new customers, so the whole
//! training path can be exercised without the proprietary file.

use crate::error::Result;
use crate::schema::allowed_values;
use crate::utils::data_loader::save_csv;
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::Path;

/// Generator for synthetic churn data
#[derive(Debug, Clone)]
pub struct SampleDataGenerator {
    n_rows: usize,
    seed: u64,
}

impl SampleDataGenerator {
    pub fn new(n_rows: usize) -> Self {
        Self { n_rows, seed: 42 }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generate the raw (all text) frame
    pub fn generate(&self) -> Result<DataFrame> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut rows = Columns::with_capacity(self.n_rows);

        for i in 0..self.n_rows {
            rows.push(i, &mut rng);
        }

        rows.into_frame()
    }

    /// Generate and write to a CSV file
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.generate()?;
        save_csv(&mut df, path)
    }
}

struct Columns {
    names: Vec<(&'static str, Vec<String>)>,
}

impl Columns {
    fn with_capacity(n: usize) -> Self {
        let names = crate::schema::CSV_SCHEMA
            .iter()
            .map(|c| (c.name, Vec::with_capacity(n)))
            .collect();
        Self { names }
    }

    fn set(&mut self, name: &str, value: String) {
        if let Some((_, values)) = self.names.iter_mut().find(|(n, _)| *n == name) {
            values.push(value);
        }
    }

    fn push(&mut self, index: usize, rng: &mut ChaCha8Rng) {
        let pick = |rng: &mut ChaCha8Rng, column: &str| -> String {
            let levels = allowed_values(column);
            levels[rng.gen_range(0..levels.len())].to_string()
        };
        let yes_no = |rng: &mut ChaCha8Rng, p: f64| -> String {
            if rng.gen_bool(p) { "Yes" } else { "No" }.to_string()
        };

        let senior = rng.gen_bool(0.16);
        let partner = rng.gen_bool(0.48);
        let tenure: u32 = rng.gen_range(0..=72);

        let contract = {
            let long_bias = tenure as f64 / 72.0;
            let r: f64 = rng.gen();
            if r < 0.75 - 0.45 * long_bias {
                "Month-to-month"
            } else if r < 0.9 - 0.2 * long_bias {
                "One year"
            } else {
                "Two year"
            }
        };

        let phone = rng.gen_bool(0.9);
        let multiple = if phone { yes_no(rng, 0.45) } else { "No phone service".to_string() };
        let internet = match rng.gen_range(0..100) {
            0..=33 => "DSL",
            34..=77 => "Fiber optic",
            _ => "No",
        };

        let mut add_ons = 0;
        let mut add_on = |rng: &mut ChaCha8Rng| -> String {
            if internet == "No" {
                "No internet service".to_string()
            } else if rng.gen_bool(0.4) {
                add_ons += 1;
                "Yes".to_string()
            } else {
                "No".to_string()
            }
        };
        let security = add_on(rng);
        let backup = add_on(rng);
        let protection = add_on(rng);
        let support = add_on(rng);
        let tv = add_on(rng);
        let movies = add_on(rng);

        let paperless = rng.gen_bool(0.6);
        let payment = pick(rng, "PaymentMethod");

        let mut monthly = 19.0 + rng.gen_range(0.0..6.0);
        if phone {
            monthly += 5.0;
        }
        if multiple == "Yes" {
            monthly += 5.0;
        }
        monthly += match internet {
            "DSL" => 25.0,
            "Fiber optic" => 50.0,
            _ => 0.0,
        };
        monthly += 5.0 * add_ons as f64;
        let monthly = (monthly * 100.0).round() / 100.0;

        // Brand-new customers have not been billed yet; the export leaves the cell blank.
        let total = if tenure == 0 {
            " ".to_string()
        } else {
            let drift = rng.gen_range(0.95..1.05);
            format!("{:.2}", monthly * tenure as f64 * drift)
        };

        let logit = -1.3
            + if contract == "Month-to-month" { 1.4 } else { 0.0 }
            + if contract == "Two year" { -1.2 } else { 0.0 }
            + if internet == "Fiber optic" { 0.8 } else { 0.0 }
            + if payment == "Electronic check" { 0.6 } else { 0.0 }
            + if senior { 0.4 } else { 0.0 }
            + if paperless { 0.3 } else { 0.0 }
            + if support == "Yes" { -0.4 } else { 0.0 }
            - 0.035 * tenure as f64;
        let churn = rng.gen_bool(1.0 / (1.0 + (-logit).exp()));

        let id_suffix: String = (0..5)
            .map(|_| (b'A' + rng.gen_range(0..26u8)) as char)
            .collect();

        self.set("customerID", format!("{:04}-{}", index % 10_000, id_suffix));
        self.set("gender", pick(rng, "gender"));
        self.set("SeniorCitizen", if senior { "1" } else { "0" }.to_string());
        self.set("Partner", if partner { "Yes" } else { "No" }.to_string());
        self.set("Dependents", yes_no(rng, if partner { 0.5 } else { 0.1 }));
        self.set("tenure", tenure.to_string());
        self.set("PhoneService", if phone { "Yes" } else { "No" }.to_string());
        self.set("MultipleLines", multiple);
        self.set("InternetService", internet.to_string());
        self.set("OnlineSecurity", security);
        self.set("OnlineBackup", backup);
        self.set("DeviceProtection", protection);
        self.set("TechSupport", support);
        self.set("StreamingTV", tv);
        self.set("StreamingMovies", movies);
        self.set("Contract", contract.to_string());
        self.set("PaperlessBilling", if paperless { "Yes" } else { "No" }.to_string());
        self.set("PaymentMethod", payment);
        self.set("MonthlyCharges", format!("{:.2}", monthly));
        self.set("TotalCharges", total);
        self.set("Churn", if churn { "Yes" } else { "No" }.to_string());
    }

    fn into_frame(self) -> Result<DataFrame> {
        let columns = self
            .names
            .into_iter()
            .map(|(name, values)| Column::new(name.into(), values))
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::data_loader::DataLoader;

    #[test]
    fn test_generate_is_deterministic() {
        let a = SampleDataGenerator::new(50).with_seed(7).generate().unwrap();
        let b = SampleDataGenerator::new(50).with_seed(7).generate().unwrap();
        assert!(a.equals(&b));
        assert_eq!(a.height(), 50);
        assert_eq!(a.width(), 21);
    }

    #[test]
    fn test_generated_csv_loads() {
        let file = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
        SampleDataGenerator::new(300).write_csv(file.path()).unwrap();

        let dataset = DataLoader::new().load_csv(file.path()).unwrap();
        assert_eq!(dataset.len(), 300);
        assert!(dataset.positive_rate() > 0.05 && dataset.positive_rate() < 0.8);
    }
}

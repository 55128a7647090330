//! Churn CLI Module
//!
//! Command-line interface for training, scoring, serving and sample data.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::export::{ModelArtifact, DEFAULT_ARTIFACT_PATH};
use crate::inference::{InferenceConfig, InferenceEngine, Prediction};
use crate::training::{TrainEngine, TrainingConfig};
use crate::utils::{save_csv, DataLoader, SampleDataGenerator};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn warn(s: &str) -> ColoredString   { s.truecolor(240, 120, 100) }

fn kv(key: &str, val: &str) {
    println!("    {} {}", muted(&format!("{:<18}", key)), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
    let _ = std::io::stdout().flush();
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "churn")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and serve a customer churn classifier")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model on a churn CSV and save the artifact
    Train {
        /// Training CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Output artifact file
        #[arg(short, long, default_value = DEFAULT_ARTIFACT_PATH)]
        output: PathBuf,

        /// JSON training configuration; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for the split, SMOTE and the forest
        #[arg(long)]
        seed: Option<u64>,

        /// Number of trees
        #[arg(long)]
        n_estimators: Option<usize>,

        /// Maximum tree depth
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Score customers with a trained model
    Predict {
        /// Trained model file
        #[arg(short, long, default_value = DEFAULT_ARTIFACT_PATH)]
        model: PathBuf,

        /// JSON record (object or array of objects) or a CSV laid out like the training data
        #[arg(short, long)]
        input: PathBuf,

        /// Write predictions here (JSON for JSON input, CSV for CSV input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the prediction server
    Serve {
        /// Trained model file (defaults to MODEL_PATH or rf_churn_model.bin)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Server host
        #[arg(long)]
        host: Option<String>,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show model artifact information
    Info {
        /// Trained model file
        #[arg(short, long, default_value = DEFAULT_ARTIFACT_PATH)]
        model: PathBuf,
    },

    /// Write a synthetic churn CSV
    Sample {
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of customers
        #[arg(short, long, default_value = "1000")]
        rows: usize,

        /// Generator seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &Path,
    output: &Path,
    config_path: Option<&Path>,
    seed: Option<u64>,
    n_estimators: Option<usize>,
    max_depth: Option<usize>,
) -> anyhow::Result<()> {
    section("Train");

    let mut config = match config_path {
        Some(path) => TrainingConfig::from_file(path)?,
        None => TrainingConfig::default(),
    };
    if let Some(seed) = seed {
        config = config.with_random_state(seed);
    }
    if let Some(n) = n_estimators {
        config = config.with_n_estimators(n);
    }
    if let Some(depth) = max_depth {
        config = config.with_max_depth(Some(depth));
    }
    config.validate()?;

    step_run("Loading data");
    let start = Instant::now();
    let dataset = DataLoader::new().load_csv(data_path)?;
    step_done(&format!(
        "{} rows, {:.1}% churn in {:?}",
        dataset.len(),
        dataset.positive_rate() * 100.0,
        start.elapsed()
    ));

    step_run(&format!("Training {} trees", config.n_estimators.to_string().cyan()));
    let outcome = TrainEngine::new(config.clone()).train(&dataset)?;
    step_done(&format!("{:.2}s", outcome.report.training_time_secs));

    let report = outcome.report.clone();
    step_run(&format!("Saving → {}", output.display()));
    let artifact = ModelArtifact::from_training(&config, outcome);
    artifact.save(output)?;
    step_done(&artifact.metadata.model_id);

    let metrics = &report.metrics;
    println!();
    println!("  {:<16} {}", muted("Accuracy"), format!("{:.4}", metrics.accuracy).white().bold());
    println!("  {:<16} {}", muted("Precision"), format!("{:.4}", metrics.precision).white());
    println!("  {:<16} {}", muted("Recall"), format!("{:.4}", metrics.recall).white());
    println!("  {:<16} {}", muted("F1"), format!("{:.4}", metrics.f1_score).white());
    if let Some(auc) = metrics.roc_auc {
        println!("  {:<16} {}", muted("ROC AUC"), format!("{:.4}", auc).white());
    }
    println!(
        "  {:<16} {}",
        muted("Rows"),
        format!("{} train / {} hold-out / {} after SMOTE", report.n_train, report.n_test, report.n_train_resampled).white()
    );
    if report.imputed_total_charges > 0 {
        println!(
            "  {:<16} {}",
            muted("Imputed"),
            format!("{} TotalCharges → {:.2}", report.imputed_total_charges, report.total_charges_median).white()
        );
    }

    section("Top features");
    for (name, importance) in report.top_features.iter().take(5) {
        println!("  {:<40} {}", name, format!("{:.4}", importance).white());
    }
    println!();

    Ok(())
}

pub fn cmd_predict(model_path: &Path, input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let engine = InferenceEngine::load(InferenceConfig::new(), model_path)?;
    step_done(&engine.metadata().model_id);

    let is_csv = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    if is_csv {
        predict_csv(&engine, input, output)
    } else {
        predict_json(&engine, input, output)
    }
}

fn predict_json(engine: &InferenceEngine, input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(input)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let objects = match value {
        serde_json::Value::Object(map) => vec![map],
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::Object(map) => Ok(map),
                other => anyhow::bail!("expected a JSON object per record, found {}", other),
            })
            .collect::<anyhow::Result<Vec<_>>>()?,
        other => anyhow::bail!("expected a JSON object or array of objects, found {}", other),
    };

    let predictions = objects
        .iter()
        .map(|object| engine.score_json(object))
        .collect::<crate::error::Result<Vec<Prediction>>>()?;

    println!();
    for (i, prediction) in predictions.iter().enumerate() {
        let verdict = prediction.verdict();
        let styled = if prediction.is_churn() { warn(&verdict) } else { ok(&verdict) };
        println!("  {:>4}  {}", dim(&format!("#{}", i + 1)), styled);
    }

    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&predictions)?)?;
        println!();
        step_ok(&format!("Wrote {} predictions → {}", predictions.len(), path.display()));
    }
    println!();
    Ok(())
}

fn predict_csv(engine: &InferenceEngine, input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    step_run("Loading customers");
    let dataset = DataLoader::new().with_require_label(false).load_csv(input)?;
    step_done(&format!("{} rows", dataset.len()));

    step_run("Scoring");
    let start = Instant::now();
    let predictions = engine.score_frame(&dataset.frame)?;
    step_done(&format!("{:?}", start.elapsed()));

    let churners = predictions.iter().filter(|p| p.is_churn()).count();
    println!();
    println!("  {:<16} {}", muted("Customers"), predictions.len().to_string().white());
    println!("  {:<16} {}", muted("Likely churn"), churners.to_string().white().bold());

    if let Some(path) = output {
        let mut scored = dataset.frame.clone();
        scored.with_column(Column::new(
            "churn_probability".into(),
            predictions.iter().map(|p| p.probability).collect::<Vec<f64>>(),
        ))?;
        scored.with_column(Column::new(
            "churn_prediction".into(),
            predictions.iter().map(|p| u32::from(p.label)).collect::<Vec<u32>>(),
        ))?;
        save_csv(&mut scored, path)?;
        step_ok(&format!("Wrote predictions → {}", path.display()));
    }
    println!();
    Ok(())
}

pub fn cmd_info(model_path: &Path) -> anyhow::Result<()> {
    let metadata = ModelArtifact::read_metadata(model_path)?;

    section(&format!("Model {}", dim(&metadata.model_id)));
    kv("trained", &metadata.trained_at);
    kv("type", &metadata.model_type);
    kv("schema", &format!("v{}", metadata.schema_version));
    kv("features", &metadata.feature_names.len().to_string());
    kv(
        "rows",
        &format!("{} ({} train / {} hold-out)", metadata.n_rows, metadata.n_train, metadata.n_test),
    );

    section("Hold-out metrics");
    for (name, value) in &metadata.metrics {
        kv(name, &format!("{:.4}", value));
    }

    section("Hyperparameters");
    for (name, value) in &metadata.hyperparameters {
        kv(name, value);
    }
    println!();
    Ok(())
}

pub fn cmd_sample(output: &Path, rows: usize, seed: u64) -> anyhow::Result<()> {
    section("Sample");
    step_run(&format!("Generating {} customers", rows));
    SampleDataGenerator::new(rows).with_seed(seed).write_csv(output)?;
    step_done(&output.display().to_string());
    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(
    model: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    let mut config = ServerConfig::default();
    if let Some(model) = model {
        config = config.with_model_path(model);
    }
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }

    section(&format!("Churn Prediction {}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    kv("form", &format!("http://{}:{}", config.host, config.port));
    kv("api", &format!("http://{}:{}/api/predict", config.host, config.port));
    kv("health", &format!("http://{}:{}/api/health", config.host, config.port));
    kv("model", &config.model_path.display().to_string());
    println!();
    println!("  {}", dim("ctrl+c to stop"));
    println!();

    run_server(config).await
}

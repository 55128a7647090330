//! Churn - command-line entry point
//!
//! Trains the churn classifier, scores customers and serves the prediction form.

use clap::Parser;
use churn_predict::cli::{cmd_info, cmd_predict, cmd_sample, cmd_serve, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "churn_predict=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { data, output, config, seed, n_estimators, max_depth } => {
            cmd_train(&data, &output, config.as_deref(), seed, n_estimators, max_depth)?;
        }
        Commands::Predict { model, input, output } => {
            cmd_predict(&model, &input, output.as_deref())?;
        }
        Commands::Serve { model, host, port } => {
            cmd_serve(model, host, port).await?;
        }
        Commands::Info { model } => {
            cmd_info(&model)?;
        }
        Commands::Sample { output, rows, seed } => {
            cmd_sample(&output, rows, seed)?;
        }
    }

    Ok(())
}

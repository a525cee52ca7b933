//! Baton CLI — trigger surface for pipeline runs and predictions.
//!
//! `baton run` starts one pipeline run and prints its report; `baton
//! predict` serves predictions from the currently registered champion;
//! `baton registry show` prints the champion record.

use anyhow::bail;
use baton_core::PipelineConfig;
use baton_core::storage::LocalStore;
use baton_ml::data::schema::TableSchema;
use baton_ml::data::source::{JsonlSource, RecordSource, source_from_config};
use baton_ml::inference::Predictor;
use baton_ml::pipeline::{Pipeline, PipelineStage};
use baton_ml::registry::ModelRegistry;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

/// Baton: staged train/evaluate/promote pipeline
#[derive(Parser, Debug)]
#[command(name = "baton", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Execute one pipeline run
    Run,
    /// Serve predictions from the registered champion
    Predict {
        /// JSONL file of records to predict
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Inspect the model registry
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum RegistryAction {
    /// Print the current champion record
    Show,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "baton={level},baton_core={level},baton_ml={level}"
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = PipelineConfig::load(cli.config.as_deref())?;
    tracing::debug!(storage = %config.storage.root.display(), "configuration resolved");
    let store = Arc::new(LocalStore::new(config.storage.root.clone()));

    match cli.command {
        Commands::Run => {
            let schema = TableSchema::load(&config.validation.schema_path)?;
            let source = source_from_config(&config.ingestion.source);
            let pipeline = Pipeline::new(config, schema, source, store);

            let report = pipeline.run().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.state == PipelineStage::Failed {
                bail!(
                    "run {} failed at {:?}: {}",
                    report.run_id,
                    report.failed_stage.unwrap_or(PipelineStage::Failed),
                    report.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Commands::Predict { input } => {
            let registry = ModelRegistry::new(store, config.registry.slot.clone());
            let predictor = Predictor::load(&registry).await?;

            let source = JsonlSource { path: input };
            let batch = source.fetch_all().await?;
            if batch.is_empty() {
                bail!("no records to predict");
            }

            let probabilities = predictor.predict(&batch)?;
            for (row, probability) in batch.rows.iter().zip(&probabilities) {
                let line = serde_json::json!({
                    "record": row,
                    "probability": probability,
                    "label": u8::from(*probability > 0.5),
                });
                println!("{line}");
            }
        }
        Commands::Registry { action } => match action {
            RegistryAction::Show => {
                let registry = ModelRegistry::new(store, config.registry.slot.clone());
                match registry.current().await? {
                    Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                    None => println!("registry slot '{}' is empty", config.registry.slot),
                }
            }
        },
    }

    Ok(())
}

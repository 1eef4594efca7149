//! perfscore CLI Module
//!
//! Command-line interface for training, prediction and schema inspection.

mod config;

pub use config::{Overrides, PipelineConfig};

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::inference::InferenceEngine;
use crate::preprocessing::{FeatureOrigin, Schema};
use crate::training::TrainEngine;
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn warn_line(msg: &str) {
    println!("  {} {}", "!".yellow().bold(), msg.yellow());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "perfscore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Candidate performance scoring with tuned gradient-boosted trees")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a schema and train a model on a labelled candidate table
    Train {
        /// Input CSV with one row per candidate and a label column
        #[arg(short, long)]
        data: PathBuf,

        /// Where to write the schema
        #[arg(short, long)]
        schema: PathBuf,

        /// Where to write the model
        #[arg(short, long)]
        model: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of cross-validation folds
        #[arg(long)]
        folds: Option<usize>,

        /// Number of search trials
        #[arg(long)]
        trials: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// Fold worker threads
        #[arg(long)]
        jobs: Option<usize>,

        /// Extend this schema instead of starting a fresh one
        #[arg(long)]
        previous_schema: Option<PathBuf>,
    },

    /// Score candidates with a trained model
    Predict {
        /// Input CSV with one row per candidate
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        schema: PathBuf,

        #[arg(short, long)]
        model: PathBuf,

        /// Output predictions file
        #[arg(short, long, default_value = "predictions.csv")]
        output: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show a persisted schema
    Schema {
        #[arg(short, long)]
        schema: PathBuf,
    },
}

/// Arguments of `perfscore train`
#[derive(Debug, Clone)]
pub struct TrainArgs {
    pub data: PathBuf,
    pub schema: PathBuf,
    pub model: PathBuf,
    pub config: Option<PathBuf>,
    pub overrides: Overrides,
    pub previous_schema: Option<PathBuf>,
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Train { data, schema, model, config, folds, trials, seed, jobs, previous_schema } => {
            cmd_train(&TrainArgs {
                data,
                schema,
                model,
                config,
                overrides: Overrides { folds, trials, seed, jobs },
                previous_schema,
            })
        }
        Commands::Predict { data, schema, model, output, config } => {
            cmd_predict(&data, &schema, &model, &output, config.as_deref())
        }
        Commands::Schema { schema } => cmd_schema(&schema),
    }
}

pub fn cmd_train(args: &TrainArgs) -> anyhow::Result<()> {
    section("Train");

    let config = PipelineConfig::load_or_default(args.config.as_deref())?
        .with_overrides(&args.overrides);
    config.validate()?;

    let previous = match &args.previous_schema {
        Some(path) => {
            let schema = Schema::load(path)?;
            step_ok(&format!("Extending schema {}", schema.version_tag()));
            Some(schema)
        }
        None => None,
    };

    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_csv(&args.data)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    step_run(&format!(
        "Searching {} trials over {} folds",
        config.optimization.n_trials.to_string().cyan(),
        config.training.n_folds.to_string().cyan()
    ));
    let start = Instant::now();
    let engine = TrainEngine::new(config.reconcile, config.training, config.optimization);
    let outcome = engine.run(&df, previous.as_ref(), &args.schema, &args.model)?;
    step_done(&format!("{:.1}s", start.elapsed().as_secs_f64()));

    for rejected in &outcome.rejected {
        warn_line(&format!("row {} skipped: {}", rejected.row, rejected.error));
    }

    println!();
    kv("Schema", &outcome.schema.version_tag());
    kv("Features", &outcome.schema.len().to_string());
    kv("Records", &outcome.folds.len().to_string());
    kv("Failed trials", &outcome.study.n_failed().to_string());
    println!("  {:<18} {}", muted("CV micro-F1"), format!("{:.4}", outcome.cv_score()).white().bold());
    for (name, value) in outcome.best_params().iter() {
        kv(&format!("  {}", name), &value.to_string());
    }

    section("Top features");
    for (name, importance) in outcome.model.top_features(10) {
        println!("  {:<36} {}", name, format!("{:.4}", importance).truecolor(140, 140, 140));
    }

    println!();
    step_ok(&format!("Schema written to {}", args.schema.display()));
    step_ok(&format!("Model written to {}", args.model.display()));
    println!();
    Ok(())
}

pub fn cmd_predict(
    data_path: &Path,
    schema_path: &Path,
    model_path: &Path,
    output: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    let config = PipelineConfig::load_or_default(config_path)?;
    let engine = InferenceEngine::load(config.inference, config.reconcile, schema_path, model_path)?;
    step_ok(&format!("Loaded model for schema {}", engine.schema().version_tag()));

    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_csv(data_path)?;
    step_done(&format!("{} rows in {:?}", df.height(), start.elapsed()));

    step_run("Scoring");
    let start = Instant::now();
    let batch = engine.predict_table(&df)?;
    step_done(&format!("{:?}", start.elapsed()));

    if !batch.filled_features.is_empty() {
        warn_line(&format!(
            "{} schema features absent from input, filled with 0",
            batch.filled_features.len()
        ));
    }
    for rejected in &batch.rejected {
        warn_line(&format!("row {} skipped: {}", rejected.row, rejected.error));
    }

    batch.write_csv(output, &engine.config().output_id_column)?;

    println!();
    kv("Scored", &batch.len().to_string());
    kv("Predicted 1", &batch.n_positive().to_string());
    kv("Rejected", &batch.rejected.len().to_string());
    kv("Dropped columns", &batch.dropped_columns.len().to_string());
    println!();
    step_ok(&format!("Predictions written to {}", output.display()));
    println!();
    Ok(())
}

pub fn cmd_schema(schema_path: &Path) -> anyhow::Result<()> {
    let schema = Schema::load(schema_path)?;

    section("Schema");
    kv("Version", &schema.version_tag());
    kv("Created", &schema.created_at().to_rfc3339());
    kv("ID column", schema.id_column());
    kv("Label column", schema.label_column().unwrap_or("-"));
    kv("Features", &schema.len().to_string());

    section("Features");
    println!("  {:<36} {:<6} {}", muted("Name"), muted("Type"), muted("Source"));
    for feature in schema.features() {
        let source = match &feature.origin {
            FeatureOrigin::Column { column } => column.clone(),
            FeatureOrigin::Indicator { group, category } => format!("{} = {}", group, category),
        };
        println!(
            "  {:<36} {:<6} {}",
            feature.name,
            feature.dtype.to_string().truecolor(140, 140, 140),
            dim(&source)
        );
    }

    if !schema.registry().groups().is_empty() {
        section("Categorical groups");
        for group in schema.registry().groups() {
            println!(
                "  {:<20} {} {}",
                group.name,
                dim(&format!("[{}]", group.sources.join(", "))),
                group.categories.len()
            );
        }
    }

    println!();
    Ok(())
}

//! liftcast - Next-weight prediction for strength training logs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use liftcast::ml::plateau::PlateauDetector;
use liftcast::ml::{PredictionOrchestrator, PredictionRequest, TrainingRequest};
use liftcast::tracking::SqliteTracker;
use liftcast::workout::WorkoutSession;
use liftcast::PipelineConfig;

const EXPERIMENT: &str = "liftcast";

#[derive(Parser)]
#[command(name = "liftcast")]
#[command(author, version, about = "Next-weight prediction and plateau detection")]
struct Cli {
    /// Pipeline configuration (JSON)
    #[arg(short, long, global = true, env = "LIFTCAST_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite file for experiment tracking
    #[arg(long, global = true, env = "LIFTCAST_TRACKER_DB")]
    tracker_db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the next working weight
    Predict {
        /// Prediction request (JSON)
        #[arg(short, long)]
        request: PathBuf,

        /// Trained ensemble to load
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Train the ensemble and save it
    Train {
        /// Training request (JSON)
        #[arg(short, long)]
        request: PathBuf,

        /// Where to write the trained ensemble
        #[arg(short, long)]
        save: PathBuf,
    },

    /// Analyze a workout history for plateaus
    Plateau {
        /// Session array, or an object with `workout_history`
        #[arg(long)]
        history: PathBuf,
    },

    /// Show model status
    Status {
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Predict { request, model } => {
            let orchestrator = build_orchestrator(config, cli.tracker_db.as_deref(), model.as_deref())?;
            let request: PredictionRequest = read_json(&request)?;
            print_json(&orchestrator.predict(&request))?;
        }

        Commands::Train { request, save } => {
            let orchestrator = build_orchestrator(config, cli.tracker_db.as_deref(), None)?;
            let request: TrainingRequest = read_json(&request)?;
            let response = orchestrator.train(&request);
            if response.success {
                orchestrator
                    .save_model(&save)
                    .with_context(|| format!("failed to save model to {}", save.display()))?;
                info!(path = %save.display(), "model saved");
            }
            print_json(&response)?;
        }

        Commands::Plateau { history } => {
            let value: Value = read_json(&history)?;
            let sessions = match value {
                Value::Object(mut map) => map.remove("workout_history").unwrap_or(Value::Array(Vec::new())),
                other => other,
            };
            let sessions: Vec<WorkoutSession> = serde_json::from_value(sessions).context("invalid workout history")?;
            let report = PlateauDetector::new(config.plateau).detect(&sessions)?;
            print_json(&report)?;
        }

        Commands::Status { model } => {
            let orchestrator = build_orchestrator(config, cli.tracker_db.as_deref(), model.as_deref())?;
            print_json(&orchestrator.status())?;
        }
    }

    Ok(())
}

fn build_orchestrator(
    config: PipelineConfig,
    tracker_db: Option<&Path>,
    model: Option<&Path>,
) -> Result<PredictionOrchestrator> {
    let mut orchestrator = PredictionOrchestrator::new(config);
    if let Some(path) = tracker_db {
        let tracker = SqliteTracker::open(path, EXPERIMENT)
            .with_context(|| format!("failed to open tracker at {}", path.display()))?;
        orchestrator = orchestrator.with_sink(Arc::new(tracker));
    }
    if let Some(path) = model {
        orchestrator
            .load_model(path)
            .with_context(|| format!("failed to load model from {}", path.display()))?;
    }
    Ok(orchestrator)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

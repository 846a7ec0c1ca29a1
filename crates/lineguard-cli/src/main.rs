//! Lineguard CLI - operate the drift/retrain/promotion loop
//!
//! The `lineguard` command runs cycles by hand and inspects or seeds the
//! stores the loop depends on.
//!
//! ## Commands
//!
//! - `cycle`: run one full cycle for a model and print the report
//! - `drift`: collect + detect only, never trains
//! - `registry`: list versions, show or move an alias, register a version
//! - `baseline`: show or load a model's feature baseline
//! - `dataset`: load training rows for a model
//! - `log`: ingest logged inference requests
//! - `risk`: classify a single prediction

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::{de::DeserializeOwned, Deserialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use lineguard_core::{
    classify_risk, trainer, Collaborators, ControlConfig, ControlLoop, CycleReport, DriftCheck,
    LoopSettings,
};
use lineguard_state::{
    BaselineTable, FeatureBaselineEntry, FeaturePayload, FeatureRow, InferenceLogStore,
    InferenceRecord, ModelRegistry, ModelVersionRecord, NewModelVersion, SurrealBaselineTable,
    SurrealFeatureSource, SurrealHandle, SurrealInferenceLog, SurrealModelRegistry,
};

#[derive(Parser)]
#[command(name = "lineguard")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drift detection and gated retraining for quality models", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Control-loop config file (TOML)
    #[arg(short, long, global = true, env = "LINEGUARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one collect → detect → retrain → promote cycle
    Cycle {
        /// Model name (e.g. WarrantyModel)
        model: String,

        /// End of the inference window (RFC 3339, default: now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Check drift without training
    Drift {
        model: String,

        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// Print the verdict as JSON
        #[arg(long)]
        json_output: bool,
    },

    /// Model registry operations
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },

    /// Feature baseline operations
    Baseline {
        #[command(subcommand)]
        action: BaselineAction,
    },

    /// Training dataset operations
    Dataset {
        #[command(subcommand)]
        action: DatasetAction,
    },

    /// Inference log operations
    Log {
        #[command(subcommand)]
        action: LogAction,
    },

    /// Classify a prediction as LOW / MEDIUM / HIGH risk
    Risk {
        /// Warranty-claim probability from the warranty model
        #[arg(long)]
        probability: f64,

        /// Anomaly-model output (-1 = anomaly, 1 = normal)
        #[arg(long, allow_hyphen_values = true, default_value = "1")]
        anomaly_flag: i8,
    },
}

#[derive(Subcommand)]
enum RegistryAction {
    /// List every version of a model
    Versions { model: String },

    /// Show the version an alias points at
    Current {
        model: String,
        /// Alias to resolve (default: the configured production alias)
        #[arg(long)]
        alias: Option<String>,
    },

    /// Point an alias at a version (manual override / rollback)
    SetAlias {
        model: String,
        version: u64,
        #[arg(long)]
        alias: Option<String>,
    },

    /// Register an externally trained version
    Register {
        model: String,
        #[arg(long)]
        artifact_uri: String,
        #[arg(long)]
        run_id: String,
        /// Validation metric; omit for versions without run data
        #[arg(long)]
        metric: Option<f64>,
    },
}

#[derive(Subcommand)]
enum BaselineAction {
    /// Print a model's baseline
    Show { model: String },

    /// Replace a model's baseline from a JSON array of entries
    Load { model: String, file: PathBuf },
}

#[derive(Subcommand)]
enum DatasetAction {
    /// Append training rows from a JSON array of feature rows
    Ingest { model: String, file: PathBuf },
}

#[derive(Subcommand)]
enum LogAction {
    /// Append inference records from a JSON-lines file
    Ingest { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    lineguard_core::init_tracing(cli.json, level);

    let config = ControlConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    let handle = SurrealHandle::setup_from_env()
        .await
        .context("Failed to connect to lineguard database")?;
    let handle = Arc::new(handle);

    match cli.command {
        Commands::Cycle { model, at } => {
            let report = cmd_cycle(handle, &config, &model, at).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Drift {
            model,
            at,
            json_output,
        } => cmd_drift(handle, &config, &model, at, json_output).await,
        Commands::Registry { action } => match action {
            RegistryAction::Versions { model } => cmd_registry_versions(handle, &model).await,
            RegistryAction::Current { model, alias } => {
                let alias = alias.unwrap_or_else(|| config.production_alias.clone());
                cmd_registry_current(handle, &model, &alias).await
            }
            RegistryAction::SetAlias {
                model,
                version,
                alias,
            } => {
                let alias = alias.unwrap_or_else(|| config.production_alias.clone());
                cmd_registry_set_alias(handle, &model, &alias, version).await
            }
            RegistryAction::Register {
                model,
                artifact_uri,
                run_id,
                metric,
            } => {
                let record =
                    cmd_registry_register(handle, &model, &artifact_uri, &run_id, metric).await?;
                println!("Registered {} version {}", record.model_name, record.version);
                Ok(())
            }
        },
        Commands::Baseline { action } => match action {
            BaselineAction::Show { model } => cmd_baseline_show(handle, &model).await,
            BaselineAction::Load { model, file } => {
                let count = cmd_baseline_load(handle, &model, &file).await?;
                println!("Loaded {} baseline entries for {}", count, model);
                Ok(())
            }
        },
        Commands::Dataset { action } => match action {
            DatasetAction::Ingest { model, file } => {
                let count = cmd_dataset_ingest(handle, &model, &file).await?;
                println!("Ingested {} rows for {}", count, model);
                Ok(())
            }
        },
        Commands::Log { action } => match action {
            LogAction::Ingest { file } => {
                let count = cmd_log_ingest(handle, &file).await?;
                println!("Ingested {} inference records", count);
                Ok(())
            }
        },
        Commands::Risk {
            probability,
            anomaly_flag,
        } => cmd_risk(probability, anomaly_flag),
    }
}

fn build_loop(handle: Arc<SurrealHandle>, config: &ControlConfig) -> Result<ControlLoop> {
    let trainer = trainer::from_config(&config.trainer).context("Failed to build trainer")?;
    Ok(ControlLoop::new(
        Collaborators::from_surreal(handle, trainer),
        LoopSettings::from(config),
    ))
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

// ========== Control Loop Commands ==========

/// Run one cycle and return its report
async fn cmd_cycle(
    handle: Arc<SurrealHandle>,
    config: &ControlConfig,
    model: &str,
    at: Option<DateTime<Utc>>,
) -> Result<CycleReport> {
    let control = build_loop(handle, config)?;
    let report = control
        .run_cycle_at(model, at.unwrap_or_else(Utc::now))
        .await
        .with_context(|| format!("Cycle for {} aborted", model))?;
    Ok(report)
}

/// Collect and detect without training
async fn cmd_drift(
    handle: Arc<SurrealHandle>,
    config: &ControlConfig,
    model: &str,
    at: Option<DateTime<Utc>>,
    json_output: bool,
) -> Result<()> {
    let control = build_loop(handle, config)?;
    let check = control
        .check_drift(model, at.unwrap_or_else(Utc::now))
        .await
        .with_context(|| format!("Drift check for {} failed", model))?;

    match check {
        DriftCheck::InsufficientData { window } => {
            println!(
                "No inference records between {} and {}; no verdict",
                window.start.to_rfc3339(),
                window.end.to_rfc3339()
            );
        }
        DriftCheck::Evaluated { verdict, .. } if json_output => {
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
        DriftCheck::Evaluated { verdict, .. } => {
            println!("{:<28} {:>12} {:>12}  triggered", "feature", "mean_change", "std_change");
            for change in &verdict.changes {
                let std_change = change
                    .std_change
                    .map(|c| format!("{:.4}", c))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<28} {:>12.4} {:>12}  {}",
                    change.feature_name,
                    change.mean_change,
                    std_change,
                    if change.triggered { "yes" } else { "" }
                );
            }
            if verdict.drifted {
                println!("Drift detected: {}", verdict.triggering_features.join(", "));
            } else {
                println!("No drift");
            }
        }
    }
    Ok(())
}

// ========== Registry Commands ==========

async fn cmd_registry_versions(handle: Arc<SurrealHandle>, model: &str) -> Result<()> {
    let registry = SurrealModelRegistry::new(handle);
    let versions = registry.search_versions(model).await?;

    if versions.is_empty() {
        println!("No versions registered for {}", model);
        return Ok(());
    }

    for v in versions {
        let metric = v
            .validation_metric
            .map(|m| format!("{:.4}", m))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{:>4}  {}  metric={}  alias={}  run={}  {}",
            v.version,
            v.created_at.to_rfc3339(),
            metric,
            v.alias.as_deref().unwrap_or("-"),
            v.run_id,
            v.artifact_uri
        );
    }
    Ok(())
}

async fn cmd_registry_current(handle: Arc<SurrealHandle>, model: &str, alias: &str) -> Result<()> {
    let registry = SurrealModelRegistry::new(handle);
    match registry.get_version_by_alias(model, alias).await {
        Ok(record) => println!("{} {} -> version {}", model, alias, record.version),
        Err(e) if e.is_not_found() => println!("No {} version for {}", alias, model),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn cmd_registry_set_alias(
    handle: Arc<SurrealHandle>,
    model: &str,
    alias: &str,
    version: u64,
) -> Result<()> {
    let registry = SurrealModelRegistry::new(handle);
    registry
        .set_alias(model, alias, version)
        .await
        .with_context(|| format!("Failed to point {} at version {}", alias, version))?;
    info!(model_name = %model, alias = %alias, version, "alias reassigned by operator");
    println!("{} {} -> version {}", model, alias, version);
    Ok(())
}

async fn cmd_registry_register(
    handle: Arc<SurrealHandle>,
    model: &str,
    artifact_uri: &str,
    run_id: &str,
    metric: Option<f64>,
) -> Result<ModelVersionRecord> {
    if let Some(m) = metric {
        if !m.is_finite() {
            bail!("metric must be finite, got {}", m);
        }
    }
    let registry = SurrealModelRegistry::new(handle);
    let record = registry
        .register_version(
            model,
            NewModelVersion {
                validation_metric: metric,
                run_id: run_id.to_string(),
                artifact_uri: artifact_uri.to_string(),
            },
        )
        .await?;
    Ok(record)
}

// ========== Data Commands ==========

async fn cmd_baseline_show(handle: Arc<SurrealHandle>, model: &str) -> Result<()> {
    let table = SurrealBaselineTable::new(handle);
    let entries = table.read_all(model).await?;

    if entries.is_empty() {
        println!("No baseline captured for {}", model);
        return Ok(());
    }

    println!("{:<28} {:>14} {:>14}", "feature", "mean", "std");
    for e in entries {
        println!("{:<28} {:>14.4} {:>14.4}", e.feature_name, e.mean_value, e.std_value);
    }
    Ok(())
}

async fn cmd_baseline_load(handle: Arc<SurrealHandle>, model: &str, file: &Path) -> Result<usize> {
    let entries: Vec<FeatureBaselineEntry> = read_json_file(file)?;
    if let Some(bad) = entries
        .iter()
        .find(|e| !e.mean_value.is_finite() || !e.std_value.is_finite())
    {
        bail!("baseline entry {} is not finite", bad.feature_name);
    }
    let count = entries.len();
    SurrealBaselineTable::new(handle)
        .replace_all(model, entries)
        .await?;
    Ok(count)
}

async fn cmd_dataset_ingest(handle: Arc<SurrealHandle>, model: &str, file: &Path) -> Result<usize> {
    let rows: Vec<FeatureRow> = read_json_file(file)?;
    let count = rows.len();
    SurrealFeatureSource::new(handle).insert(model, rows).await?;
    Ok(count)
}

/// One line of an inference-log file. Records without a timestamp are
/// stamped with the ingestion time.
#[derive(Debug, Deserialize)]
struct LogLine {
    payload: FeaturePayload,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

async fn cmd_log_ingest(handle: Arc<SurrealHandle>, file: &Path) -> Result<usize> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let log = SurrealInferenceLog::new(handle);
    let now = Utc::now();

    let mut count = 0;
    for (n, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: LogLine = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid inference record", file.display(), n + 1))?;
        log.append(InferenceRecord::new(
            parsed.payload,
            parsed.timestamp.unwrap_or(now),
        ))
        .await?;
        count += 1;
    }
    Ok(count)
}

// ========== Serving Helpers ==========

fn cmd_risk(probability: f64, anomaly_flag: i8) -> Result<()> {
    if !(0.0..=1.0).contains(&probability) {
        bail!("probability must be within [0, 1], got {}", probability);
    }
    println!("{}", classify_risk(probability, anomaly_flag));
    Ok(())
}

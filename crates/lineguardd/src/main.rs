use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lineguard_core::{
    trainer, Collaborators, ControlConfig, ControlLoop, CycleError, LoopSettings, Scheduler,
    METRICS,
};
use lineguard_state::SurrealHandle;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "lineguardd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Runs lineguard cycles for every configured model on a schedule")]
struct Args {
    /// Control-loop config file (TOML)
    #[arg(short, long, env = "LINEGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Run one cycle per model, print the reports and exit
    #[arg(long)]
    once: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, env = "LINEGUARD_LOG_JSON")]
    json: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    lineguard_core::init_tracing(args.json, level);

    let config = ControlConfig::load(args.config.as_deref()).context("Failed to load config")?;
    let handle = SurrealHandle::setup_from_env()
        .await
        .context("Failed to connect to lineguard database")?;
    let trainer = trainer::from_config(&config.trainer).context("Failed to build trainer")?;
    let control = Arc::new(ControlLoop::new(
        Collaborators::from_surreal(Arc::new(handle), trainer),
        LoopSettings::from(&config),
    ));

    if args.once {
        return run_once(&control, &config).await;
    }

    info!(
        models = ?config.models,
        tick_secs = config.tick_secs,
        window_hours = config.window_hours,
        "lineguardd started"
    );
    Scheduler::from_config(control, &config)
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown requested");
        })
        .await;
    info!("lineguardd stopped");
    Ok(())
}

/// Run every configured model concurrently once.
async fn run_once(control: &ControlLoop, config: &ControlConfig) -> Result<()> {
    let results =
        futures::future::join_all(config.models.iter().map(|m| control.run_cycle(m))).await;

    let mut aborted = Vec::new();
    for (model, result) in config.models.iter().zip(results) {
        match result {
            Ok(report) => println!("{}", serde_json::to_string(&report)?),
            Err(e @ CycleError::CollaboratorUnavailable(_)) => aborted.push(format!("{model}: {e}")),
            Err(e @ CycleError::CycleInFlight { .. }) => info!(model_name = %model, "{e}"),
        }
    }
    METRICS.flush();

    if !aborted.is_empty() {
        anyhow::bail!("cycles aborted: {}", aborted.join("; "));
    }
    Ok(())
}

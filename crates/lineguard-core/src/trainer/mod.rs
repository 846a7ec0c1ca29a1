//! Training collaborators.
//!
//! The control loop treats model fitting as opaque: a [`Trainer`] takes the
//! feature dataset and returns a scalar validation metric (higher is
//! better), the location of the fitted artifact and optionally the feature
//! baseline it was fitted on.
//!
//! Two adapters ship with the crate:
//! - [`CommandTrainer`]: runs a local training command, dataset on stdin
//! - [`HttpTrainer`]: posts the dataset to a training service

mod command;
mod http;

use std::sync::Arc;

use async_trait::async_trait;
use lineguard_state::{FeatureBaselineEntry, FeatureRow};
use serde::{Deserialize, Serialize};

use crate::config::TrainerConfig;

pub use command::CommandTrainer;
pub use http::HttpTrainer;

/// Body sent to a trainer: the model to fit and its dataset.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingRequest<'a> {
    pub model_name: &'a str,
    pub rows: &'a [FeatureRow],
}

/// What a successful training run reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOutput {
    /// Held-out validation metric, higher is better.
    pub metric: f64,
    pub artifact_uri: String,
    /// Identifier of the run in the trainer's own tracking system.
    #[serde(default)]
    pub run_id: Option<String>,
    /// Baseline computed by the trainer; derived from the dataset when absent.
    #[serde(default)]
    pub baseline: Option<Vec<FeatureBaselineEntry>>,
}

#[derive(Debug, thiserror::Error)]
pub enum TrainerError {
    #[error("failed to start trainer: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("trainer exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("trainer timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("malformed trainer output: {0}")]
    MalformedOutput(String),

    #[error("training service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("training service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid trainer configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to encode training request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Fits a model on a dataset.
#[async_trait]
pub trait Trainer: Send + Sync {
    async fn train(
        &self,
        model_name: &str,
        dataset: &[FeatureRow],
    ) -> Result<TrainingOutput, TrainerError>;
}

/// Build the configured trainer.
pub fn from_config(config: &TrainerConfig) -> Result<Arc<dyn Trainer>, TrainerError> {
    match config {
        TrainerConfig::Command {
            command,
            timeout_secs,
        } => Ok(Arc::new(CommandTrainer::new(command.clone(), *timeout_secs)?)),
        TrainerConfig::Http { url, timeout_secs } => {
            Ok(Arc::new(HttpTrainer::new(url.clone(), *timeout_secs)?))
        }
    }
}

/// Parse trainer output: the last non-empty line must be a JSON
/// [`TrainingOutput`]. Earlier lines are treated as progress logs.
pub(crate) fn parse_output(stdout: &str) -> Result<TrainingOutput, TrainerError> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| TrainerError::MalformedOutput("empty output".to_string()))?;
    serde_json::from_str(line).map_err(|e| TrainerError::MalformedOutput(e.to_string()))
}

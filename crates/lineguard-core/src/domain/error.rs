//! Error taxonomy of the control loop.
//!
//! Each stage has its own error type. Stage errors that the cycle can
//! absorb become a [`CycleIssue`](super::CycleIssue) on the report; only
//! [`CycleError`] escapes `run_cycle`.

use chrono::{DateTime, Utc};
use lineguard_state::StorageError;

/// Errors from summarising the inference-log window.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollectError {
    #[error("no inference records between {start} and {end}")]
    InsufficientData {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("inference log unavailable: {0}")]
    Unavailable(StorageError),
}

/// Errors from a retraining run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RetrainError {
    #[error("training failed: {0}")]
    TrainingFailed(String),

    #[error("training collaborator unavailable: {0}")]
    Unavailable(StorageError),
}

/// Errors from the promotion decision.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PromotionError {
    #[error("current production metric unavailable: {0}")]
    MetricUnavailable(String),

    #[error("alias {alias} of {model_name} changed concurrently (attempts: {attempts})")]
    WriteConflict {
        model_name: String,
        alias: String,
        attempts: u32,
    },

    #[error("model registry unavailable: {0}")]
    Unavailable(StorageError),
}

/// Errors that abort a cycle without producing a report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CycleError {
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("a cycle for {model_name} is already running")]
    CycleInFlight { model_name: String },
}

impl From<StorageError> for CycleError {
    fn from(err: StorageError) -> Self {
        CycleError::CollaboratorUnavailable(err.to_string())
    }
}

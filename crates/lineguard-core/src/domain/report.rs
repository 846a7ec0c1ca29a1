//! The externally observable result of one control-loop cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{PromotionError, RetrainError};
use super::stats::TimeWindow;

/// States a cycle moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Collecting,
    NoDrift,
    DriftDetected,
    Training,
    Promoting,
}

impl CycleState {
    /// Whether the loop may move from `self` to `next`.
    pub fn can_transition_to(self, next: CycleState) -> bool {
        use CycleState::*;
        matches!(
            (self, next),
            (Idle, Collecting)
                | (Collecting, NoDrift)
                | (Collecting, DriftDetected)
                | (NoDrift, Idle)
                | (DriftDetected, Training)
                | (Training, Promoting)
                | (Training, Idle)
                | (Promoting, Idle)
        )
    }
}

/// A non-fatal problem that ended the cycle early or blocked promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleIssue {
    /// The window held no inference records; no verdict was possible.
    InsufficientData,
    TrainingFailed { reason: String },
    /// The production metric could not be read, so nothing was promoted.
    MetricUnavailable { reason: String },
    /// The production alias kept changing underneath the gate.
    RegistryWriteConflict { attempts: u32 },
}

impl From<RetrainError> for CycleIssue {
    fn from(err: RetrainError) -> Self {
        CycleIssue::TrainingFailed {
            reason: err.to_string(),
        }
    }
}

impl CycleIssue {
    /// Map a promotion failure to a reportable issue. Registry outages are
    /// not issues and are returned unchanged.
    pub fn from_promotion(err: PromotionError) -> Result<Self, PromotionError> {
        match err {
            PromotionError::MetricUnavailable(reason) => {
                Ok(CycleIssue::MetricUnavailable { reason })
            }
            PromotionError::WriteConflict { attempts, .. } => {
                Ok(CycleIssue::RegistryWriteConflict { attempts })
            }
            other @ PromotionError::Unavailable(_) => Err(other),
        }
    }
}

/// Outcome of one cycle for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub model_name: String,
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub window: TimeWindow,
    /// States visited, starting and ending at `Idle`.
    pub path: Vec<CycleState>,
    pub drifted: bool,
    pub retrained: bool,
    pub promoted: bool,
    pub triggering_features: Vec<String>,
    /// Version registered by this cycle's training run.
    pub new_version: Option<u64>,
    pub new_metric: Option<f64>,
    /// Production metric the new version was compared against.
    pub production_metric: Option<f64>,
    pub issue: Option<CycleIssue>,
}

impl CycleReport {
    pub fn new(model_name: &str, started_at: DateTime<Utc>, window: TimeWindow) -> Self {
        Self {
            model_name: model_name.to_string(),
            cycle_id: Uuid::new_v4(),
            started_at,
            finished_at: started_at,
            window,
            path: vec![CycleState::Idle],
            drifted: false,
            retrained: false,
            promoted: false,
            triggering_features: Vec::new(),
            new_version: None,
            new_metric: None,
            production_metric: None,
            issue: None,
        }
    }

    /// Current state (last state on the path).
    pub fn state(&self) -> CycleState {
        self.path.last().copied().unwrap_or(CycleState::Idle)
    }

    /// Move to `next`, recording it on the path. Illegal moves are ignored
    /// and logged.
    pub fn advance(&mut self, next: CycleState) {
        let current = self.state();
        if current.can_transition_to(next) {
            self.path.push(next);
        } else {
            tracing::warn!(from = ?current, to = ?next, "ignored illegal cycle transition");
        }
    }
}

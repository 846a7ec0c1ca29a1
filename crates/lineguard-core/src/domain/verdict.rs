//! Drift verdicts.

use serde::{Deserialize, Serialize};

/// Relative-change thresholds for the dual drift test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftThresholds {
    /// Maximum tolerated relative change of a feature's mean.
    pub mean: f64,
    /// Maximum tolerated relative change of a feature's standard deviation.
    pub std: f64,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            mean: 0.3,
            std: 0.5,
        }
    }
}

/// Measured change of one feature present in both baseline and live stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDrift {
    pub feature_name: String,
    pub mean_change: f64,
    /// `None` when the live spread is undefined (fewer than two samples).
    pub std_change: Option<f64>,
    pub triggered: bool,
}

/// Outcome of comparing live statistics against the baseline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DriftVerdict {
    pub drifted: bool,
    /// Triggering features, in baseline table order.
    pub triggering_features: Vec<String>,
    /// Every feature that was compared, in baseline table order.
    pub changes: Vec<FeatureDrift>,
}

impl DriftVerdict {
    /// Build a verdict from the per-feature measurements.
    pub fn from_changes(changes: Vec<FeatureDrift>) -> Self {
        let triggering_features: Vec<String> = changes
            .iter()
            .filter(|c| c.triggered)
            .map(|c| c.feature_name.clone())
            .collect();
        Self {
            drifted: !triggering_features.is_empty(),
            triggering_features,
            changes,
        }
    }

    /// Evidence that retraining is warranted. `None` unless drifted.
    pub fn evidence(&self) -> Option<DriftEvidence> {
        self.drifted.then(|| DriftEvidence {
            triggering_features: self.triggering_features.clone(),
        })
    }
}

/// Proof that a drift check came back positive.
///
/// Only [`DriftVerdict::evidence`] can create one, and retraining requires
/// it, so a retrain cannot be started without a drifted verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftEvidence {
    triggering_features: Vec<String>,
}

impl DriftEvidence {
    pub fn triggering_features(&self) -> &[String] {
        &self.triggering_features
    }
}

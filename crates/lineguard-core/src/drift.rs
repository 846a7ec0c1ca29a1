//! DriftDetector: dual-threshold comparison of live statistics against the
//! training baseline.
//!
//! For every feature present in both the baseline and the live stats:
//!
//! ```text
//! mean_change = |live.mean - base.mean| / (|base.mean| + EPSILON)
//! std_change  = |live.std  - base.std | / (|base.std | + EPSILON)
//! ```
//!
//! A feature triggers when `mean_change > threshold_mean` or
//! `std_change > threshold_std`. Features on only one side are skipped.

use crate::baseline::Baseline;
use crate::domain::{DriftThresholds, DriftVerdict, FeatureDrift, LiveStats};

/// Added to the baseline magnitude so a zero baseline never divides by zero.
pub const EPSILON: f64 = 1e-6;

/// Relative change of `live` with respect to `base`.
pub fn relative_change(live: f64, base: f64) -> f64 {
    (live - base).abs() / (base.abs() + EPSILON)
}

/// Pure drift check. Identical inputs always give identical verdicts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriftDetector {
    thresholds: DriftThresholds,
}

impl DriftDetector {
    pub fn new(thresholds: DriftThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> DriftThresholds {
        self.thresholds
    }

    pub fn detect(&self, baseline: &Baseline, live: &LiveStats) -> DriftVerdict {
        let changes = baseline
            .iter()
            .filter_map(|base| {
                let current = live.get(&base.feature_name)?;
                let mean_change = relative_change(current.mean, base.mean_value);
                // no spread with fewer than two samples
                let std_change = current
                    .std
                    .is_finite()
                    .then(|| relative_change(current.std, base.std_value));
                let triggered = mean_change > self.thresholds.mean
                    || std_change.is_some_and(|c| c > self.thresholds.std);
                Some(FeatureDrift {
                    feature_name: base.feature_name.clone(),
                    mean_change,
                    std_change,
                    triggered,
                })
            })
            .collect();
        DriftVerdict::from_changes(changes)
    }
}

/// Free-function form of [`DriftDetector::detect`].
pub fn detect(
    baseline: &Baseline,
    live: &LiveStats,
    threshold_mean: f64,
    threshold_std: f64,
) -> DriftVerdict {
    DriftDetector::new(DriftThresholds {
        mean: threshold_mean,
        std: threshold_std,
    })
    .detect(baseline, live)
}

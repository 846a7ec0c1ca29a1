//! Structured lifecycle events for control-loop cycles.
//!
//! Every event carries an `event` field naming it (`cycle.started`,
//! `drift.evaluated`, `training.finished`, `promotion.decided`,
//! `cycle.finished`, `cycle.skipped`). Cycles run inside [`cycle_span`]
//! so the events are tagged with the model and cycle id.

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{CycleReport, DriftVerdict, TimeWindow};

/// Span for one cycle. Attach it to the cycle future with
/// `tracing::Instrument` rather than entering it across awaits.
pub fn cycle_span(model_name: &str, cycle_id: Uuid) -> tracing::Span {
    tracing::info_span!("lineguard.cycle", model_name = %model_name, cycle_id = %cycle_id)
}

pub fn emit_cycle_started(model_name: &str, window: &TimeWindow) {
    info!(
        event = "cycle.started",
        model_name = %model_name,
        window_start = %window.start,
        window_end = %window.end,
    );
}

pub fn emit_drift_evaluated(model_name: &str, verdict: &DriftVerdict) {
    info!(
        event = "drift.evaluated",
        model_name = %model_name,
        drifted = verdict.drifted,
        features_compared = verdict.changes.len(),
        triggering = ?verdict.triggering_features,
    );
}

/// `version` and `metric` are `None` when training failed.
pub fn emit_training_finished(
    model_name: &str,
    version: Option<u64>,
    metric: Option<f64>,
    duration_ms: u64,
) {
    info!(
        event = "training.finished",
        model_name = %model_name,
        success = version.is_some(),
        version = ?version,
        metric = ?metric,
        duration_ms = duration_ms,
    );
}

pub fn emit_promotion_decided(
    model_name: &str,
    version: u64,
    new_metric: f64,
    production_metric: Option<f64>,
    promoted: bool,
) {
    info!(
        event = "promotion.decided",
        model_name = %model_name,
        version = version,
        new_metric = new_metric,
        production_metric = ?production_metric,
        promoted = promoted,
    );
}

pub fn emit_cycle_finished(report: &CycleReport) {
    let duration_ms = (report.finished_at - report.started_at)
        .num_milliseconds()
        .max(0);
    info!(
        event = "cycle.finished",
        model_name = %report.model_name,
        drifted = report.drifted,
        retrained = report.retrained,
        promoted = report.promoted,
        issue = ?report.issue,
        duration_ms = duration_ms,
    );
}

pub fn emit_cycle_skipped(model_name: &str, reason: &str) {
    info!(event = "cycle.skipped", model_name = %model_name, reason = %reason);
}

/// Cycle aborted by a collaborator failure (warning level).
pub fn emit_cycle_aborted(model_name: &str, error: &dyn std::fmt::Display) {
    warn!(event = "cycle.aborted", model_name = %model_name, error = %error);
}

//! Global atomic counters for the control loop.
//!
//! Counters are bumped at the call site and emitted together by
//! [`Metrics::flush`], typically once per scheduler tick.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters.
pub static METRICS: Metrics = Metrics::new();

/// Counter set. No allocation, no locking.
pub struct Metrics {
    cycles_run: AtomicU64,
    cycles_skipped: AtomicU64,
    drift_detected: AtomicU64,
    retrains: AtomicU64,
    training_failures: AtomicU64,
    promotions: AtomicU64,
    promotions_rejected: AtomicU64,
    write_conflicts: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! counter {
    ($inc:ident, $get:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(metric = stringify!($field), "counter incremented");
        }

        pub fn $get(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            cycles_run: AtomicU64::new(0),
            cycles_skipped: AtomicU64::new(0),
            drift_detected: AtomicU64::new(0),
            retrains: AtomicU64::new(0),
            training_failures: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
            promotions_rejected: AtomicU64::new(0),
            write_conflicts: AtomicU64::new(0),
        }
    }

    counter!(inc_cycles_run, cycles_run, cycles_run);
    counter!(inc_cycles_skipped, cycles_skipped, cycles_skipped);
    counter!(inc_drift_detected, drift_detected, drift_detected);
    counter!(inc_retrains, retrains, retrains);
    counter!(inc_training_failures, training_failures, training_failures);
    counter!(inc_promotions, promotions, promotions);
    counter!(inc_promotions_rejected, promotions_rejected, promotions_rejected);
    counter!(inc_write_conflicts, write_conflicts, write_conflicts);

    /// Emit every counter as one `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            cycles_run = self.cycles_run(),
            cycles_skipped = self.cycles_skipped(),
            drift_detected = self.drift_detected(),
            retrains = self.retrains(),
            training_failures = self.training_failures(),
            promotions = self.promotions(),
            promotions_rejected = self.promotions_rejected(),
            write_conflicts = self.write_conflicts(),
        );
    }

    /// Zero every counter (tests).
    pub fn reset(&self) {
        for counter in [
            &self.cycles_run,
            &self.cycles_skipped,
            &self.drift_detected,
            &self.retrains,
            &self.training_failures,
            &self.promotions,
            &self.promotions_rejected,
            &self.write_conflicts,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

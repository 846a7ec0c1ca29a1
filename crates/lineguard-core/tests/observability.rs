//! Lifecycle events emitted during a cycle.

mod common;

use std::sync::Arc;

use common::*;
use lineguard_core::obs;
use tracing_test::traced_test;

#[traced_test]
#[tokio::test]
async fn drifted_cycle_emits_every_stage() {
    let h = Harness::new(drifted_traffic(), Arc::new(StaticTrainer::new(0.9)));

    h.control.run_cycle_at(MODEL, now()).await.unwrap();

    assert!(logs_contain("cycle.started"));
    assert!(logs_contain("drift.evaluated"));
    assert!(logs_contain("training.finished"));
    assert!(logs_contain("promotion.decided"));
    assert!(logs_contain("cycle.finished"));
    assert!(logs_contain("WarrantyModel"));
}

#[traced_test]
#[tokio::test]
async fn quiet_cycle_skips_training_events() {
    let h = Harness::new(Vec::new(), Arc::new(StaticTrainer::new(0.9)));

    h.control.run_cycle_at(MODEL, now()).await.unwrap();

    assert!(logs_contain("cycle.started"));
    assert!(logs_contain("cycle.finished"));
    assert!(!logs_contain("training.finished"));
    assert!(!logs_contain("promotion.decided"));
}

#[traced_test]
#[test]
fn skipped_cycle_is_logged() {
    obs::emit_cycle_skipped("AnomalyModel", "previous cycle still running");
    assert!(logs_contain("cycle.skipped"));
    assert!(logs_contain("previous cycle still running"));
}

#[traced_test]
#[test]
fn aborted_cycle_is_a_warning() {
    obs::emit_cycle_aborted("AnomalyModel", &"store unreachable");
    assert!(logs_contain("WARN"));
    assert!(logs_contain("store unreachable"));
}

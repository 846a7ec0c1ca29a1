//! Lineguard core: drift detection and gated retraining for
//! manufacturing-quality models.
//!
//! Components, leaf first:
//! - [`FeatureStatsCollector`]: live per-feature mean/std over a log window
//! - [`BaselineStore`]: training-time baseline of a model
//! - [`DriftDetector`]: dual relative-change threshold test
//! - [`RetrainOrchestrator`]: runs the trainer and registers the new version
//! - [`PromotionGate`]: moves the production alias only on improvement
//! - [`ControlLoop`]: ties them together, single-flight per model
//! - [`Scheduler`]: runs cycles for every configured model on an interval

pub mod baseline;
pub mod collector;
pub mod config;
pub mod control_loop;
pub mod domain;
pub mod drift;
pub mod metrics;
pub mod obs;
pub mod promotion;
pub mod retrain;
pub mod scheduler;
pub mod telemetry;
pub mod trainer;

pub use baseline::{Baseline, BaselineStore};
pub use collector::FeatureStatsCollector;
pub use config::{ConfigError, ControlConfig, TrainerConfig};
pub use control_loop::{Collaborators, ControlLoop, DriftCheck, LoopSettings};
pub use domain::{
    baseline_from_rows, classify_risk, summarize, CollectError, CycleError, CycleIssue,
    CycleReport, CycleState, DriftEvidence, DriftThresholds, DriftVerdict, FeatureDrift,
    LiveStatEntry, LiveStats, PromotionError, RetrainError, RiskLevel, TimeWindow,
};
pub use drift::{detect, relative_change, DriftDetector, EPSILON};
pub use metrics::METRICS;
pub use promotion::{PromotionGate, PromotionResult, MAX_SWAP_ATTEMPTS};
pub use retrain::{RetrainOrchestrator, TrainedArtifact};
pub use scheduler::Scheduler;
pub use telemetry::init_tracing;
pub use trainer::{CommandTrainer, HttpTrainer, Trainer, TrainerError, TrainingOutput};

pub use lineguard_state::{
    FeatureBaselineEntry, FeaturePayload, FeatureRow, InferenceRecord, ModelVersionRecord,
    StorageError, SurrealHandle, PRODUCTION_ALIAS,
};

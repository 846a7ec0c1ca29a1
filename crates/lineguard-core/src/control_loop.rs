//! ControlLoop: one cycle is collect → detect → (retrain) → (promote).
//!
//! ```text
//! Idle → Collecting → NoDrift → Idle
//!                   → DriftDetected → Training → Promoting → Idle
//!                                              → Idle            (training failed)
//! ```
//!
//! Cycles for the same model never overlap. Expected failures end up as a
//! [`CycleIssue`] on the report; an unreachable collaborator aborts the
//! cycle with [`CycleError::CollaboratorUnavailable`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use lineguard_state::{
    BaselineTable, FeatureSource, InferenceLogStore, ModelRegistry, SurrealBaselineTable,
    SurrealFeatureSource, SurrealHandle, SurrealInferenceLog, SurrealModelRegistry,
};
use tracing::Instrument;

use crate::baseline::BaselineStore;
use crate::collector::FeatureStatsCollector;
use crate::config::ControlConfig;
use crate::domain::{
    CollectError, CycleError, CycleIssue, CycleReport, CycleState, DriftThresholds,
    DriftVerdict, RetrainError, TimeWindow,
};
use crate::drift::DriftDetector;
use crate::metrics::METRICS;
use crate::obs;
use crate::promotion::PromotionGate;
use crate::retrain::RetrainOrchestrator;
use crate::trainer::Trainer;

/// External collaborators of the loop.
#[derive(Clone)]
pub struct Collaborators {
    pub inference_log: Arc<dyn InferenceLogStore>,
    pub baselines: Arc<dyn BaselineTable>,
    pub features: Arc<dyn FeatureSource>,
    pub registry: Arc<dyn ModelRegistry>,
    pub trainer: Arc<dyn Trainer>,
}

impl Collaborators {
    /// All stores backed by one SurrealDB handle.
    pub fn from_surreal(handle: Arc<SurrealHandle>, trainer: Arc<dyn Trainer>) -> Self {
        Self {
            inference_log: Arc::new(SurrealInferenceLog::new(handle.clone())),
            baselines: Arc::new(SurrealBaselineTable::new(handle.clone())),
            features: Arc::new(SurrealFeatureSource::new(handle.clone())),
            registry: Arc::new(SurrealModelRegistry::new(handle)),
            trainer,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub thresholds: DriftThresholds,
    /// Length of the inference-log window.
    pub window: chrono::Duration,
    pub production_alias: String,
}

impl Default for LoopSettings {
    fn default() -> Self {
        LoopSettings::from(&ControlConfig::default())
    }
}

impl From<&ControlConfig> for LoopSettings {
    fn from(config: &ControlConfig) -> Self {
        Self {
            thresholds: config.thresholds(),
            window: config.window(),
            production_alias: config.production_alias.clone(),
        }
    }
}

/// Result of a stand-alone drift check.
#[derive(Debug, Clone, PartialEq)]
pub enum DriftCheck {
    /// The window held no inference records.
    InsufficientData { window: TimeWindow },
    Evaluated {
        window: TimeWindow,
        verdict: DriftVerdict,
    },
}

pub struct ControlLoop {
    collector: FeatureStatsCollector,
    baselines: BaselineStore,
    detector: DriftDetector,
    orchestrator: RetrainOrchestrator,
    gate: PromotionGate,
    window: chrono::Duration,
    in_flight: Mutex<HashSet<String>>,
}

/// Marks a model as running; cleared on drop.
struct FlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    model_name: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.model_name);
    }
}

impl ControlLoop {
    pub fn new(collaborators: Collaborators, settings: LoopSettings) -> Self {
        let Collaborators {
            inference_log,
            baselines,
            features,
            registry,
            trainer,
        } = collaborators;
        Self {
            collector: FeatureStatsCollector::new(inference_log),
            baselines: BaselineStore::new(baselines.clone()),
            detector: DriftDetector::new(settings.thresholds),
            orchestrator: RetrainOrchestrator::new(features, trainer, registry.clone(), baselines),
            gate: PromotionGate::new(registry, settings.production_alias),
            window: settings.window,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Whether a cycle for `model_name` is currently running.
    pub fn is_in_flight(&self, model_name: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(model_name)
    }

    fn begin(&self, model_name: &str) -> Result<FlightGuard<'_>, CycleError> {
        let mut running = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(model_name.to_string()) {
            return Err(CycleError::CycleInFlight {
                model_name: model_name.to_string(),
            });
        }
        Ok(FlightGuard {
            in_flight: &self.in_flight,
            model_name: model_name.to_string(),
        })
    }

    /// Run one cycle over the window ending now.
    pub async fn run_cycle(&self, model_name: &str) -> Result<CycleReport, CycleError> {
        self.run_cycle_at(model_name, Utc::now()).await
    }

    /// Run one cycle over the window ending at `now`.
    pub async fn run_cycle_at(
        &self,
        model_name: &str,
        now: DateTime<Utc>,
    ) -> Result<CycleReport, CycleError> {
        let _flight = self.begin(model_name)?;

        let window = TimeWindow::ending_at(now, self.window);
        let mut report = CycleReport::new(model_name, Utc::now(), window);
        let span = obs::cycle_span(model_name, report.cycle_id);

        let outcome = self.execute(&mut report).instrument(span.clone()).await;
        let _entered = span.enter();
        match outcome {
            Ok(()) => {
                report.finished_at = Utc::now();
                METRICS.inc_cycles_run();
                obs::emit_cycle_finished(&report);
                Ok(report)
            }
            Err(e) => {
                obs::emit_cycle_aborted(model_name, &e);
                Err(e)
            }
        }
    }

    async fn execute(&self, report: &mut CycleReport) -> Result<(), CycleError> {
        let model_name = report.model_name.clone();

        report.advance(CycleState::Collecting);
        obs::emit_cycle_started(&model_name, &report.window);

        let verdict = match self.evaluate(&model_name, report.window).await? {
            DriftCheck::InsufficientData { .. } => {
                report.issue = Some(CycleIssue::InsufficientData);
                report.advance(CycleState::NoDrift);
                report.advance(CycleState::Idle);
                return Ok(());
            }
            DriftCheck::Evaluated { verdict, .. } => verdict,
        };

        report.drifted = verdict.drifted;
        report.triggering_features = verdict.triggering_features.clone();
        let Some(evidence) = verdict.evidence() else {
            report.advance(CycleState::NoDrift);
            report.advance(CycleState::Idle);
            return Ok(());
        };
        METRICS.inc_drift_detected();
        report.advance(CycleState::DriftDetected);

        report.advance(CycleState::Training);
        let artifact = match self.orchestrator.retrain(&model_name, &evidence).await {
            Ok(artifact) => artifact,
            Err(RetrainError::Unavailable(e)) => return Err(e.into()),
            Err(e @ RetrainError::TrainingFailed(_)) => {
                METRICS.inc_training_failures();
                report.issue = Some(e.into());
                report.advance(CycleState::Idle);
                return Ok(());
            }
        };
        METRICS.inc_retrains();
        report.retrained = true;
        report.new_version = Some(artifact.version_handle);
        report.new_metric = Some(artifact.metric);

        report.advance(CycleState::Promoting);
        match self
            .gate
            .maybe_promote(&model_name, artifact.version_handle, artifact.metric)
            .await
        {
            Ok(result) => {
                report.promoted = result.promoted;
                report.production_metric = result.production_metric;
                if result.promoted {
                    self.orchestrator
                        .install_baseline(&model_name, &artifact)
                        .await
                        .map_err(|e| match e {
                            RetrainError::Unavailable(e) => CycleError::from(e),
                            other => CycleError::CollaboratorUnavailable(other.to_string()),
                        })?;
                }
            }
            Err(e) => match CycleIssue::from_promotion(e) {
                Ok(issue) => report.issue = Some(issue),
                Err(e) => return Err(CycleError::CollaboratorUnavailable(e.to_string())),
            },
        }
        report.advance(CycleState::Idle);
        Ok(())
    }

    /// Collect and detect for the window ending at `now` without training.
    pub async fn check_drift(
        &self,
        model_name: &str,
        now: DateTime<Utc>,
    ) -> Result<DriftCheck, CycleError> {
        self.evaluate(model_name, TimeWindow::ending_at(now, self.window))
            .await
    }

    async fn evaluate(&self, model_name: &str, window: TimeWindow) -> Result<DriftCheck, CycleError> {
        // the log is read first so an empty window touches nothing else
        let live = match self.collector.collect(window).await {
            Ok(live) => live,
            Err(CollectError::InsufficientData { .. }) => {
                return Ok(DriftCheck::InsufficientData { window });
            }
            Err(CollectError::Unavailable(e)) => return Err(e.into()),
        };
        let baseline = self.baselines.load(model_name).await?;
        let verdict = self.detector.detect(&baseline, &live);
        obs::emit_drift_evaluated(model_name, &verdict);
        Ok(DriftCheck::Evaluated { window, verdict })
    }
}

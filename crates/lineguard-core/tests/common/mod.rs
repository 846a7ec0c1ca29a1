//! Shared fixtures for the lineguard-core integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use lineguard_core::{
    Collaborators, ControlLoop, LoopSettings, Trainer, TrainerError, TrainingOutput,
};
use lineguard_state::fakes::{
    MemoryBaselineTable, MemoryFeatureSource, MemoryInferenceLog, MemoryModelRegistry,
};
use lineguard_state::{
    BaselineTable, FeatureBaselineEntry, FeaturePayload, FeatureRow, FeatureSource,
    InferenceLogStore, InferenceRecord, ModelRegistry, ModelVersionRecord, NewModelVersion,
    StorageResult,
};
use tokio::sync::Notify;

pub const MODEL: &str = "WarrantyModel";

/// Fixed evaluation instant.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap()
}

/// One record per value, spaced a minute apart inside the last hour.
pub fn records(feature: &str, values: &[f64]) -> Vec<InferenceRecord> {
    records_before(now(), feature, values)
}

pub fn records_before(
    anchor: DateTime<Utc>,
    feature: &str,
    values: &[f64],
) -> Vec<InferenceRecord> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let mut payload = FeaturePayload::new();
            payload.insert(feature.to_string(), *v);
            InferenceRecord::new(payload, anchor - Duration::minutes(i as i64 + 1))
        })
        .collect()
}

pub fn torque_baseline() -> Vec<FeatureBaselineEntry> {
    vec![FeatureBaselineEntry::new("torque", 100.0, 5.0)]
}

/// Live torque mean 140 (40% shift).
pub fn drifted_traffic() -> Vec<InferenceRecord> {
    records("torque", &[135.0, 145.0])
}

/// Drifted traffic logged just before the wall clock, for scheduler runs.
pub fn recent_drifted_traffic() -> Vec<InferenceRecord> {
    records_before(Utc::now(), "torque", &[135.0, 145.0])
}

/// Live torque mean 105, std ~4.95.
pub fn stable_traffic() -> Vec<InferenceRecord> {
    records("torque", &[101.5, 108.5])
}

/// Training rows whose torque matches `drifted_traffic`.
pub fn dataset() -> Vec<FeatureRow> {
    [135.0, 145.0]
        .iter()
        .enumerate()
        .map(|(i, t)| FeatureRow {
            entity_id: format!("veh-{i}"),
            features: [("torque".to_string(), *t)].into_iter().collect(),
            label: Some(i == 0),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Trainers
// ---------------------------------------------------------------------------

/// Returns a fixed metric and counts calls.
pub struct StaticTrainer {
    metric: f64,
    baseline: Option<Vec<FeatureBaselineEntry>>,
    pub calls: AtomicUsize,
}

impl StaticTrainer {
    pub fn new(metric: f64) -> Self {
        Self {
            metric,
            baseline: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_baseline(mut self, baseline: Vec<FeatureBaselineEntry>) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Trainer for StaticTrainer {
    async fn train(
        &self,
        model_name: &str,
        dataset: &[FeatureRow],
    ) -> Result<TrainingOutput, TrainerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TrainingOutput {
            metric: self.metric,
            artifact_uri: format!("memory://{model_name}/{n}/{}", dataset.len()),
            run_id: Some(format!("run-{n}")),
            baseline: self.baseline.clone(),
        })
    }
}

/// Always fails, as a non-converging fit would.
pub struct FailingTrainer {
    pub calls: AtomicUsize,
}

impl FailingTrainer {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Trainer for FailingTrainer {
    async fn train(&self, _: &str, _: &[FeatureRow]) -> Result<TrainingOutput, TrainerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TrainerError::NonZeroExit {
            code: 1,
            stderr: "did not converge".to_string(),
        })
    }
}

/// Blocks inside `train` until released.
pub struct GatedTrainer {
    pub started: Notify,
    pub release: Notify,
    metric: f64,
}

impl GatedTrainer {
    pub fn new(metric: f64) -> Self {
        Self {
            started: Notify::new(),
            release: Notify::new(),
            metric,
        }
    }
}

#[async_trait]
impl Trainer for GatedTrainer {
    async fn train(&self, model_name: &str, _: &[FeatureRow]) -> Result<TrainingOutput, TrainerError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(TrainingOutput {
            metric: self.metric,
            artifact_uri: format!("memory://{model_name}"),
            run_id: None,
            baseline: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Call-counting collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CallCounts {
    pub log: AtomicUsize,
    pub baselines: AtomicUsize,
    pub features: AtomicUsize,
    pub registry: AtomicUsize,
}

impl CallCounts {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Counting<T> {
    pub inner: T,
    pub counts: Arc<CallCounts>,
}

#[async_trait]
impl InferenceLogStore for Counting<MemoryInferenceLog> {
    async fn append(&self, record: InferenceRecord) -> StorageResult<()> {
        CallCounts::bump(&self.counts.log);
        self.inner.append(record).await
    }

    async fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<InferenceRecord>> {
        CallCounts::bump(&self.counts.log);
        self.inner.query(start, end).await
    }
}

#[async_trait]
impl BaselineTable for Counting<MemoryBaselineTable> {
    async fn read_all(&self, model_name: &str) -> StorageResult<Vec<FeatureBaselineEntry>> {
        CallCounts::bump(&self.counts.baselines);
        self.inner.read_all(model_name).await
    }

    async fn replace_all(
        &self,
        model_name: &str,
        entries: Vec<FeatureBaselineEntry>,
    ) -> StorageResult<()> {
        CallCounts::bump(&self.counts.baselines);
        self.inner.replace_all(model_name, entries).await
    }
}

#[async_trait]
impl FeatureSource for Counting<MemoryFeatureSource> {
    async fn load_dataset(&self, model_name: &str) -> StorageResult<Vec<FeatureRow>> {
        CallCounts::bump(&self.counts.features);
        self.inner.load_dataset(model_name).await
    }
}

#[async_trait]
impl ModelRegistry for Counting<MemoryModelRegistry> {
    async fn register_version(
        &self,
        model_name: &str,
        new_version: NewModelVersion,
    ) -> StorageResult<ModelVersionRecord> {
        CallCounts::bump(&self.counts.registry);
        self.inner.register_version(model_name, new_version).await
    }

    async fn get_version_by_alias(
        &self,
        model_name: &str,
        alias: &str,
    ) -> StorageResult<ModelVersionRecord> {
        CallCounts::bump(&self.counts.registry);
        self.inner.get_version_by_alias(model_name, alias).await
    }

    async fn get_metric(&self, model_name: &str, version: u64) -> StorageResult<f64> {
        CallCounts::bump(&self.counts.registry);
        self.inner.get_metric(model_name, version).await
    }

    async fn set_alias(&self, model_name: &str, alias: &str, version: u64) -> StorageResult<()> {
        CallCounts::bump(&self.counts.registry);
        self.inner.set_alias(model_name, alias, version).await
    }

    async fn swap_alias(
        &self,
        model_name: &str,
        alias: &str,
        expected: Option<u64>,
        version: u64,
    ) -> StorageResult<()> {
        CallCounts::bump(&self.counts.registry);
        self.inner
            .swap_alias(model_name, alias, expected, version)
            .await
    }

    async fn search_versions(&self, model_name: &str) -> StorageResult<Vec<ModelVersionRecord>> {
        CallCounts::bump(&self.counts.registry);
        self.inner.search_versions(model_name).await
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Fakes wired into a control loop, kept for inspection.
pub struct Harness {
    pub log: Arc<MemoryInferenceLog>,
    pub baselines: Arc<MemoryBaselineTable>,
    pub features: Arc<MemoryFeatureSource>,
    pub registry: Arc<MemoryModelRegistry>,
    pub control: Arc<ControlLoop>,
}

impl Harness {
    pub fn new(traffic: Vec<InferenceRecord>, trainer: Arc<dyn Trainer>) -> Self {
        let log = Arc::new(MemoryInferenceLog::with_records(traffic));
        let baselines = Arc::new(MemoryBaselineTable::with_entries(MODEL, torque_baseline()));
        let features = Arc::new(MemoryFeatureSource::with_rows(MODEL, dataset()));
        let registry = Arc::new(MemoryModelRegistry::new());
        let control = Arc::new(ControlLoop::new(
            Collaborators {
                inference_log: log.clone(),
                baselines: baselines.clone(),
                features: features.clone(),
                registry: registry.clone(),
                trainer,
            },
            LoopSettings::default(),
        ));
        Self {
            log,
            baselines,
            features,
            registry,
            control,
        }
    }

    /// Register a version with `metric` and make it production.
    pub async fn seed_production(&self, metric: Option<f64>) -> u64 {
        let record = self
            .registry
            .register_version(
                MODEL,
                NewModelVersion {
                    validation_metric: metric,
                    run_id: "seed".to_string(),
                    artifact_uri: "memory://seed".to_string(),
                },
            )
            .await
            .unwrap();
        self.registry
            .set_alias(MODEL, lineguard_state::PRODUCTION_ALIAS, record.version)
            .await
            .unwrap();
        record.version
    }

    pub async fn production_version(&self) -> Option<u64> {
        self.registry
            .get_version_by_alias(MODEL, lineguard_state::PRODUCTION_ALIAS)
            .await
            .ok()
            .map(|r| r.version)
    }
}

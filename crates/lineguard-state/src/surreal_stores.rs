//! SurrealDB-backed telemetry stores
//!
//! Thin adapters from [`SurrealHandle`] to the `InferenceLogStore`,
//! `BaselineTable` and `FeatureSource` traits.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::storage_traits::{
    BaselineTable, FeatureBaselineEntry, FeatureRow, FeatureSource, InferenceLogStore,
    InferenceRecord, StorageResult,
};
use crate::SurrealHandle;

/// `prediction_logs` table.
#[derive(Clone)]
pub struct SurrealInferenceLog {
    handle: Arc<SurrealHandle>,
}

impl SurrealInferenceLog {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl InferenceLogStore for SurrealInferenceLog {
    async fn append(&self, record: InferenceRecord) -> StorageResult<()> {
        self.handle.log_append(record).await
    }

    async fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<InferenceRecord>> {
        self.handle.log_query(start, end).await
    }
}

/// `feature_baseline_stats` table.
#[derive(Clone)]
pub struct SurrealBaselineTable {
    handle: Arc<SurrealHandle>,
}

impl SurrealBaselineTable {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl BaselineTable for SurrealBaselineTable {
    async fn read_all(&self, model_name: &str) -> StorageResult<Vec<FeatureBaselineEntry>> {
        self.handle.baseline_read(model_name).await
    }

    async fn replace_all(
        &self,
        model_name: &str,
        entries: Vec<FeatureBaselineEntry>,
    ) -> StorageResult<()> {
        self.handle.baseline_replace(model_name, entries).await
    }
}

/// `vehicle_features` table.
#[derive(Clone)]
pub struct SurrealFeatureSource {
    handle: Arc<SurrealHandle>,
}

impl SurrealFeatureSource {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }

    /// Append rows to a model's dataset.
    pub async fn insert(&self, model_name: &str, rows: Vec<FeatureRow>) -> StorageResult<()> {
        self.handle.features_insert(model_name, rows).await
    }
}

#[async_trait]
impl FeatureSource for SurrealFeatureSource {
    async fn load_dataset(&self, model_name: &str) -> StorageResult<Vec<FeatureRow>> {
        self.handle.features_load(model_name).await
    }
}

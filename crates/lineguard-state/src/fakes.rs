//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryInferenceLog`, `MemoryBaselineTable`,
//! `MemoryFeatureSource` and `MemoryModelRegistry` that satisfy the trait
//! contracts without any external dependencies.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::storage_traits::*;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryInferenceLog
// ---------------------------------------------------------------------------

/// In-memory inference log backed by a `Vec<InferenceRecord>`.
#[derive(Debug, Default)]
pub struct MemoryInferenceLog {
    records: Mutex<Vec<InferenceRecord>>,
}

impl MemoryInferenceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the log with existing records.
    pub fn with_records(records: Vec<InferenceRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InferenceLogStore for MemoryInferenceLog {
    async fn append(&self, record: InferenceRecord) -> StorageResult<()> {
        lock(&self.records).push(record);
        Ok(())
    }

    async fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<InferenceRecord>> {
        let records = lock(&self.records);
        let mut window: Vec<InferenceRecord> = records
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .cloned()
            .collect();
        window.sort_by_key(|r| r.timestamp);
        Ok(window)
    }
}

// ---------------------------------------------------------------------------
// MemoryBaselineTable
// ---------------------------------------------------------------------------

/// In-memory baseline table backed by a `HashMap<model, Vec<entry>>`.
#[derive(Debug, Default)]
pub struct MemoryBaselineTable {
    rows: Mutex<HashMap<String, Vec<FeatureBaselineEntry>>>,
}

impl MemoryBaselineTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a model's baseline.
    pub fn with_entries(model_name: &str, entries: Vec<FeatureBaselineEntry>) -> Self {
        let table = Self::default();
        lock(&table.rows).insert(model_name.to_string(), entries);
        table
    }
}

#[async_trait]
impl BaselineTable for MemoryBaselineTable {
    async fn read_all(&self, model_name: &str) -> StorageResult<Vec<FeatureBaselineEntry>> {
        Ok(lock(&self.rows).get(model_name).cloned().unwrap_or_default())
    }

    async fn replace_all(
        &self,
        model_name: &str,
        entries: Vec<FeatureBaselineEntry>,
    ) -> StorageResult<()> {
        lock(&self.rows).insert(model_name.to_string(), entries);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryFeatureSource
// ---------------------------------------------------------------------------

/// In-memory feature dataset keyed by model name.
#[derive(Debug, Default)]
pub struct MemoryFeatureSource {
    datasets: Mutex<HashMap<String, Vec<FeatureRow>>>,
}

impl MemoryFeatureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(model_name: &str, rows: Vec<FeatureRow>) -> Self {
        let source = Self::default();
        source.set_rows(model_name, rows);
        source
    }

    pub fn set_rows(&self, model_name: &str, rows: Vec<FeatureRow>) {
        lock(&self.datasets).insert(model_name.to_string(), rows);
    }
}

#[async_trait]
impl FeatureSource for MemoryFeatureSource {
    async fn load_dataset(&self, model_name: &str) -> StorageResult<Vec<FeatureRow>> {
        Ok(lock(&self.datasets)
            .get(model_name)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MemoryModelRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ModelEntry {
    versions: Vec<ModelVersionRecord>,
    aliases: BTreeMap<String, u64>,
}

impl ModelEntry {
    fn alias_for(&self, version: u64) -> Option<String> {
        self.aliases
            .iter()
            .find(|(_, v)| **v == version)
            .map(|(alias, _)| alias.clone())
    }

    fn has_version(&self, version: u64) -> bool {
        self.versions.iter().any(|v| v.version == version)
    }
}

/// In-memory model registry backed by a `HashMap<model, ModelEntry>`.
///
/// Every operation runs under one mutex, so alias reassignment is atomic.
#[derive(Debug, Default)]
pub struct MemoryModelRegistry {
    models: Mutex<HashMap<String, ModelEntry>>,
}

impl MemoryModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn version_not_found(model_name: &str, version: u64) -> StorageError {
        StorageError::VersionNotFound {
            model_name: model_name.to_string(),
            version,
        }
    }
}

#[async_trait]
impl ModelRegistry for MemoryModelRegistry {
    async fn register_version(
        &self,
        model_name: &str,
        new_version: NewModelVersion,
    ) -> StorageResult<ModelVersionRecord> {
        let mut models = lock(&self.models);
        let entry = models.entry(model_name.to_string()).or_default();
        let next = entry.versions.iter().map(|v| v.version).max().unwrap_or(0) + 1;
        let record = ModelVersionRecord {
            model_name: model_name.to_string(),
            version: next,
            validation_metric: new_version.validation_metric,
            alias: None,
            run_id: new_version.run_id,
            artifact_uri: new_version.artifact_uri,
            created_at: Utc::now(),
        };
        entry.versions.push(record.clone());
        Ok(record)
    }

    async fn get_version_by_alias(
        &self,
        model_name: &str,
        alias: &str,
    ) -> StorageResult<ModelVersionRecord> {
        let models = lock(&self.models);
        let alias_not_found = || StorageError::AliasNotFound {
            model_name: model_name.to_string(),
            alias: alias.to_string(),
        };
        let entry = models.get(model_name).ok_or_else(alias_not_found)?;
        let version = *entry.aliases.get(alias).ok_or_else(alias_not_found)?;
        let mut record = entry
            .versions
            .iter()
            .find(|v| v.version == version)
            .cloned()
            .ok_or_else(|| Self::version_not_found(model_name, version))?;
        record.alias = Some(alias.to_string());
        Ok(record)
    }

    async fn get_metric(&self, model_name: &str, version: u64) -> StorageResult<f64> {
        let models = lock(&self.models);
        let record = models
            .get(model_name)
            .and_then(|e| e.versions.iter().find(|v| v.version == version))
            .ok_or_else(|| Self::version_not_found(model_name, version))?;
        record
            .validation_metric
            .ok_or_else(|| StorageError::MetricNotFound {
                model_name: model_name.to_string(),
                version,
            })
    }

    async fn set_alias(&self, model_name: &str, alias: &str, version: u64) -> StorageResult<()> {
        let mut models = lock(&self.models);
        let entry = models
            .get_mut(model_name)
            .filter(|e| e.has_version(version))
            .ok_or_else(|| Self::version_not_found(model_name, version))?;
        entry.aliases.insert(alias.to_string(), version);
        Ok(())
    }

    async fn swap_alias(
        &self,
        model_name: &str,
        alias: &str,
        expected: Option<u64>,
        version: u64,
    ) -> StorageResult<()> {
        let mut models = lock(&self.models);
        let entry = models
            .get_mut(model_name)
            .filter(|e| e.has_version(version))
            .ok_or_else(|| Self::version_not_found(model_name, version))?;
        let actual = entry.aliases.get(alias).copied();
        if actual != expected {
            return Err(StorageError::AliasConflict {
                model_name: model_name.to_string(),
                alias: alias.to_string(),
                expected,
                actual,
            });
        }
        entry.aliases.insert(alias.to_string(), version);
        Ok(())
    }

    async fn search_versions(&self, model_name: &str) -> StorageResult<Vec<ModelVersionRecord>> {
        let models = lock(&self.models);
        let Some(entry) = models.get(model_name) else {
            return Ok(Vec::new());
        };
        let mut versions: Vec<ModelVersionRecord> = entry
            .versions
            .iter()
            .map(|v| {
                let mut record = v.clone();
                record.alias = entry.alias_for(v.version);
                record
            })
            .collect();
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }
}

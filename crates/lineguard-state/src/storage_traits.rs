//! Storage trait definitions for lineguard
//!
//! These traits are the narrow interfaces the control loop uses to reach
//! its external collaborators:
//! - `InferenceLogStore`: logged prediction requests (append / window query)
//! - `BaselineTable`: per-feature statistics captured at training time
//! - `FeatureSource`: the model-ready training dataset
//! - `ModelRegistry`: versioned model records and reassignable aliases
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Alias that designates the version serving live traffic.
pub const PRODUCTION_ALIAS: &str = "production";

/// Flat feature-name → value mapping, as logged for one inference request.
pub type FeaturePayload = BTreeMap<String, f64>;

// ---------------------------------------------------------------------------
// InferenceLogStore — logged prediction requests
// ---------------------------------------------------------------------------

/// One logged inference request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRecord {
    /// Model inputs exactly as the serving layer received them
    pub payload: FeaturePayload,
    /// When the prediction was served
    pub timestamp: DateTime<Utc>,
}

impl InferenceRecord {
    pub fn new(payload: FeaturePayload, timestamp: DateTime<Utc>) -> Self {
        Self { payload, timestamp }
    }
}

/// Append-only log of inference requests.
///
/// Guarantees:
/// - `query(start, end)` is inclusive at both ends.
/// - Records come back ordered by timestamp (oldest first).
#[async_trait]
pub trait InferenceLogStore: Send + Sync {
    /// Record one served request.
    async fn append(&self, record: InferenceRecord) -> StorageResult<()>;

    /// Return every record whose timestamp lies in `[start, end]`.
    async fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<InferenceRecord>>;
}

// ---------------------------------------------------------------------------
// BaselineTable — training-time feature statistics
// ---------------------------------------------------------------------------

/// Mean and standard deviation of one feature at the last training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBaselineEntry {
    pub feature_name: String,
    pub mean_value: f64,
    pub std_value: f64,
}

impl FeatureBaselineEntry {
    pub fn new(feature_name: impl Into<String>, mean_value: f64, std_value: f64) -> Self {
        Self {
            feature_name: feature_name.into(),
            mean_value,
            std_value,
        }
    }
}

/// Per-model baseline statistics.
///
/// Semantics:
/// - `read_all` returns rows in table order (the order they were written).
/// - `replace_all` swaps the full row set for a model in one step; readers
///   see either the old rows or the new rows, never a mix.
#[async_trait]
pub trait BaselineTable: Send + Sync {
    /// Read every baseline row for a model. Empty when none was captured.
    async fn read_all(&self, model_name: &str) -> StorageResult<Vec<FeatureBaselineEntry>>;

    /// Overwrite the baseline rows for a model.
    async fn replace_all(
        &self,
        model_name: &str,
        entries: Vec<FeatureBaselineEntry>,
    ) -> StorageResult<()>;
}

// ---------------------------------------------------------------------------
// FeatureSource — training dataset
// ---------------------------------------------------------------------------

/// One aggregated, model-ready row (one vehicle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Entity the features were aggregated for (e.g. vehicle id)
    pub entity_id: String,
    pub features: FeaturePayload,
    /// Supervised label (warranty claim filed), absent for unsupervised models
    #[serde(default)]
    pub label: Option<bool>,
}

/// Read access to the feature dataset a model is trained on.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    async fn load_dataset(&self, model_name: &str) -> StorageResult<Vec<FeatureRow>>;
}

// ---------------------------------------------------------------------------
// ModelRegistry — versions and aliases
// ---------------------------------------------------------------------------

/// A registered model version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersionRecord {
    pub model_name: String,
    /// Monotonic per model, starting at 1
    pub version: u64,
    /// Held-out validation metric (higher is better). `None` when the run
    /// data for this version is missing.
    pub validation_metric: Option<f64>,
    /// An alias currently pointing at this version, if any
    pub alias: Option<String>,
    /// Training run that produced this version
    pub run_id: String,
    /// Where the fitted artifact lives
    pub artifact_uri: String,
    pub created_at: DateTime<Utc>,
}

/// Input to [`ModelRegistry::register_version`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewModelVersion {
    pub validation_metric: Option<f64>,
    pub run_id: String,
    pub artifact_uri: String,
}

/// Model registry.
///
/// Semantics:
/// - `register_version` allocates `max(version) + 1` for the model.
/// - An alias points at exactly one version of a model at any instant.
/// - `set_alias` and `swap_alias` reassign an alias in a single step, so a
///   reader never observes an alias that was cleared but not yet set.
/// - `swap_alias` is compare-and-swap: it fails with
///   `StorageError::AliasConflict` when the alias no longer points at
///   `expected` (`None` meaning "alias must not exist yet").
/// - Records are never deleted.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Register a new version of a model.
    async fn register_version(
        &self,
        model_name: &str,
        new_version: NewModelVersion,
    ) -> StorageResult<ModelVersionRecord>;

    /// Resolve an alias. `StorageError::AliasNotFound` if it is not set.
    async fn get_version_by_alias(
        &self,
        model_name: &str,
        alias: &str,
    ) -> StorageResult<ModelVersionRecord>;

    /// Stored validation metric of a version.
    async fn get_metric(&self, model_name: &str, version: u64) -> StorageResult<f64>;

    /// Point `alias` at `version` unconditionally.
    async fn set_alias(&self, model_name: &str, alias: &str, version: u64) -> StorageResult<()>;

    /// Point `alias` at `version` only if it currently points at `expected`.
    async fn swap_alias(
        &self,
        model_name: &str,
        alias: &str,
        expected: Option<u64>,
        version: u64,
    ) -> StorageResult<()>;

    /// All versions of a model, ascending by version number.
    async fn search_versions(&self, model_name: &str) -> StorageResult<Vec<ModelVersionRecord>>;
}

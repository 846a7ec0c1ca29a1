//! Row types for the lineguard SurrealDB tables
//!
//! Tables:
//! - prediction_logs: logged inference requests
//! - feature_baseline_stats: per-model, per-feature training statistics
//! - vehicle_features: model-ready training rows
//! - model_versions: registered model versions
//! - model_aliases: alias → version pointers
//!
//! Each row type converts to/from the `storage_traits` type at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_traits::{
    FeatureBaselineEntry, FeaturePayload, FeatureRow, InferenceRecord, ModelVersionRecord,
};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DbInferenceRecord {
    pub payload: FeaturePayload,
    #[serde(with = "surreal_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl From<InferenceRecord> for DbInferenceRecord {
    fn from(record: InferenceRecord) -> Self {
        Self {
            payload: record.payload,
            timestamp: record.timestamp,
        }
    }
}

impl From<DbInferenceRecord> for InferenceRecord {
    fn from(row: DbInferenceRecord) -> Self {
        InferenceRecord::new(row.payload, row.timestamp)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DbBaselineRow {
    pub model_name: String,
    /// Position in the table, preserves write order on read
    pub ordinal: u64,
    pub feature_name: String,
    pub mean_value: f64,
    pub std_value: f64,
}

impl DbBaselineRow {
    pub fn new(model_name: &str, ordinal: u64, entry: FeatureBaselineEntry) -> Self {
        Self {
            model_name: model_name.to_string(),
            ordinal,
            feature_name: entry.feature_name,
            mean_value: entry.mean_value,
            std_value: entry.std_value,
        }
    }

    pub fn into_entry(self) -> FeatureBaselineEntry {
        FeatureBaselineEntry::new(self.feature_name, self.mean_value, self.std_value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DbFeatureRow {
    pub model_name: String,
    pub entity_id: String,
    pub features: FeaturePayload,
    pub label: Option<bool>,
}

impl DbFeatureRow {
    pub fn new(model_name: &str, row: FeatureRow) -> Self {
        Self {
            model_name: model_name.to_string(),
            entity_id: row.entity_id,
            features: row.features,
            label: row.label,
        }
    }

    pub fn into_row(self) -> FeatureRow {
        FeatureRow {
            entity_id: self.entity_id,
            features: self.features,
            label: self.label,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DbModelVersion {
    pub model_name: String,
    pub version: u64,
    pub validation_metric: Option<f64>,
    pub run_id: String,
    pub artifact_uri: String,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl DbModelVersion {
    pub fn into_record(self, alias: Option<String>) -> ModelVersionRecord {
        ModelVersionRecord {
            model_name: self.model_name,
            version: self.version,
            validation_metric: self.validation_metric,
            alias,
            run_id: self.run_id,
            artifact_uri: self.artifact_uri,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DbModelAlias {
    pub model_name: String,
    pub alias: String,
    pub version: u64,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

//! Error types for lineguard-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the database.
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned by the storage traits.
///
/// The `*NotFound` variants are expected outcomes that callers branch on
/// (for example a model with no production alias yet). `Backend` means the
/// store itself could not be reached or rejected the operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("version {version} of model {model_name} not found")]
    VersionNotFound { model_name: String, version: u64 },

    #[error("alias '{alias}' is not set for model {model_name}")]
    AliasNotFound { model_name: String, alias: String },

    #[error("no validation metric recorded for model {model_name} version {version}")]
    MetricNotFound { model_name: String, version: u64 },

    #[error(
        "alias '{alias}' on model {model_name} moved concurrently: expected {expected:?}, found {actual:?}"
    )]
    AliasConflict {
        model_name: String,
        alias: String,
        expected: Option<u64>,
        actual: Option<u64>,
    },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// True for the lookup-miss variants.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::VersionNotFound { .. }
                | StorageError::AliasNotFound { .. }
                | StorageError::MetricNotFound { .. }
        )
    }
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

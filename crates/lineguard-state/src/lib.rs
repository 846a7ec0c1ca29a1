//! Lineguard-State: persistence layer for the lineguard control loop
//!
//! Every store the drift/retrain/promotion loop talks to is reached
//! through a trait defined here, with an in-memory fake for tests and a
//! SurrealDB implementation for deployments.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: atomic alias reassignment, ordered baseline reads, windowed
//! log queries.
//!
//! ## Key Components
//!
//! - `SurrealHandle`: Manages connection and queries
//! - `ModelRegistry`: versions + aliases (`SurrealModelRegistry`)
//! - `InferenceLogStore`, `BaselineTable`, `FeatureSource`: telemetry stores

mod error;
pub mod fakes;
mod handle;
mod migrations;
mod schema;
pub mod storage_traits;
mod surreal_registry;
mod surreal_stores;

pub use error::{StateError, StorageError};
pub use handle::{CloudConfig, SurrealHandle};
pub use storage_traits::{
    BaselineTable, FeatureBaselineEntry, FeaturePayload, FeatureRow, FeatureSource,
    InferenceLogStore, InferenceRecord, ModelRegistry, ModelVersionRecord, NewModelVersion,
    StorageResult, PRODUCTION_ALIAS,
};
pub use surreal_registry::SurrealModelRegistry;
pub use surreal_stores::{SurrealBaselineTable, SurrealFeatureSource, SurrealInferenceLog};

/// Result type for connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;

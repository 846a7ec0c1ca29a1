//! SurrealDB schema initialization
//!
//! Defines every lineguard table with its indexes. Safe to call on each
//! connection: all definitions use `IF NOT EXISTS`.

use crate::error::StateError;
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all lineguard tables in SurrealDB
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing lineguard SurrealDB schema");

    init_telemetry_tables(db).await?;
    init_registry_tables(db).await?;

    info!("lineguard schema initialization complete");
    Ok(())
}

/// `prediction_logs`, `feature_baseline_stats`, `vehicle_features`
async fn init_telemetry_tables(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing telemetry tables");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS prediction_logs SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_prediction_ts ON TABLE prediction_logs COLUMNS timestamp;

        DEFINE TABLE IF NOT EXISTS feature_baseline_stats SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_baseline_model ON TABLE feature_baseline_stats COLUMNS model_name;

        DEFINE TABLE IF NOT EXISTS vehicle_features SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_features_model ON TABLE vehicle_features COLUMNS model_name;
    "#;

    db.query(sql)
        .await
        .and_then(|r| r.check())
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
    Ok(())
}

/// `model_versions`, `model_aliases`
///
/// Constraints:
/// - (`model_name`, `version`) is unique, so two writers racing on the
///   same next version number cannot both succeed.
/// - (`model_name`, `alias`) is unique: one pointer per alias.
async fn init_registry_tables(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing registry tables");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS model_versions SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete NONE;
        DEFINE INDEX IF NOT EXISTS idx_model_version ON TABLE model_versions COLUMNS model_name, version UNIQUE;

        DEFINE TABLE IF NOT EXISTS model_aliases SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete NONE;
        DEFINE INDEX IF NOT EXISTS idx_model_alias ON TABLE model_aliases COLUMNS model_name, alias UNIQUE;
    "#;

    db.query(sql)
        .await
        .and_then(|r| r.check())
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
    Ok(())
}

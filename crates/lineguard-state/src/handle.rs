//! SurrealDB Handle - Connection and Operations
//!
//! Manages the connection and provides the queries behind the storage
//! traits:
//! - prediction log append / window query
//! - baseline read / replace
//! - feature dataset load / insert
//! - model version registration and alias reassignment
//!
//! Supports local (in-memory or surrealkv), URL and cloud (WebSocket)
//! connections.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::Surreal;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::schema::{DbBaselineRow, DbFeatureRow, DbInferenceRecord, DbModelAlias, DbModelVersion};
use crate::storage_traits::{
    FeatureBaselineEntry, FeatureRow, InferenceRecord, ModelVersionRecord, NewModelVersion,
    StorageResult,
};
use crate::Result;

const DEFAULT_NAMESPACE: &str = "lineguard";
const DEFAULT_DATABASE: &str = "main";

/// Configuration for SurrealDB Cloud connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Namespace (default: "lineguard")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create a new cloud configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    /// Load configuration from environment variables
    ///
    /// - SURREALDB_ENDPOINT, SURREALDB_USERNAME, SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "lineguard")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace =
            std::env::var("SURREALDB_NAMESPACE").unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database =
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// SurrealDB connection handle for lineguard
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
    /// Serializes version allocation and alias writes issued by this process.
    /// The unique indexes catch writers in other processes.
    registry_writes: Arc<Mutex<()>>,
}

impl SurrealHandle {
    fn from_db(db: Surreal<Any>) -> Self {
        Self {
            db,
            registry_writes: Arc::new(Mutex::new(())),
        }
    }

    /// Connect to SurrealDB in-memory and set up schema
    #[instrument(skip_all)]
    pub async fn setup_db() -> Result<Self> {
        Self::connect("mem://").await
    }

    /// Connect to any SurrealDB URL (`mem://`, `surrealkv://path`, `ws://...`)
    #[instrument]
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to SurrealDB at {}", url);

        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns(DEFAULT_NAMESPACE)
            .use_db(DEFAULT_DATABASE)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        Ok(Self::from_db(db))
    }

    /// Connect to SurrealDB Cloud
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn setup_cloud(config: CloudConfig) -> Result<Self> {
        info!("Connecting to SurrealDB Cloud (root={})", config.is_root);

        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("Root authentication failed: {}", e)))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| {
                StateError::Connection(format!("Database authentication failed: {}", e))
            })?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        info!("Connected to SurrealDB Cloud");
        Ok(Self::from_db(db))
    }

    /// Connect using environment variables.
    ///
    /// Cloud config first, then SURREALDB_URL, then in-memory.
    #[instrument(skip_all)]
    pub async fn setup_from_env() -> Result<Self> {
        if let Ok(config) = CloudConfig::from_env() {
            info!("Cloud config found, connecting to SurrealDB Cloud");
            return Self::setup_cloud(config).await;
        }

        if let Ok(url) = std::env::var("SURREALDB_URL") {
            return Self::connect(&url).await;
        }

        warn!("No cloud config or SURREALDB_URL found, using in-memory database");
        Self::setup_db().await
    }

    // ========== Prediction Log Operations ==========

    #[instrument(skip_all)]
    pub async fn log_append(&self, record: InferenceRecord) -> StorageResult<()> {
        let _: Option<DbInferenceRecord> = self
            .db
            .create("prediction_logs")
            .content(DbInferenceRecord::from(record))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn log_query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<InferenceRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM prediction_logs \
                 WHERE timestamp >= $start AND timestamp <= $end \
                 ORDER BY timestamp ASC",
            )
            .bind(("start", SurrealDatetime::from(start)))
            .bind(("end", SurrealDatetime::from(end)))
            .await?;

        let rows: Vec<DbInferenceRecord> = result.take(0)?;
        debug!(count = rows.len(), "prediction log window loaded");
        Ok(rows.into_iter().map(InferenceRecord::from).collect())
    }

    // ========== Baseline Operations ==========

    #[instrument(skip(self))]
    pub async fn baseline_read(&self, model_name: &str) -> StorageResult<Vec<FeatureBaselineEntry>> {
        let mut result = self
            .db
            .query("SELECT * FROM feature_baseline_stats WHERE model_name = $model ORDER BY ordinal ASC")
            .bind(("model", model_name.to_string()))
            .await?;

        let rows: Vec<DbBaselineRow> = result.take(0)?;
        Ok(rows.into_iter().map(DbBaselineRow::into_entry).collect())
    }

    /// Delete and re-insert a model's rows inside one transaction.
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    pub async fn baseline_replace(
        &self,
        model_name: &str,
        entries: Vec<FeatureBaselineEntry>,
    ) -> StorageResult<()> {
        let rows: Vec<DbBaselineRow> = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| DbBaselineRow::new(model_name, i as u64, entry))
            .collect();

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE feature_baseline_stats WHERE model_name = $model; \
                 INSERT INTO feature_baseline_stats $rows; \
                 COMMIT TRANSACTION;",
            )
            .bind(("model", model_name.to_string()))
            .bind(("rows", rows))
            .await?
            .check()?;
        Ok(())
    }

    // ========== Feature Dataset Operations ==========

    #[instrument(skip(self))]
    pub async fn features_load(&self, model_name: &str) -> StorageResult<Vec<FeatureRow>> {
        let mut result = self
            .db
            .query("SELECT * FROM vehicle_features WHERE model_name = $model ORDER BY entity_id ASC")
            .bind(("model", model_name.to_string()))
            .await?;

        let rows: Vec<DbFeatureRow> = result.take(0)?;
        Ok(rows.into_iter().map(DbFeatureRow::into_row).collect())
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    pub async fn features_insert(&self, model_name: &str, rows: Vec<FeatureRow>) -> StorageResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let rows: Vec<DbFeatureRow> = rows
            .into_iter()
            .map(|row| DbFeatureRow::new(model_name, row))
            .collect();
        self.db
            .query("INSERT INTO vehicle_features $rows")
            .bind(("rows", rows))
            .await?
            .check()?;
        Ok(())
    }

    // ========== Model Registry Operations ==========

    /// Allocate the next version number and create the version record.
    #[instrument(skip(self, new_version))]
    pub async fn registry_register(
        &self,
        model_name: &str,
        new_version: NewModelVersion,
    ) -> StorageResult<ModelVersionRecord> {
        let _guard = self.registry_writes.lock().await;

        let mut result = self
            .db
            .query(
                "SELECT VALUE version FROM model_versions \
                 WHERE model_name = $model ORDER BY version DESC LIMIT 1",
            )
            .bind(("model", model_name.to_string()))
            .await?;
        let latest: Vec<u64> = result.take(0)?;
        let next = latest.first().copied().unwrap_or(0) + 1;

        let row = DbModelVersion {
            model_name: model_name.to_string(),
            version: next,
            validation_metric: new_version.validation_metric,
            run_id: new_version.run_id,
            artifact_uri: new_version.artifact_uri,
            created_at: Utc::now(),
        };

        let created: Option<DbModelVersion> =
            self.db.create("model_versions").content(row).await?;

        created
            .map(|row| row.into_record(None))
            .ok_or_else(|| StorageError::Backend("failed to create model version".to_string()))
    }

    async fn registry_version(
        &self,
        model_name: &str,
        version: u64,
    ) -> StorageResult<Option<DbModelVersion>> {
        let mut result = self
            .db
            .query("SELECT * FROM model_versions WHERE model_name = $model AND version = $version")
            .bind(("model", model_name.to_string()))
            .bind(("version", version))
            .await?;
        let rows: Vec<DbModelVersion> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    async fn registry_aliases(&self, model_name: &str) -> StorageResult<Vec<DbModelAlias>> {
        let mut result = self
            .db
            .query("SELECT * FROM model_aliases WHERE model_name = $model ORDER BY alias ASC")
            .bind(("model", model_name.to_string()))
            .await?;
        Ok(result.take(0)?)
    }

    async fn registry_alias_target(&self, model_name: &str, alias: &str) -> StorageResult<Option<u64>> {
        Ok(self
            .registry_aliases(model_name)
            .await?
            .into_iter()
            .find(|a| a.alias == alias)
            .map(|a| a.version))
    }

    #[instrument(skip(self))]
    pub async fn registry_by_alias(
        &self,
        model_name: &str,
        alias: &str,
    ) -> StorageResult<ModelVersionRecord> {
        let version = self
            .registry_alias_target(model_name, alias)
            .await?
            .ok_or_else(|| StorageError::AliasNotFound {
                model_name: model_name.to_string(),
                alias: alias.to_string(),
            })?;
        let row = self
            .registry_version(model_name, version)
            .await?
            .ok_or_else(|| StorageError::VersionNotFound {
                model_name: model_name.to_string(),
                version,
            })?;
        Ok(row.into_record(Some(alias.to_string())))
    }

    #[instrument(skip(self))]
    pub async fn registry_metric(&self, model_name: &str, version: u64) -> StorageResult<f64> {
        let row = self
            .registry_version(model_name, version)
            .await?
            .ok_or_else(|| StorageError::VersionNotFound {
                model_name: model_name.to_string(),
                version,
            })?;
        row.validation_metric
            .ok_or_else(|| StorageError::MetricNotFound {
                model_name: model_name.to_string(),
                version,
            })
    }

    async fn ensure_version(&self, model_name: &str, version: u64) -> StorageResult<()> {
        match self.registry_version(model_name, version).await? {
            Some(_) => Ok(()),
            None => Err(StorageError::VersionNotFound {
                model_name: model_name.to_string(),
                version,
            }),
        }
    }

    /// Conditional single-statement UPDATE; returns whether a row matched.
    async fn alias_update(
        &self,
        model_name: &str,
        alias: &str,
        expected: Option<u64>,
        version: u64,
    ) -> StorageResult<bool> {
        let sql = if expected.is_some() {
            "UPDATE model_aliases SET version = $version, updated_at = time::now() \
             WHERE model_name = $model AND alias = $alias AND version = $expected RETURN AFTER"
        } else {
            "UPDATE model_aliases SET version = $version, updated_at = time::now() \
             WHERE model_name = $model AND alias = $alias RETURN AFTER"
        };
        let mut result = self
            .db
            .query(sql)
            .bind(("model", model_name.to_string()))
            .bind(("alias", alias.to_string()))
            .bind(("version", version))
            .bind(("expected", expected))
            .await?;
        let updated: Vec<DbModelAlias> = result.take(0)?;
        Ok(!updated.is_empty())
    }

    async fn alias_create(&self, model_name: &str, alias: &str, version: u64) -> StorageResult<()> {
        let row = DbModelAlias {
            model_name: model_name.to_string(),
            alias: alias.to_string(),
            version,
            updated_at: Utc::now(),
        };
        let _: Option<DbModelAlias> = self.db.create("model_aliases").content(row).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn registry_set_alias(
        &self,
        model_name: &str,
        alias: &str,
        version: u64,
    ) -> StorageResult<()> {
        let _guard = self.registry_writes.lock().await;
        self.ensure_version(model_name, version).await?;

        if self.alias_update(model_name, alias, None, version).await? {
            return Ok(());
        }
        self.alias_create(model_name, alias, version).await
    }

    #[instrument(skip(self))]
    pub async fn registry_swap_alias(
        &self,
        model_name: &str,
        alias: &str,
        expected: Option<u64>,
        version: u64,
    ) -> StorageResult<()> {
        let _guard = self.registry_writes.lock().await;
        self.ensure_version(model_name, version).await?;

        let conflict = |actual: Option<u64>| StorageError::AliasConflict {
            model_name: model_name.to_string(),
            alias: alias.to_string(),
            expected,
            actual,
        };

        match expected {
            Some(_) => {
                if self.alias_update(model_name, alias, expected, version).await? {
                    return Ok(());
                }
                let actual = self.registry_alias_target(model_name, alias).await?;
                Err(conflict(actual))
            }
            None => match self.alias_create(model_name, alias, version).await {
                Ok(()) => Ok(()),
                // The unique index rejects the create when the alias exists.
                Err(err) => match self.registry_alias_target(model_name, alias).await? {
                    Some(actual) => Err(conflict(Some(actual))),
                    None => Err(err),
                },
            },
        }
    }

    #[instrument(skip(self))]
    pub async fn registry_versions(&self, model_name: &str) -> StorageResult<Vec<ModelVersionRecord>> {
        let mut result = self
            .db
            .query("SELECT * FROM model_versions WHERE model_name = $model ORDER BY version ASC")
            .bind(("model", model_name.to_string()))
            .await?;
        let rows: Vec<DbModelVersion> = result.take(0)?;
        let aliases = self.registry_aliases(model_name).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let alias = aliases
                    .iter()
                    .find(|a| a.version == row.version)
                    .map(|a| a.alias.clone());
                row.into_record(alias)
            })
            .collect())
    }
}

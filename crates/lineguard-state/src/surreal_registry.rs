use std::sync::Arc;

use async_trait::async_trait;

use crate::storage_traits::{ModelRegistry, ModelVersionRecord, NewModelVersion, StorageResult};
use crate::SurrealHandle;

/// SurrealDB-backed implementation of the ModelRegistry trait.
#[derive(Clone)]
pub struct SurrealModelRegistry {
    handle: Arc<SurrealHandle>,
}

impl SurrealModelRegistry {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl ModelRegistry for SurrealModelRegistry {
    async fn register_version(
        &self,
        model_name: &str,
        new_version: NewModelVersion,
    ) -> StorageResult<ModelVersionRecord> {
        self.handle.registry_register(model_name, new_version).await
    }

    async fn get_version_by_alias(
        &self,
        model_name: &str,
        alias: &str,
    ) -> StorageResult<ModelVersionRecord> {
        self.handle.registry_by_alias(model_name, alias).await
    }

    async fn get_metric(&self, model_name: &str, version: u64) -> StorageResult<f64> {
        self.handle.registry_metric(model_name, version).await
    }

    async fn set_alias(&self, model_name: &str, alias: &str, version: u64) -> StorageResult<()> {
        self.handle
            .registry_set_alias(model_name, alias, version)
            .await
    }

    async fn swap_alias(
        &self,
        model_name: &str,
        alias: &str,
        expected: Option<u64>,
        version: u64,
    ) -> StorageResult<()> {
        self.handle
            .registry_swap_alias(model_name, alias, expected, version)
            .await
    }

    async fn search_versions(&self, model_name: &str) -> StorageResult<Vec<ModelVersionRecord>> {
        self.handle.registry_versions(model_name).await
    }
}

//! PromotionGate decisions, alias atomicity and conflict handling.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lineguard_core::{PromotionError, PromotionGate, MAX_SWAP_ATTEMPTS};
use lineguard_state::fakes::MemoryModelRegistry;
use lineguard_state::{
    ModelRegistry, ModelVersionRecord, NewModelVersion, StorageError, StorageResult,
    PRODUCTION_ALIAS,
};

const MODEL: &str = "WarrantyModel";

async fn register(registry: &dyn ModelRegistry, metric: Option<f64>) -> u64 {
    registry
        .register_version(
            MODEL,
            NewModelVersion {
                validation_metric: metric,
                run_id: format!("run-{metric:?}"),
                artifact_uri: "memory://model".to_string(),
            },
        )
        .await
        .unwrap()
        .version
}

async fn production(registry: &dyn ModelRegistry) -> Option<u64> {
    registry
        .get_version_by_alias(MODEL, PRODUCTION_ALIAS)
        .await
        .ok()
        .map(|r| r.version)
}

#[tokio::test]
async fn bootstrap_promotes_unconditionally() {
    let registry = Arc::new(MemoryModelRegistry::new());
    let gate = PromotionGate::new(registry.clone(), PRODUCTION_ALIAS);
    let v1 = register(registry.as_ref(), Some(0.81)).await;

    let result = gate.maybe_promote(MODEL, v1, 0.81).await.unwrap();

    assert!(result.promoted);
    assert_eq!(result.previous_version, None);
    assert_eq!(result.production_metric, None);
    assert_eq!(result.attempts, 1);
    assert_eq!(production(registry.as_ref()).await, Some(v1));
}

#[tokio::test]
async fn worse_metric_leaves_alias_untouched() {
    let registry = Arc::new(MemoryModelRegistry::new());
    let gate = PromotionGate::new(registry.clone(), PRODUCTION_ALIAS);
    let v1 = register(registry.as_ref(), Some(0.85)).await;
    registry.set_alias(MODEL, PRODUCTION_ALIAS, v1).await.unwrap();
    let v2 = register(registry.as_ref(), Some(0.83)).await;

    let result = gate.maybe_promote(MODEL, v2, 0.83).await.unwrap();

    assert!(!result.promoted);
    assert_eq!(result.production_metric, Some(0.85));
    assert_eq!(result.attempts, 0);
    assert_eq!(production(registry.as_ref()).await, Some(v1));
}

#[tokio::test]
async fn tie_does_not_promote() {
    let registry = Arc::new(MemoryModelRegistry::new());
    let gate = PromotionGate::new(registry.clone(), PRODUCTION_ALIAS);
    let v1 = register(registry.as_ref(), Some(0.80)).await;
    registry.set_alias(MODEL, PRODUCTION_ALIAS, v1).await.unwrap();
    let v2 = register(registry.as_ref(), Some(0.80)).await;

    let result = gate.maybe_promote(MODEL, v2, 0.80).await.unwrap();

    assert!(!result.promoted);
    assert_eq!(production(registry.as_ref()).await, Some(v1));
}

#[tokio::test]
async fn missing_metric_is_metric_unavailable() {
    let registry = Arc::new(MemoryModelRegistry::new());
    let gate = PromotionGate::new(registry.clone(), PRODUCTION_ALIAS);
    let v1 = register(registry.as_ref(), None).await;
    registry.set_alias(MODEL, PRODUCTION_ALIAS, v1).await.unwrap();
    let v2 = register(registry.as_ref(), Some(0.99)).await;

    let err = gate.maybe_promote(MODEL, v2, 0.99).await.unwrap_err();

    assert!(matches!(err, PromotionError::MetricUnavailable(_)));
    assert_eq!(production(registry.as_ref()).await, Some(v1));
}

#[tokio::test]
async fn non_finite_candidate_is_never_promoted() {
    let registry = Arc::new(MemoryModelRegistry::new());
    let gate = PromotionGate::new(registry.clone(), PRODUCTION_ALIAS);
    let v1 = register(registry.as_ref(), Some(f64::NAN)).await;

    let result = gate.maybe_promote(MODEL, v1, f64::NAN).await.unwrap();

    assert!(!result.promoted);
    assert_eq!(production(registry.as_ref()).await, None);
}

#[tokio::test]
async fn production_metric_never_decreases() {
    let registry = Arc::new(MemoryModelRegistry::new());
    let gate = PromotionGate::new(registry.clone(), PRODUCTION_ALIAS);
    let metrics = [0.70, 0.65, 0.72, 0.72, 0.71, 0.90, 0.10, 0.91, 0.905];

    let mut last = f64::NEG_INFINITY;
    for metric in metrics {
        let version = register(registry.as_ref(), Some(metric)).await;
        gate.maybe_promote(MODEL, version, metric).await.unwrap();

        let current = production(registry.as_ref()).await.unwrap();
        let current_metric = registry.get_metric(MODEL, current).await.unwrap();
        assert!(current_metric >= last, "{current_metric} < {last}");
        last = current_metric;
    }
    assert_eq!(last, 0.91);
}

#[tokio::test]
async fn concurrent_promotions_settle_on_best() {
    let registry = Arc::new(MemoryModelRegistry::new());
    let gate = Arc::new(PromotionGate::new(registry.clone(), PRODUCTION_ALIAS));
    let v1 = register(registry.as_ref(), Some(0.80)).await;
    registry.set_alias(MODEL, PRODUCTION_ALIAS, v1).await.unwrap();
    let v2 = register(registry.as_ref(), Some(0.90)).await;
    let v3 = register(registry.as_ref(), Some(0.85)).await;

    let a = {
        let gate = gate.clone();
        tokio::spawn(async move { gate.maybe_promote(MODEL, v2, 0.90).await })
    };
    let b = {
        let gate = gate.clone();
        tokio::spawn(async move { gate.maybe_promote(MODEL, v3, 0.85).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(production(registry.as_ref()).await, Some(v2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_a_production_gap() {
    let registry = Arc::new(MemoryModelRegistry::new());
    let gate = Arc::new(PromotionGate::new(registry.clone(), PRODUCTION_ALIAS));
    let v1 = register(registry.as_ref(), Some(0.5)).await;
    gate.maybe_promote(MODEL, v1, 0.5).await.unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0..3 {
        let registry = registry.clone();
        let done = done.clone();
        readers.push(tokio::spawn(async move {
            let mut reads = 0u64;
            while !done.load(Ordering::SeqCst) {
                registry
                    .get_version_by_alias(MODEL, PRODUCTION_ALIAS)
                    .await
                    .expect("production alias disappeared");
                reads += 1;
                tokio::task::yield_now().await;
            }
            reads
        }));
    }

    for i in 1..=50 {
        let metric = 0.5 + i as f64 / 100.0;
        let version = register(registry.as_ref(), Some(metric)).await;
        assert!(gate.maybe_promote(MODEL, version, metric).await.unwrap().promoted);
    }
    done.store(true, Ordering::SeqCst);
    for reader in readers {
        reader.await.unwrap();
    }
}

/// Registry whose production alias is moved by another writer right
/// before the first swap lands.
struct RacingRegistry {
    inner: MemoryModelRegistry,
    raced: AtomicBool,
    intruder: u64,
    swaps: AtomicUsize,
}

#[async_trait]
impl ModelRegistry for RacingRegistry {
    async fn register_version(
        &self,
        model_name: &str,
        new_version: NewModelVersion,
    ) -> StorageResult<ModelVersionRecord> {
        self.inner.register_version(model_name, new_version).await
    }

    async fn get_version_by_alias(
        &self,
        model_name: &str,
        alias: &str,
    ) -> StorageResult<ModelVersionRecord> {
        self.inner.get_version_by_alias(model_name, alias).await
    }

    async fn get_metric(&self, model_name: &str, version: u64) -> StorageResult<f64> {
        self.inner.get_metric(model_name, version).await
    }

    async fn set_alias(&self, model_name: &str, alias: &str, version: u64) -> StorageResult<()> {
        self.inner.set_alias(model_name, alias, version).await
    }

    async fn swap_alias(
        &self,
        model_name: &str,
        alias: &str,
        expected: Option<u64>,
        version: u64,
    ) -> StorageResult<()> {
        self.swaps.fetch_add(1, Ordering::SeqCst);
        if !self.raced.swap(true, Ordering::SeqCst) {
            self.inner.set_alias(model_name, alias, self.intruder).await?;
        }
        self.inner
            .swap_alias(model_name, alias, expected, version)
            .await
    }

    async fn search_versions(&self, model_name: &str) -> StorageResult<Vec<ModelVersionRecord>> {
        self.inner.search_versions(model_name).await
    }
}

async fn racing_registry(intruder_metric: f64) -> (Arc<RacingRegistry>, u64, u64) {
    let inner = MemoryModelRegistry::new();
    let v1 = register(&inner, Some(0.80)).await;
    inner.set_alias(MODEL, PRODUCTION_ALIAS, v1).await.unwrap();
    let intruder = register(&inner, Some(intruder_metric)).await;
    let candidate = register(&inner, Some(0.90)).await;
    let registry = Arc::new(RacingRegistry {
        inner,
        raced: AtomicBool::new(false),
        intruder,
        swaps: AtomicUsize::new(0),
    });
    (registry, intruder, candidate)
}

#[tokio::test]
async fn conflict_is_retried_with_fresh_comparison() {
    let (registry, intruder, candidate) = racing_registry(0.85).await;
    let gate = PromotionGate::new(registry.clone(), PRODUCTION_ALIAS);

    let result = gate.maybe_promote(MODEL, candidate, 0.90).await.unwrap();

    assert!(result.promoted);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.previous_version, Some(intruder));
    assert_eq!(result.production_metric, Some(0.85));
    assert_eq!(production(registry.as_ref()).await, Some(candidate));
}

#[tokio::test]
async fn conflict_retry_respects_a_better_intruder() {
    let (registry, intruder, candidate) = racing_registry(0.95).await;
    let gate = PromotionGate::new(registry.clone(), PRODUCTION_ALIAS);

    let result = gate.maybe_promote(MODEL, candidate, 0.90).await.unwrap();

    assert!(!result.promoted);
    assert_eq!(registry.swaps.load(Ordering::SeqCst), 1);
    assert_eq!(production(registry.as_ref()).await, Some(intruder));
}

/// Every swap conflicts.
struct ContendedRegistry {
    inner: MemoryModelRegistry,
}

#[async_trait]
impl ModelRegistry for ContendedRegistry {
    async fn register_version(
        &self,
        model_name: &str,
        new_version: NewModelVersion,
    ) -> StorageResult<ModelVersionRecord> {
        self.inner.register_version(model_name, new_version).await
    }

    async fn get_version_by_alias(
        &self,
        model_name: &str,
        alias: &str,
    ) -> StorageResult<ModelVersionRecord> {
        self.inner.get_version_by_alias(model_name, alias).await
    }

    async fn get_metric(&self, model_name: &str, version: u64) -> StorageResult<f64> {
        self.inner.get_metric(model_name, version).await
    }

    async fn set_alias(&self, model_name: &str, alias: &str, version: u64) -> StorageResult<()> {
        self.inner.set_alias(model_name, alias, version).await
    }

    async fn swap_alias(
        &self,
        model_name: &str,
        alias: &str,
        expected: Option<u64>,
        _version: u64,
    ) -> StorageResult<()> {
        Err(StorageError::AliasConflict {
            model_name: model_name.to_string(),
            alias: alias.to_string(),
            expected,
            actual: Some(999),
        })
    }

    async fn search_versions(&self, model_name: &str) -> StorageResult<Vec<ModelVersionRecord>> {
        self.inner.search_versions(model_name).await
    }
}

#[tokio::test]
async fn persistent_conflict_is_surfaced() {
    let registry = Arc::new(ContendedRegistry {
        inner: MemoryModelRegistry::new(),
    });
    let v1 = register(&registry.inner, Some(0.9)).await;
    let gate = PromotionGate::new(registry.clone(), PRODUCTION_ALIAS);

    let err = gate.maybe_promote(MODEL, v1, 0.9).await.unwrap_err();

    assert_eq!(
        err,
        PromotionError::WriteConflict {
            model_name: MODEL.to_string(),
            alias: PRODUCTION_ALIAS.to_string(),
            attempts: MAX_SWAP_ATTEMPTS,
        }
    );
    assert_eq!(production(registry.as_ref()).await, None);
}

/// Alias resolves, metric reads fail at the backend.
struct MetricStoreDown {
    inner: MemoryModelRegistry,
}

#[async_trait]
impl ModelRegistry for MetricStoreDown {
    async fn register_version(
        &self,
        model_name: &str,
        new_version: NewModelVersion,
    ) -> StorageResult<ModelVersionRecord> {
        self.inner.register_version(model_name, new_version).await
    }

    async fn get_version_by_alias(
        &self,
        model_name: &str,
        alias: &str,
    ) -> StorageResult<ModelVersionRecord> {
        self.inner.get_version_by_alias(model_name, alias).await
    }

    async fn get_metric(&self, _: &str, _: u64) -> StorageResult<f64> {
        Err(StorageError::Backend("connection reset".to_string()))
    }

    async fn set_alias(&self, model_name: &str, alias: &str, version: u64) -> StorageResult<()> {
        self.inner.set_alias(model_name, alias, version).await
    }

    async fn swap_alias(
        &self,
        model_name: &str,
        alias: &str,
        expected: Option<u64>,
        version: u64,
    ) -> StorageResult<()> {
        self.inner
            .swap_alias(model_name, alias, expected, version)
            .await
    }

    async fn search_versions(&self, model_name: &str) -> StorageResult<Vec<ModelVersionRecord>> {
        self.inner.search_versions(model_name).await
    }
}

#[tokio::test]
async fn backend_failure_on_metric_read_is_unavailable() {
    let registry = Arc::new(MetricStoreDown {
        inner: MemoryModelRegistry::new(),
    });
    let v1 = register(&registry.inner, Some(0.8)).await;
    registry.set_alias(MODEL, PRODUCTION_ALIAS, v1).await.unwrap();
    let v2 = register(&registry.inner, Some(0.9)).await;
    let gate = PromotionGate::new(registry.clone(), PRODUCTION_ALIAS);

    let err = gate.maybe_promote(MODEL, v2, 0.9).await.unwrap_err();

    assert_eq!(
        err,
        PromotionError::Unavailable(StorageError::Backend("connection reset".to_string()))
    );
    assert_eq!(production(registry.as_ref()).await, Some(v1));
}

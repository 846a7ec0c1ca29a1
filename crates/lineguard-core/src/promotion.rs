//! PromotionGate: moves the production alias to a new version only when
//! it beats the current production metric.
//!
//! The gate holds a per-model lock across "read current metric → compare
//! → reassign", and the reassignment itself is a compare-and-swap on the
//! registry. A conflicting writer outside this process makes the swap fail;
//! the gate then re-reads and compares once more before giving up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use lineguard_state::{ModelRegistry, StorageError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::domain::PromotionError;
use crate::metrics::METRICS;
use crate::obs;

/// Compare-and-swap attempts before reporting a write conflict.
pub const MAX_SWAP_ATTEMPTS: u32 = 2;

/// Outcome of [`PromotionGate::maybe_promote`].
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionResult {
    pub promoted: bool,
    /// Production version before the decision (`None` on bootstrap).
    pub previous_version: Option<u64>,
    /// Production metric the candidate was compared against.
    pub production_metric: Option<f64>,
    /// Compare-and-swap attempts made (0 when nothing was written).
    pub attempts: u32,
}

/// Current production version and its stored metric.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Production {
    version: u64,
    metric: f64,
}

pub struct PromotionGate {
    registry: Arc<dyn ModelRegistry>,
    alias: String,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PromotionGate {
    pub fn new(registry: Arc<dyn ModelRegistry>, alias: impl Into<String>) -> Self {
        Self {
            registry,
            alias: alias.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn model_lock(&self, model_name: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(model_name.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Promote `new_version` if `new_metric` is strictly greater than the
    /// current production metric, or if no production version exists yet.
    pub async fn maybe_promote(
        &self,
        model_name: &str,
        new_version: u64,
        new_metric: f64,
    ) -> Result<PromotionResult, PromotionError> {
        let lock = self.model_lock(model_name);
        let _held = lock.lock().await;

        let mut attempts = 0;
        loop {
            let current = self.current_production(model_name).await?;
            let production_metric = current.map(|c| c.metric);
            let previous_version = current.map(|c| c.version);

            let improves = new_metric.is_finite()
                && production_metric.map_or(true, |current| new_metric > current);
            if !improves || previous_version == Some(new_version) {
                METRICS.inc_promotions_rejected();
                obs::emit_promotion_decided(
                    model_name,
                    new_version,
                    new_metric,
                    production_metric,
                    false,
                );
                return Ok(PromotionResult {
                    promoted: false,
                    previous_version,
                    production_metric,
                    attempts,
                });
            }

            attempts += 1;
            match self
                .registry
                .swap_alias(model_name, &self.alias, previous_version, new_version)
                .await
            {
                Ok(()) => {
                    METRICS.inc_promotions();
                    obs::emit_promotion_decided(
                        model_name,
                        new_version,
                        new_metric,
                        production_metric,
                        true,
                    );
                    return Ok(PromotionResult {
                        promoted: true,
                        previous_version,
                        production_metric,
                        attempts,
                    });
                }
                Err(StorageError::AliasConflict { actual, .. }) => {
                    METRICS.inc_write_conflicts();
                    warn!(
                        model_name = %model_name,
                        alias = %self.alias,
                        expected = ?previous_version,
                        actual = ?actual,
                        attempt = attempts,
                        "production alias changed during promotion"
                    );
                    if attempts >= MAX_SWAP_ATTEMPTS {
                        return Err(PromotionError::WriteConflict {
                            model_name: model_name.to_string(),
                            alias: self.alias.clone(),
                            attempts,
                        });
                    }
                }
                Err(e) => return Err(PromotionError::Unavailable(e)),
            }
        }
    }

    /// `None` when the alias is unset (bootstrap).
    async fn current_production(
        &self,
        model_name: &str,
    ) -> Result<Option<Production>, PromotionError> {
        let record = match self
            .registry
            .get_version_by_alias(model_name, &self.alias)
            .await
        {
            Ok(record) => record,
            Err(StorageError::AliasNotFound { .. }) => {
                debug!(model_name = %model_name, alias = %self.alias, "no production version yet");
                return Ok(None);
            }
            Err(e) => return Err(read_failure(e)),
        };

        let metric = self
            .registry
            .get_metric(model_name, record.version)
            .await
            .map_err(read_failure)?;
        if !metric.is_finite() {
            return Err(PromotionError::MetricUnavailable(format!(
                "version {} has non-finite metric {metric}",
                record.version
            )));
        }

        Ok(Some(Production {
            version: record.version,
            metric,
        }))
    }
}

/// Missing run data blocks promotion; an unreachable registry aborts the cycle.
fn read_failure(err: StorageError) -> PromotionError {
    if err.is_not_found() {
        PromotionError::MetricUnavailable(err.to_string())
    } else {
        PromotionError::Unavailable(err)
    }
}

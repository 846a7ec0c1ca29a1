//! RetrainOrchestrator: sequences one training run after drift.

use std::sync::Arc;
use std::time::Instant;

use lineguard_state::{BaselineTable, FeatureBaselineEntry, FeatureSource, ModelRegistry, NewModelVersion};
use tracing::{info, warn};

use crate::domain::{baseline_from_rows, DriftEvidence, RetrainError};
use crate::obs;
use crate::trainer::Trainer;

/// A trained and registered model version.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedArtifact {
    pub metric: f64,
    /// Registry version number of the new model.
    pub version_handle: u64,
    pub run_id: String,
    pub artifact_uri: String,
    /// Feature statistics of the training data. Installed as the model's
    /// baseline only once this version serves production.
    pub baseline: Vec<FeatureBaselineEntry>,
}

pub struct RetrainOrchestrator {
    features: Arc<dyn FeatureSource>,
    trainer: Arc<dyn Trainer>,
    registry: Arc<dyn ModelRegistry>,
    baselines: Arc<dyn BaselineTable>,
}

impl RetrainOrchestrator {
    pub fn new(
        features: Arc<dyn FeatureSource>,
        trainer: Arc<dyn Trainer>,
        registry: Arc<dyn ModelRegistry>,
        baselines: Arc<dyn BaselineTable>,
    ) -> Self {
        Self {
            features,
            trainer,
            registry,
            baselines,
        }
    }

    /// Train a new version of `model_name`.
    ///
    /// Requires the evidence of a drifted verdict. On success the new
    /// version is registered without any alias. The baseline table is not
    /// touched; see [`RetrainOrchestrator::install_baseline`].
    pub async fn retrain(
        &self,
        model_name: &str,
        evidence: &DriftEvidence,
    ) -> Result<TrainedArtifact, RetrainError> {
        let started = Instant::now();
        info!(
            model_name = %model_name,
            triggering = ?evidence.triggering_features(),
            "retraining"
        );

        let result = self.train_and_register(model_name).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(artifact) => obs::emit_training_finished(
                model_name,
                Some(artifact.version_handle),
                Some(artifact.metric),
                duration_ms,
            ),
            Err(e) => {
                warn!(model_name = %model_name, error = %e, "training run failed");
                obs::emit_training_finished(model_name, None, None, duration_ms);
            }
        }
        result
    }

    async fn train_and_register(&self, model_name: &str) -> Result<TrainedArtifact, RetrainError> {
        let dataset = self
            .features
            .load_dataset(model_name)
            .await
            .map_err(RetrainError::Unavailable)?;
        if dataset.is_empty() {
            return Err(RetrainError::TrainingFailed("empty dataset".to_string()));
        }

        let output = self
            .trainer
            .train(model_name, &dataset)
            .await
            .map_err(|e| RetrainError::TrainingFailed(e.to_string()))?;
        if !output.metric.is_finite() {
            return Err(RetrainError::TrainingFailed(format!(
                "trainer reported non-finite metric {}",
                output.metric
            )));
        }

        let run_id = output
            .run_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let record = self
            .registry
            .register_version(
                model_name,
                NewModelVersion {
                    validation_metric: Some(output.metric),
                    run_id: run_id.clone(),
                    artifact_uri: output.artifact_uri.clone(),
                },
            )
            .await
            .map_err(RetrainError::Unavailable)?;

        let baseline = match output.baseline {
            Some(entries) => finite_entries(entries),
            None => baseline_from_rows(&dataset),
        };

        Ok(TrainedArtifact {
            metric: output.metric,
            version_handle: record.version,
            run_id,
            artifact_uri: output.artifact_uri,
            baseline,
        })
    }

    /// Make `artifact`'s training statistics the baseline of `model_name`.
    ///
    /// Called after the artifact's version was promoted, so drift keeps
    /// being measured against whatever serves production.
    pub async fn install_baseline(
        &self,
        model_name: &str,
        artifact: &TrainedArtifact,
    ) -> Result<(), RetrainError> {
        self.baselines
            .replace_all(model_name, artifact.baseline.clone())
            .await
            .map_err(RetrainError::Unavailable)?;
        info!(
            model_name = %model_name,
            version = artifact.version_handle,
            features = artifact.baseline.len(),
            "baseline replaced"
        );
        Ok(())
    }
}

fn finite_entries(entries: Vec<FeatureBaselineEntry>) -> Vec<FeatureBaselineEntry> {
    entries
        .into_iter()
        .filter(|e| {
            let keep = e.mean_value.is_finite() && e.std_value.is_finite();
            if !keep {
                warn!(feature = %e.feature_name, "dropping non-finite baseline entry");
            }
            keep
        })
        .collect()
}

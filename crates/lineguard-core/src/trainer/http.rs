//! Trainer backed by a remote training service.

use std::time::Duration;

use async_trait::async_trait;
use lineguard_state::FeatureRow;
use tracing::debug;

use super::{Trainer, TrainerError, TrainingOutput, TrainingRequest};

/// POSTs `{"model_name": .., "rows": [..]}` to `url` and decodes the JSON
/// [`TrainingOutput`] response.
#[derive(Debug, Clone)]
pub struct HttpTrainer {
    url: String,
    http_client: reqwest::Client,
}

impl HttpTrainer {
    pub fn new(url: String, timeout_secs: u64) -> Result<Self, TrainerError> {
        if url.trim().is_empty() {
            return Err(TrainerError::InvalidConfig(
                "trainer url is empty".to_string(),
            ));
        }
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("lineguard/", env!("CARGO_PKG_VERSION")));
        if timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }
        Ok(Self {
            url,
            http_client: builder.build()?,
        })
    }
}

#[async_trait]
impl Trainer for HttpTrainer {
    async fn train(
        &self,
        model_name: &str,
        dataset: &[FeatureRow],
    ) -> Result<TrainingOutput, TrainerError> {
        debug!(url = %self.url, rows = dataset.len(), "posting training request");
        let response = self
            .http_client
            .post(&self.url)
            .json(&TrainingRequest {
                model_name,
                rows: dataset,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrainerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| TrainerError::MalformedOutput(e.to_string()))
    }
}

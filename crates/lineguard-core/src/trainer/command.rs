//! Trainer that runs a local command.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use lineguard_state::FeatureRow;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{parse_output, Trainer, TrainerError, TrainingOutput, TrainingRequest};

/// Runs `command` once per training request.
///
/// The request (`{"model_name": .., "rows": [..]}`) is written to stdin as
/// JSON. The last non-empty stdout line must be a JSON [`TrainingOutput`].
/// A `timeout_secs` of 0 disables the timeout.
#[derive(Debug, Clone)]
pub struct CommandTrainer {
    command: Vec<String>,
    timeout_secs: u64,
}

impl CommandTrainer {
    pub fn new(command: Vec<String>, timeout_secs: u64) -> Result<Self, TrainerError> {
        if command.is_empty() {
            return Err(TrainerError::InvalidConfig(
                "trainer command is empty".to_string(),
            ));
        }
        Ok(Self {
            command,
            timeout_secs,
        })
    }
}

#[async_trait]
impl Trainer for CommandTrainer {
    async fn train(
        &self,
        model_name: &str,
        dataset: &[FeatureRow],
    ) -> Result<TrainingOutput, TrainerError> {
        let input = serde_json::to_vec(&TrainingRequest {
            model_name,
            rows: dataset,
        })?;

        let exe = &self.command[0];
        let args = &self.command[1..];
        debug!(command = %exe, rows = dataset.len(), "starting training command");

        let mut child = Command::new(exe)
            .args(args)
            .env("LINEGUARD_MODEL", model_name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // stdin is written while stdout drains
        let writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                let written = stdin.write_all(&input).await;
                drop(stdin);
                written
            })
        });

        let output = if self.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(self.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| TrainerError::Timeout {
                secs: self.timeout_secs,
            })??
        } else {
            child.wait_with_output().await?
        };

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                // the trainer may exit without reading its input
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(TrainerError::Spawn(e)),
                Err(e) => return Err(TrainerError::Spawn(std::io::Error::other(e))),
            }
        }

        if !output.status.success() {
            return Err(TrainerError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}

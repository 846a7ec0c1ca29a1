//! Interval scheduler: one cycle per configured model per tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::ControlConfig;
use crate::control_loop::ControlLoop;
use crate::domain::CycleError;
use crate::metrics::METRICS;
use crate::obs;

pub struct Scheduler {
    control: Arc<ControlLoop>,
    models: Vec<String>,
    tick: Duration,
}

impl Scheduler {
    pub fn new(control: Arc<ControlLoop>, models: Vec<String>, tick: Duration) -> Self {
        Self {
            control,
            models,
            tick,
        }
    }

    pub fn from_config(control: Arc<ControlLoop>, config: &ControlConfig) -> Self {
        Self::new(control, config.models.clone(), config.tick())
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Spawn a cycle for every model that is not already running.
    /// Returns the number of cycles spawned.
    pub fn tick_once(&self, tasks: &mut JoinSet<()>) -> usize {
        let mut spawned = 0;
        for model_name in &self.models {
            if self.control.is_in_flight(model_name) {
                skip(model_name);
                continue;
            }
            let control = Arc::clone(&self.control);
            let model_name = model_name.clone();
            tasks.spawn(async move {
                match control.run_cycle(&model_name).await {
                    Ok(report) => debug!(
                        model_name = %model_name,
                        promoted = report.promoted,
                        "cycle complete"
                    ),
                    Err(CycleError::CycleInFlight { .. }) => skip(&model_name),
                    // already reported by the control loop
                    Err(CycleError::CollaboratorUnavailable(_)) => {}
                }
            });
            spawned += 1;
        }
        spawned
    }

    /// Tick until `shutdown` resolves, then wait for running cycles.
    ///
    /// The first tick fires immediately.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        info!(models = ?self.models, tick_secs = self.tick.as_secs(), "scheduler started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick_once(&mut tasks);
                    METRICS.flush();
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "cycle task panicked");
                    }
                }
            }
        }

        info!(running = tasks.len(), "scheduler stopping, waiting for running cycles");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "cycle task panicked");
            }
        }
        METRICS.flush();
    }
}

fn skip(model_name: &str) {
    METRICS.inc_cycles_skipped();
    obs::emit_cycle_skipped(model_name, "previous cycle still running");
}

//! Control-loop configuration.
//!
//! Loaded from an optional TOML file, then overridden by `LINEGUARD_*`
//! environment variables, then validated:
//!
//! ```toml
//! threshold_mean = 0.3
//! threshold_std = 0.5
//! window_hours = 24
//! tick_secs = 3600
//! production_alias = "production"
//! models = ["WarrantyModel", "AnomalyModel"]
//!
//! [trainer]
//! kind = "command"
//! command = ["python3", "train.py"]
//! timeout_secs = 1800
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DriftThresholds;

pub const DEFAULT_WINDOW_HOURS: u64 = 24;
/// Longest accepted window (ten years).
pub const MAX_WINDOW_HOURS: u64 = 24 * 365 * 10;
pub const DEFAULT_TICK_SECS: u64 = 3600;
pub const DEFAULT_TRAINER_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_MODELS: [&str; 2] = ["WarrantyModel", "AnomalyModel"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How training runs are executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainerConfig {
    /// Local command; dataset on stdin, JSON result on the last stdout line.
    Command {
        command: Vec<String>,
        #[serde(default = "default_trainer_timeout")]
        timeout_secs: u64,
    },
    /// Remote training service.
    Http {
        url: String,
        #[serde(default = "default_trainer_timeout")]
        timeout_secs: u64,
    },
}

fn default_trainer_timeout() -> u64 {
    DEFAULT_TRAINER_TIMEOUT_SECS
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig::Command {
            command: vec!["lineguard-train".to_string()],
            timeout_secs: DEFAULT_TRAINER_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Relative mean change above which a feature has drifted.
    pub threshold_mean: f64,
    /// Relative std change above which a feature has drifted.
    pub threshold_std: f64,
    /// Length of the inference-log window, ending at the tick.
    pub window_hours: u64,
    /// Scheduler interval.
    pub tick_secs: u64,
    pub production_alias: String,
    /// Models the daemon runs cycles for.
    pub models: Vec<String>,
    pub trainer: TrainerConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        let thresholds = DriftThresholds::default();
        Self {
            threshold_mean: thresholds.mean,
            threshold_std: thresholds.std,
            window_hours: DEFAULT_WINDOW_HOURS,
            tick_secs: DEFAULT_TICK_SECS,
            production_alias: lineguard_state::PRODUCTION_ALIAS.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            trainer: TrainerConfig::default(),
        }
    }
}

impl ControlConfig {
    /// Load from `path` (defaults when `None`), apply the process
    /// environment and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `LINEGUARD_*` overrides looked up through `lookup`.
    ///
    /// - LINEGUARD_THRESHOLD_MEAN, LINEGUARD_THRESHOLD_STD
    /// - LINEGUARD_WINDOW_HOURS, LINEGUARD_TICK_SECS
    /// - LINEGUARD_PRODUCTION_ALIAS
    /// - LINEGUARD_MODELS (comma separated)
    /// - LINEGUARD_TRAINER_URL (switches to the HTTP trainer)
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LINEGUARD_THRESHOLD_MEAN") {
            self.threshold_mean = parse_env("LINEGUARD_THRESHOLD_MEAN", &v)?;
        }
        if let Some(v) = lookup("LINEGUARD_THRESHOLD_STD") {
            self.threshold_std = parse_env("LINEGUARD_THRESHOLD_STD", &v)?;
        }
        if let Some(v) = lookup("LINEGUARD_WINDOW_HOURS") {
            self.window_hours = parse_env("LINEGUARD_WINDOW_HOURS", &v)?;
        }
        if let Some(v) = lookup("LINEGUARD_TICK_SECS") {
            self.tick_secs = parse_env("LINEGUARD_TICK_SECS", &v)?;
        }
        if let Some(v) = lookup("LINEGUARD_PRODUCTION_ALIAS") {
            self.production_alias = v.trim().to_string();
        }
        if let Some(v) = lookup("LINEGUARD_MODELS") {
            self.models = v
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(url) = lookup("LINEGUARD_TRAINER_URL") {
            let timeout_secs = match &self.trainer {
                TrainerConfig::Http { timeout_secs, .. } => *timeout_secs,
                TrainerConfig::Command { timeout_secs, .. } => *timeout_secs,
            };
            self.trainer = TrainerConfig::Http { url, timeout_secs };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("threshold_mean", self.threshold_mean),
            ("threshold_std", self.threshold_std),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if self.window_hours == 0 || self.window_hours > MAX_WINDOW_HOURS {
            return Err(ConfigError::Invalid(format!(
                "window_hours must be in 1..={MAX_WINDOW_HOURS}, got {}",
                self.window_hours
            )));
        }
        if self.tick_secs == 0 {
            return Err(ConfigError::Invalid("tick_secs must be > 0".to_string()));
        }
        if self.production_alias.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "production_alias must not be empty".to_string(),
            ));
        }
        if self.models.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one model must be configured".to_string(),
            ));
        }
        match &self.trainer {
            TrainerConfig::Command { command, .. } if command.is_empty() => Err(
                ConfigError::Invalid("trainer command must not be empty".to_string()),
            ),
            TrainerConfig::Http { url, .. } if url.trim().is_empty() => Err(
                ConfigError::Invalid("trainer url must not be empty".to_string()),
            ),
            _ => Ok(()),
        }
    }

    pub fn thresholds(&self) -> DriftThresholds {
        DriftThresholds {
            mean: self.threshold_mean,
            std: self.threshold_std,
        }
    }

    /// Inference-log window length.
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.window_hours.min(MAX_WINDOW_HOURS) as i64)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

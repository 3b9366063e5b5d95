use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn default_identifier() -> String {
    "bitrule".to_string()
}

fn default_mutation_rate() -> f64 {
    0.05
}

fn default_pool_size() -> usize {
    8
}

/// Parameters a worker reads at the start of every sweep.
///
/// A running worker never sees a half-written config: reloads build a fresh
/// value and swap the shared reference wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Label attached to log lines and pool entries.
    #[serde(default = "default_identifier")]
    pub identifier: String,
    /// Base mutation probability per bit, in [0, 1].
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Size of each worker's private subpopulation.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Exploration pressure. Zero disables the crossover step.
    #[serde(default)]
    pub stress_level: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            identifier: default_identifier(),
            mutation_rate: default_mutation_rate(),
            pool_size: default_pool_size(),
            stress_level: 0.0,
        }
    }
}

impl WorkerConfig {
    /// Parse config from a TOML string, apply `BITRULE_*` overrides and validate.
    ///
    /// Empty or whitespace-only input is rejected: a file caught mid-write
    /// must not turn into an all-defaults config.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        if toml_str.trim().is_empty() {
            return Err(EngineError::Config("config file is empty".into()));
        }
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Override fields from environment variables, when set and parseable.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_opt("BITRULE_IDENTIFIER") {
            self.identifier = v;
        }
        if let Some(rate) = env_opt("BITRULE_MUTATION_RATE").and_then(|v| v.parse().ok()) {
            self.mutation_rate = rate;
        }
        if let Some(size) = env_opt("BITRULE_POOL_SIZE").and_then(|v| v.parse().ok()) {
            self.pool_size = size;
        }
        if let Some(stress) = env_opt("BITRULE_STRESS_LEVEL").and_then(|v| v.parse().ok()) {
            self.stress_level = stress;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(EngineError::Config(format!(
                "mutation_rate must be within [0, 1], got {}",
                self.mutation_rate
            )));
        }
        if self.pool_size == 0 {
            return Err(EngineError::Config("pool_size must be at least 1".into()));
        }
        if !self.stress_level.is_finite() || self.stress_level < 0.0 {
            return Err(EngineError::Config(format!(
                "stress_level must be a non-negative number, got {}",
                self.stress_level
            )));
        }
        if self.identifier.trim().is_empty() {
            return Err(EngineError::Config("identifier must not be empty".into()));
        }
        Ok(())
    }

    /// Print a one-line summary for startup and reload logs.
    pub fn log_summary(&self) {
        tracing::info!(
            identifier = %self.identifier,
            mutation_rate = self.mutation_rate,
            pool_size = self.pool_size,
            stress_level = self.stress_level,
            "worker config"
        );
    }
}

use std::path::PathBuf;
use std::time::Duration;

use bitrule_core::{EngineError, Result};

/// Upper bound on concurrent workers.
pub const MAX_WORKERS: usize = 16;

/// Run-level settings fixed for the lifetime of a [`Supervisor`](super::Supervisor).
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Number of workers; clamped to `1..=MAX_WORKERS`.
    pub workers: usize,
    /// Master seed. `None` seeds from the clock.
    pub seed: Option<u32>,
    /// Bits per rule, identical for every worker.
    pub rule_length: usize,
    /// Result pool capacity.
    pub pool_capacity: usize,
    /// Pause between worker sweeps.
    pub tick: Duration,
    /// How long shutdown waits for units to stop.
    pub shutdown_timeout: Duration,
    /// Config file to watch for hot reload.
    pub config_path: Option<PathBuf>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            seed: None,
            rule_length: 6,
            pool_capacity: 100,
            tick: Duration::from_millis(100),
            shutdown_timeout: Duration::from_secs(5),
            config_path: None,
        }
    }
}

impl SupervisorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rule_length == 0 {
            return Err(EngineError::Config("rule_length must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(EngineError::Config("at least one worker is required".into()));
        }
        if self.tick.is_zero() {
            return Err(EngineError::Config("tick must be greater than zero".into()));
        }
        Ok(())
    }

    /// Worker count after applying the [`MAX_WORKERS`] bound.
    pub fn resolved_workers(&self) -> usize {
        self.workers.clamp(1, MAX_WORKERS)
    }
}

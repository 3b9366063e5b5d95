use std::path::PathBuf;

use thiserror::Error;

/// Every failure the discovery engine can report.
///
/// Recoverable conditions (`CapacityExceeded`, `PoolClosed`) are absorbed by
/// the unit that hits them. Structural ones (`LengthMismatch`,
/// `AllocationFailure`) stop only the owning unit.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("allocation failure: {0}")]
    AllocationFailure(String),

    #[error("rule length mismatch: {left} != {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("result pool full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    #[error("result pool is closed")]
    PoolClosed,

    #[error("cannot watch {}: {reason}", path.display())]
    WatchFailure { path: PathBuf, reason: String },

    #[error("units did not stop in time: {}", units.join(", "))]
    ShutdownTimeout { units: Vec<String> },

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl EngineError {
    /// True for conditions a worker absorbs and logs instead of stopping.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::CapacityExceeded { .. } | EngineError::PoolClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_conditions_are_recoverable() {
        assert!(EngineError::CapacityExceeded { capacity: 3 }.is_recoverable());
        assert!(EngineError::PoolClosed.is_recoverable());
        assert!(!EngineError::LengthMismatch { left: 4, right: 6 }.is_recoverable());
        assert!(!EngineError::AllocationFailure("oom".into()).is_recoverable());
    }

    #[test]
    fn shutdown_timeout_lists_units() {
        let err = EngineError::ShutdownTimeout {
            units: vec!["worker-0".into(), "config-watcher".into()],
        };
        assert_eq!(
            err.to_string(),
            "units did not stop in time: worker-0, config-watcher"
        );
    }
}

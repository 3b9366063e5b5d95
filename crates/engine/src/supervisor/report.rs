use serde::Serialize;
use uuid::Uuid;

use bitrule_core::EngineError;

use crate::pool::Discovery;
use crate::watcher::WatcherReport;
use crate::worker::WorkerReport;

/// A unit that ended with an error instead of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub unit: String,
    pub error: String,
}

/// Everything the supervisor learned while shutting down.
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    pub run_id: Uuid,
    pub workers: Vec<WorkerReport>,
    pub watcher: Option<WatcherReport>,
    pub failed: Vec<UnitFailure>,
    /// Units still running when the shutdown timeout expired.
    pub timed_out: Vec<String>,
    /// Pool contents, in append order, after the pool was closed.
    pub discoveries: Vec<Discovery>,
    /// Appends the pool refused over the whole run.
    pub rejected: u64,
}

impl ShutdownReport {
    /// True when every unit stopped in time without error.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.timed_out.is_empty()
    }

    /// The timeout as an error, if any unit missed the deadline.
    pub fn timeout_error(&self) -> Option<EngineError> {
        if self.timed_out.is_empty() {
            None
        } else {
            Some(EngineError::ShutdownTimeout {
                units: self.timed_out.clone(),
            })
        }
    }

    pub fn total_published(&self) -> u64 {
        self.workers.iter().map(|w| w.published).sum()
    }
}

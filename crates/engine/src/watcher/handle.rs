use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use bitrule_core::WorkerConfig;

/// Shared reference to the current [`WorkerConfig`].
///
/// Readers get a whole `Arc<WorkerConfig>`; writers replace the `Arc`. A
/// reader therefore sees either the old config or the new one, never a mix.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<RwLock<Arc<WorkerConfig>>>,
    version: Arc<AtomicU64>,
}

impl ConfigHandle {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn load(&self) -> Arc<WorkerConfig> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Publish a new config. Returns the new version number.
    pub fn store(&self, config: WorkerConfig) -> u64 {
        let next = Arc::new(config);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = next;
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Number of times the config has been replaced.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

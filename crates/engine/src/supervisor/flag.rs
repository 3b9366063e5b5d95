use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide run flag.
///
/// Starts `true`; [`trigger`](Self::trigger) clears it exactly once. Loops
/// poll [`is_running`](Self::is_running) at their iteration boundaries.
#[derive(Debug, Clone)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear the flag. Returns true only for the call that actually
    /// cleared it.
    pub fn trigger(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Lifecycle of a long-running unit (worker or config watcher).
///
/// Transitions only move forward:
/// `Initializing -> Running -> Draining -> Stopped`. A unit that fails during
/// initialization jumps straight to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Initializing = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
}

impl UnitState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => UnitState::Initializing,
            1 => UnitState::Running,
            2 => UnitState::Draining,
            _ => UnitState::Stopped,
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitState::Initializing => "initializing",
            UnitState::Running => "running",
            UnitState::Draining => "draining",
            UnitState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Shared, lock-free view of a unit's current state.
///
/// The unit writes it; the supervisor reads it.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(UnitState::Initializing as u8)))
    }

    pub fn get(&self) -> UnitState {
        UnitState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move forward to `next`. Backward transitions are ignored.
    pub fn advance(&self, next: UnitState) {
        self.0.fetch_max(next as u8, Ordering::AcqRel);
    }

    pub fn is_stopped(&self) -> bool {
        self.get() == UnitState::Stopped
    }

    /// Guard that marks the unit `Stopped` when dropped, including during a
    /// panic unwind.
    pub fn stop_on_drop(&self) -> StopGuard {
        StopGuard(self.clone())
    }
}

pub struct StopGuard(StateCell);

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.0.advance(UnitState::Stopped);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_moves_forward() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), UnitState::Initializing);
        cell.advance(UnitState::Running);
        cell.advance(UnitState::Initializing);
        assert_eq!(cell.get(), UnitState::Running);
        cell.advance(UnitState::Stopped);
        cell.advance(UnitState::Draining);
        assert!(cell.is_stopped());
    }

    #[test]
    fn guard_stops_on_panic() {
        let cell = StateCell::new();
        let inner = cell.clone();
        let result = std::thread::spawn(move || {
            let _guard = inner.stop_on_drop();
            inner.advance(UnitState::Running);
            panic!("boom");
        })
        .join();
        assert!(result.is_err());
        assert!(cell.is_stopped());
    }

    #[test]
    fn clones_share_state() {
        let cell = StateCell::new();
        let observer = cell.clone();
        cell.advance(UnitState::Draining);
        assert_eq!(observer.get(), UnitState::Draining);
        assert_eq!(observer.get().to_string(), "draining");
    }
}

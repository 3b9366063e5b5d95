//! Search workers and the lifecycle state they share with the supervisor.

mod core;
mod state;

#[cfg(test)]
mod tests;

pub use self::core::{Worker, WorkerReport};
pub use self::state::{StateCell, StopGuard, UnitState};

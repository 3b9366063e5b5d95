//! Startup and coordinated shutdown of workers and the config watcher.

mod config;
mod core;
mod flag;
mod report;


pub use self::config::{SupervisorConfig, MAX_WORKERS};
pub use self::core::Supervisor;
pub use self::flag::RunningFlag;
pub use self::report::{ShutdownReport, UnitFailure};

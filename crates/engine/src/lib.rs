//! Concurrent rule-discovery engine.
//!
//! Workers evolve short bit-vector rules with a seeded MT19937 stream,
//! publish every mutant into a bounded shared [`ResultPool`], and reset the
//! individuals that fail the [`FitnessOracle`]. A [`ConfigWatcher`] hot-swaps
//! the [`WorkerConfig`] when its file changes, and the [`Supervisor`] owns the
//! running flag that every loop polls for cooperative shutdown.

pub mod fitness;
pub mod ops;
pub mod pool;
pub mod prng;
pub mod rate;
pub mod supervisor;
pub mod watcher;
pub mod worker;

pub use bitrule_core::{EngineError, Fitness, FitnessRecord, Result, Rule, WorkerConfig};
pub use fitness::{FitnessOracle, ParityOracle, TargetOracle};
pub use pool::{Discovery, ResultPool};
pub use prng::Prng;
pub use rate::{ConstantLoad, LoadProbe, RateController};
pub use supervisor::{RunningFlag, ShutdownReport, Supervisor, SupervisorConfig, MAX_WORKERS};
pub use watcher::{ConfigHandle, ConfigSource, ConfigWatcher, TomlFileSource};
pub use worker::{UnitState, Worker, WorkerReport};

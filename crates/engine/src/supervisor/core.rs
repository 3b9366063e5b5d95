//! Core [`Supervisor`] struct: spawns units, owns the running flag, and
//! waits for every unit on shutdown.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use bitrule_core::{EngineError, Result, WorkerConfig};

use crate::fitness::{FitnessOracle, ParityOracle};
use crate::pool::ResultPool;
use crate::prng::Prng;
use crate::rate::{ConstantLoad, LoadProbe};
use crate::watcher::{ConfigHandle, ConfigSource, ConfigWatcher, TomlFileSource, WatcherReport, WATCHER_NAME};
use crate::worker::{StateCell, UnitState, Worker, WorkerReport};

use super::config::SupervisorConfig;
use super::flag::RunningFlag;
use super::report::{ShutdownReport, UnitFailure};

enum UnitJoin {
    Worker(JoinHandle<Result<WorkerReport>>),
    Watcher(JoinHandle<Result<WatcherReport>>),
}

struct Unit {
    name: String,
    state: StateCell,
    join: UnitJoin,
}

/// Owns the run: the [`RunningFlag`], the [`ResultPool`], the shared
/// [`ConfigHandle`] and every spawned unit.
///
/// Each worker gets its own [`Prng`] seeded from a master stream, so a run
/// with a fixed seed hands every worker the same seed every time.
pub struct Supervisor {
    run_id: Uuid,
    config: SupervisorConfig,
    running: RunningFlag,
    pool: Arc<ResultPool>,
    handle: ConfigHandle,
    oracle: Arc<dyn FitnessOracle>,
    load: Arc<dyn LoadProbe>,
    source: Option<Arc<dyn ConfigSource>>,
    units: Vec<Unit>,
    started: bool,
}

impl Supervisor {
    /// Create a supervisor. Nothing runs until [`start`](Self::start).
    pub fn new(config: SupervisorConfig, worker_config: WorkerConfig) -> Self {
        let source = config
            .config_path
            .as_ref()
            .map(|p| Arc::new(TomlFileSource::new(p)) as Arc<dyn ConfigSource>);
        Self {
            run_id: Uuid::new_v4(),
            pool: Arc::new(ResultPool::new(config.pool_capacity)),
            config,
            running: RunningFlag::new(),
            handle: ConfigHandle::new(worker_config),
            oracle: Arc::new(ParityOracle),
            load: Arc::new(ConstantLoad::default()),
            source,
            units: Vec::new(),
            started: false,
        }
    }

    /// Fitness predicate shared by all workers (default: [`ParityOracle`]).
    pub fn oracle(mut self, oracle: Arc<dyn FitnessOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Load signal shared by all workers (default: constant zero).
    pub fn load_probe(mut self, probe: Arc<dyn LoadProbe>) -> Self {
        self.load = probe;
        self
    }

    /// Watch a custom config source instead of `config_path`.
    pub fn config_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn running_flag(&self) -> RunningFlag {
        self.running.clone()
    }

    pub fn pool(&self) -> Arc<ResultPool> {
        Arc::clone(&self.pool)
    }

    pub fn config_handle(&self) -> ConfigHandle {
        self.handle.clone()
    }

    /// Current state of every spawned unit, workers first.
    pub fn unit_states(&self) -> Vec<(String, UnitState)> {
        self.units
            .iter()
            .map(|u| (u.name.clone(), u.state.get()))
            .collect()
    }

    pub fn all_stopped(&self) -> bool {
        self.units.iter().all(|u| u.state.is_stopped())
    }

    /// Seed the per-worker generators and spawn all workers and, when a
    /// config source is set, the config watcher.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(EngineError::Config("supervisor already started".into()));
        }
        self.config.validate()?;
        self.handle.load().validate()?;

        let workers = self.config.resolved_workers();
        if workers != self.config.workers {
            warn!(requested = self.config.workers, using = workers, "worker count clamped");
        }

        let seed = self.config.seed.unwrap_or_else(|| Prng::from_time().next_u32());
        let mut master = Prng::new(seed);

        info!(
            run_id = %self.run_id,
            workers,
            seed,
            rule_length = self.config.rule_length,
            pool_capacity = self.config.pool_capacity,
            oracle = self.oracle.name(),
            "supervisor starting"
        );
        self.handle.load().log_summary();
        self.started = true;

        for i in 0..workers {
            let name = format!("worker-{i}");
            let worker = Worker::new(
                name.clone(),
                Prng::new(master.next_u32()),
                Arc::clone(&self.pool),
                self.handle.clone(),
                Arc::clone(&self.oracle),
                self.running.clone(),
            )
            .rule_length(self.config.rule_length)
            .tick(self.config.tick)
            .load_probe(Arc::clone(&self.load));
            let state = worker.state();

            match worker.spawn() {
                Ok(join) => self.units.push(Unit {
                    name,
                    state,
                    join: UnitJoin::Worker(join),
                }),
                Err(e) => error!(worker = %name, error = %e, "failed to spawn worker"),
            }
        }

        if let Some(source) = &self.source {
            let watcher = ConfigWatcher::new(Arc::clone(source), self.handle.clone(), self.running.clone())
                .poll_interval(self.config.tick);
            let state = watcher.state();
            match watcher.spawn() {
                Ok(join) => self.units.push(Unit {
                    name: WATCHER_NAME.to_string(),
                    state,
                    join: UnitJoin::Watcher(join),
                }),
                Err(e) => error!(unit = WATCHER_NAME, error = %e, "failed to spawn config watcher"),
            }
        }

        if !self.units.iter().any(|u| matches!(u.join, UnitJoin::Worker(_))) {
            self.running.trigger();
            return Err(EngineError::AllocationFailure("no worker could be spawned".into()));
        }

        info!(run_id = %self.run_id, units = self.units.len(), "supervisor started");
        Ok(())
    }

    /// Clear the running flag, wait up to `shutdown_timeout` for every unit
    /// to stop, then close the pool.
    ///
    /// Units that miss the deadline are listed in
    /// [`ShutdownReport::timed_out`] and left detached; closing the pool
    /// guarantees they can no longer publish.
    pub fn shutdown(mut self) -> ShutdownReport {
        if self.running.trigger() {
            info!(run_id = %self.run_id, "shutdown requested");
        } else {
            debug!(run_id = %self.run_id, "shutdown already triggered");
        }

        let deadline = Instant::now() + self.config.shutdown_timeout;
        let poll = self.config.tick.min(Duration::from_millis(10)).max(Duration::from_millis(1));
        while !self.all_stopped() && Instant::now() < deadline {
            thread::sleep(poll);
        }

        let mut report = ShutdownReport {
            run_id: self.run_id,
            workers: Vec::new(),
            watcher: None,
            failed: Vec::new(),
            timed_out: Vec::new(),
            discoveries: Vec::new(),
            rejected: 0,
        };

        for unit in std::mem::take(&mut self.units) {
            if !unit.state.is_stopped() {
                report.timed_out.push(unit.name);
                continue;
            }
            match unit.join {
                UnitJoin::Worker(join) => match join.join() {
                    Ok(Ok(r)) => report.workers.push(r),
                    Ok(Err(e)) => report.failed.push(failure(&unit.name, &e)),
                    Err(_) => report.failed.push(panicked(&unit.name)),
                },
                UnitJoin::Watcher(join) => match join.join() {
                    Ok(Ok(r)) => report.watcher = Some(r),
                    Ok(Err(e)) => report.failed.push(failure(&unit.name, &e)),
                    Err(_) => report.failed.push(panicked(&unit.name)),
                },
            }
        }

        if let Err(e) = self.pool.close() {
            error!(error = %e, "failed to close result pool");
        }
        match self.pool.snapshot() {
            Ok(entries) => report.discoveries = entries,
            Err(e) => error!(error = %e, "failed to read result pool"),
        }
        report.rejected = self.pool.rejected();

        if let Some(e) = report.timeout_error() {
            error!(run_id = %self.run_id, error = %e, "shutdown timed out, detaching remaining units");
        }
        info!(
            run_id = %self.run_id,
            stopped = report.workers.len(),
            failed = report.failed.len(),
            discoveries = report.discoveries.len(),
            rejected = report.rejected,
            "shutdown complete"
        );
        report
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.running.trigger();
    }
}

fn failure(unit: &str, e: &EngineError) -> UnitFailure {
    UnitFailure {
        unit: unit.to_string(),
        error: e.to_string(),
    }
}

fn panicked(unit: &str) -> UnitFailure {
    error!(unit, "unit panicked");
    UnitFailure {
        unit: unit.to_string(),
        error: "panicked".to_string(),
    }
}

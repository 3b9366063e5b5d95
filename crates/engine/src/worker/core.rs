//! Core [`Worker`] struct: private subpopulation, sweep loop and lifecycle.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use bitrule_core::{EngineError, Result, Rule, WorkerConfig};

use crate::fitness::{self, FitnessOracle};
use crate::ops;
use crate::pool::ResultPool;
use crate::prng::Prng;
use crate::rate::{ConstantLoad, LoadProbe, RateController};
use crate::supervisor::RunningFlag;
use crate::watcher::ConfigHandle;

use super::state::{StateCell, UnitState};

/// Counters a worker hands back to the supervisor when it stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub name: String,
    pub sweeps: u64,
    /// Mutants accepted by the result pool.
    pub published: u64,
    /// Mutants the pool refused (full or closed).
    pub rejected: u64,
    pub passes: u64,
    /// Slots replaced by a fresh random rule after a fitness failure.
    pub resets: u64,
    /// Config swaps applied.
    pub reloads: u64,
}

/// One search unit.
///
/// Owns its [`Prng`] and subpopulation outright; the only state it shares is
/// the [`ResultPool`] (behind the pool's lock), the [`ConfigHandle`] (read
/// once per sweep) and the [`RunningFlag`].
pub struct Worker {
    name: String,
    prng: Prng,
    rule_length: usize,
    tick: Duration,
    pool: Arc<ResultPool>,
    config: ConfigHandle,
    oracle: Arc<dyn FitnessOracle>,
    load: Arc<dyn LoadProbe>,
    rate: RateController,
    running: RunningFlag,
    state: StateCell,
}

impl Worker {
    pub fn new(
        name: impl Into<String>,
        prng: Prng,
        pool: Arc<ResultPool>,
        config: ConfigHandle,
        oracle: Arc<dyn FitnessOracle>,
        running: RunningFlag,
    ) -> Self {
        Self {
            name: name.into(),
            prng,
            rule_length: 6,
            tick: Duration::from_millis(100),
            pool,
            config,
            oracle,
            load: Arc::new(ConstantLoad::default()),
            rate: RateController::default(),
            running,
            state: StateCell::new(),
        }
    }

    /// Bits per rule (default: 6).
    pub fn rule_length(mut self, len: usize) -> Self {
        self.rule_length = len;
        self
    }

    /// Pause between sweeps (default: 100ms).
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn load_probe(mut self, probe: Arc<dyn LoadProbe>) -> Self {
        self.load = probe;
        self
    }

    pub fn rate_controller(mut self, rate: RateController) -> Self {
        self.rate = rate;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> StateCell {
        self.state.clone()
    }

    /// Run the worker on a dedicated, named thread.
    pub fn spawn(self) -> Result<JoinHandle<Result<WorkerReport>>> {
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let _stopped = self.state.stop_on_drop();
                self.run()
            })?;
        Ok(handle)
    }

    /// Run until the running flag is cleared or a structural error occurs.
    /// The worker always ends in [`UnitState::Stopped`].
    pub fn run(mut self) -> Result<WorkerReport> {
        let result = self.run_inner();
        if let Err(e) = &result {
            error!(worker = %self.name, error = %e, "worker stopped on error");
        }
        self.state.advance(UnitState::Stopped);
        result
    }

    fn run_inner(&mut self) -> Result<WorkerReport> {
        let started = Instant::now();
        let mut config = self.config.load();
        let mut population = self.initialize(config.pool_size)?;

        self.state.advance(UnitState::Running);
        info!(
            worker = %self.name,
            pool_size = population.len(),
            rule_length = self.rule_length,
            "worker running"
        );

        let mut report = WorkerReport {
            name: self.name.clone(),
            ..WorkerReport::default()
        };

        while self.running.is_running() {
            let current = self.config.load();
            if !Arc::ptr_eq(&current, &config) {
                self.apply_config(&current, &mut population);
                config = current;
                report.reloads += 1;
            }

            let elapsed = started.elapsed().as_secs_f64();
            let rate = self
                .rate
                .adjust(config.mutation_rate, elapsed, self.load.load_factor())
                .clamp(0.0, 1.0);

            self.sweep(&mut population, &config, rate, &mut report)?;
            report.sweeps += 1;

            thread::sleep(self.tick);
        }

        self.state.advance(UnitState::Draining);
        drop(population);
        info!(
            worker = %self.name,
            sweeps = report.sweeps,
            published = report.published,
            rejected = report.rejected,
            resets = report.resets,
            "worker drained"
        );
        Ok(report)
    }

    /// Build the initial subpopulation of `size` random rules.
    fn initialize(&mut self, size: usize) -> Result<Vec<Rule>> {
        let mut population = Vec::new();
        self.grow(&mut population, size)?;
        Ok(population)
    }

    fn grow(&mut self, population: &mut Vec<Rule>, size: usize) -> Result<()> {
        let extra = size.saturating_sub(population.len());
        population.try_reserve_exact(extra).map_err(|e| {
            EngineError::AllocationFailure(format!("subpopulation of {size} rules: {e}"))
        })?;
        while population.len() < size {
            let rule = ops::random_rule(self.rule_length, &mut self.prng)
                .map_err(|e| EngineError::AllocationFailure(e.to_string()))?;
            population.push(rule);
        }
        Ok(())
    }

    /// Adopt a reloaded config: resize the subpopulation when `pool_size`
    /// changed. A resize that cannot allocate keeps the current size.
    fn apply_config(&mut self, config: &WorkerConfig, population: &mut Vec<Rule>) {
        let before = population.len();
        if config.pool_size < before {
            population.truncate(config.pool_size);
        } else if let Err(e) = self.grow(population, config.pool_size) {
            warn!(worker = %self.name, error = %e, "cannot grow subpopulation, keeping current size");
        }
        info!(
            worker = %self.name,
            identifier = %config.identifier,
            mutation_rate = config.mutation_rate,
            pool_size = population.len(),
            previous_pool_size = before,
            "applied reloaded config"
        );
    }

    /// One pass over the subpopulation: mutate, publish, evaluate, and reset
    /// failing slots.
    fn sweep(
        &mut self,
        population: &mut [Rule],
        config: &WorkerConfig,
        rate: f64,
        report: &mut WorkerReport,
    ) -> Result<()> {
        let explore = config.stress_level > 0.0 && population.len() > 1;

        for slot in 0..population.len() {
            let parent = if explore {
                let peer = self.prng.below(population.len());
                ops::crossover_with_exploration(
                    &population[slot],
                    &population[peer],
                    config.stress_level,
                    &mut self.prng,
                )?
            } else {
                population[slot].clone()
            };
            let mutant = ops::mutate(&parent, rate, &mut self.prng);

            match self.pool.try_append(mutant.clone(), &self.name) {
                Ok(_) => report.published += 1,
                Err(e) if e.is_recoverable() => {
                    if report.rejected == 0 {
                        warn!(worker = %self.name, error = %e, "result pool rejected rule");
                    } else {
                        debug!(worker = %self.name, error = %e, "result pool rejected rule");
                    }
                    report.rejected += 1;
                }
                Err(e) => return Err(e),
            }

            let record = fitness::assess(self.oracle.as_ref(), &mutant);
            if record.fitness().is_pass() {
                report.passes += 1;
                population[slot] = mutant;
            } else {
                let fresh = ops::random_rule(self.rule_length, &mut self.prng)?;
                debug!(
                    worker = %self.name,
                    slot,
                    failed = %record.rule(),
                    replacement = %fresh,
                    "fitness failure, slot reset"
                );
                population[slot] = fresh;
                report.resets += 1;
            }
        }
        Ok(())
    }
}

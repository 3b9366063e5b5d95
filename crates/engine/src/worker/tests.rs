//! Tests for the worker loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bitrule_core::{EngineError, Fitness, Rule, WorkerConfig};

use super::*;
use crate::fitness::FitnessOracle;
use crate::pool::ResultPool;
use crate::prng::Prng;
use crate::rate::{ConstantLoad, RateController};
use crate::supervisor::RunningFlag;
use crate::watcher::ConfigHandle;

fn config(pool_size: usize, mutation_rate: f64) -> WorkerConfig {
    WorkerConfig {
        identifier: "test".into(),
        mutation_rate,
        pool_size,
        stress_level: 0.0,
    }
}

fn worker(
    pool: &Arc<ResultPool>,
    handle: &ConfigHandle,
    oracle: Arc<dyn FitnessOracle>,
    running: &RunningFlag,
) -> Worker {
    Worker::new(
        "worker-test",
        Prng::new(42),
        Arc::clone(pool),
        handle.clone(),
        oracle,
        running.clone(),
    )
    .rule_length(6)
    .tick(Duration::from_millis(5))
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Oracle that counts calls and always returns the same verdict.
struct Counting {
    calls: AtomicUsize,
    verdict: Fitness,
}

impl FitnessOracle for Counting {
    fn evaluate(&self, _rule: &Rule) -> Fitness {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict
    }
}

#[test]
fn publishes_every_mutant_until_pool_is_full() {
    let pool = Arc::new(ResultPool::new(10));
    let handle = ConfigHandle::new(config(4, 0.1));
    let running = RunningFlag::new();
    let oracle = Arc::new(Counting {
        calls: AtomicUsize::new(0),
        verdict: Fitness::Pass,
    });

    let w = worker(&pool, &handle, oracle.clone(), &running);
    let state = w.state();
    let join = w.spawn().unwrap();

    assert!(wait_until(Duration::from_secs(5), || pool.is_full()));
    assert!(wait_until(Duration::from_secs(5), || oracle.calls.load(Ordering::SeqCst) >= 16));
    running.trigger();
    let report = join.join().unwrap().unwrap();

    assert_eq!(state.get(), UnitState::Stopped);
    assert_eq!(pool.len(), 10);
    assert_eq!(report.published, 10);
    assert!(report.rejected >= 1);
    assert_eq!(report.resets, 0);
    assert_eq!(report.published + report.rejected, report.passes);
    assert_eq!(report.sweeps * 4, report.passes);
}

#[test]
fn failing_rules_are_reset_not_removed() {
    let pool = Arc::new(ResultPool::new(100_000));
    let handle = ConfigHandle::new(config(5, 0.0));
    let running = RunningFlag::new();
    let reject_all = Arc::new(|_: &Rule| Fitness::Fail);

    let w = worker(&pool, &handle, reject_all, &running);
    let join = w.spawn().unwrap();
    assert!(wait_until(Duration::from_secs(5), || pool.len() >= 15));
    running.trigger();
    let report = join.join().unwrap().unwrap();

    assert_eq!(report.passes, 0);
    assert_eq!(report.resets, report.sweeps * 5);
    assert_eq!(report.published, report.sweeps * 5);
}

#[test]
fn allocation_failure_stops_only_that_worker() {
    let pool = Arc::new(ResultPool::new(100));
    let running = RunningFlag::new();
    let pass = Arc::new(|_: &Rule| Fitness::Pass);

    let broken_handle = ConfigHandle::new(config(usize::MAX, 0.1));
    let broken = worker(&pool, &broken_handle, pass.clone(), &running);
    let broken_state = broken.state();

    let healthy_handle = ConfigHandle::new(config(3, 0.1));
    let healthy = worker(&pool, &healthy_handle, pass, &running);
    let healthy_state = healthy.state();

    let broken_join = broken.spawn().unwrap();
    let healthy_join = healthy.spawn().unwrap();

    let err = broken_join.join().unwrap().unwrap_err();
    assert!(matches!(err, EngineError::AllocationFailure(_)));
    assert_eq!(broken_state.get(), UnitState::Stopped);

    assert!(wait_until(Duration::from_secs(5), || pool.len() >= 3));
    assert_eq!(healthy_state.get(), UnitState::Running);
    assert!(running.is_running());

    running.trigger();
    assert!(healthy_join.join().unwrap().is_ok());
}

#[test]
fn zero_length_rules_fail_initialization() {
    let pool = Arc::new(ResultPool::new(10));
    let handle = ConfigHandle::new(config(2, 0.1));
    let running = RunningFlag::new();
    let w = worker(&pool, &handle, Arc::new(|_: &Rule| Fitness::Pass), &running).rule_length(0);

    let err = w.run().unwrap_err();
    assert!(matches!(err, EngineError::AllocationFailure(_)));
    assert!(pool.is_empty());
}

#[test]
fn reload_resizes_subpopulation() {
    let pool = Arc::new(ResultPool::new(10_000));
    let handle = ConfigHandle::new(config(2, 0.0));
    let running = RunningFlag::new();
    let oracle = Arc::new(Counting {
        calls: AtomicUsize::new(0),
        verdict: Fitness::Pass,
    });

    let w = worker(&pool, &handle, oracle, &running);
    let join = w.spawn().unwrap();
    assert!(wait_until(Duration::from_secs(5), || pool.len() >= 4));

    handle.store(config(7, 0.0));
    let before = pool.len();
    assert!(wait_until(Duration::from_secs(5), || pool.len() >= before + 21));
    running.trigger();
    let report = join.join().unwrap().unwrap();

    assert_eq!(report.reloads, 1);
    assert!(report.passes > report.sweeps * 2);
}

#[test]
fn zero_rate_publishes_unchanged_rules() {
    let pool = Arc::new(ResultPool::new(8));
    let handle = ConfigHandle::new(config(4, 0.0));
    let running = RunningFlag::new();
    let frozen = RateController {
        time_weight: 0.0,
        ..RateController::default()
    };
    let w = worker(&pool, &handle, Arc::new(|_: &Rule| Fitness::Pass), &running)
        .rate_controller(frozen);
    let join = w.spawn().unwrap();
    assert!(wait_until(Duration::from_secs(5), || pool.is_full()));
    running.trigger();
    join.join().unwrap().unwrap();

    let entries = pool.snapshot().unwrap();
    let first: Vec<&Rule> = entries[..4].iter().map(|d| &d.rule).collect();
    let second: Vec<&Rule> = entries[4..].iter().map(|d| &d.rule).collect();
    assert_eq!(first, second);
}

#[test]
fn stress_level_enables_crossover() {
    let pool = Arc::new(ResultPool::new(100));
    let handle = ConfigHandle::new(WorkerConfig {
        stress_level: 1.0,
        ..config(4, 0.0)
    });
    let running = RunningFlag::new();
    let w = worker(&pool, &handle, Arc::new(|_: &Rule| Fitness::Pass), &running);
    let join = w.spawn().unwrap();
    assert!(wait_until(Duration::from_secs(5), || pool.len() >= 40));
    running.trigger();
    let report = join.join().unwrap().unwrap();
    assert_eq!(report.resets, 0);
    assert!(report.published >= 40);
}

#[test]
fn stops_after_flag_cleared_and_never_publishes_again() {
    let pool = Arc::new(ResultPool::new(1_000_000));
    let handle = ConfigHandle::new(config(3, 0.2));
    let running = RunningFlag::new();
    let w = worker(&pool, &handle, Arc::new(|_: &Rule| Fitness::Pass), &running);
    let state = w.state();
    let join = w.spawn().unwrap();

    assert!(wait_until(Duration::from_secs(5), || pool.len() >= 3));
    running.trigger();
    assert!(wait_until(Duration::from_secs(2), || state.is_stopped()));
    join.join().unwrap().unwrap();

    let settled = pool.len();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(pool.len(), settled);
}

#[test]
fn saturating_load_flips_every_bit() {
    let pool = Arc::new(ResultPool::new(8));
    let handle = ConfigHandle::new(config(4, 0.0));
    let running = RunningFlag::new();
    let w = worker(&pool, &handle, Arc::new(|_: &Rule| Fitness::Pass), &running)
        .load_probe(Arc::new(ConstantLoad::new(10.0)));
    let join = w.spawn().unwrap();
    assert!(wait_until(Duration::from_secs(5), || pool.is_full()));
    running.trigger();
    join.join().unwrap().unwrap();

    let entries = pool.snapshot().unwrap();
    for i in 0..4 {
        let distance = entries[i].rule.hamming(&entries[i + 4].rule).unwrap();
        assert_eq!(distance, 6);
    }
}

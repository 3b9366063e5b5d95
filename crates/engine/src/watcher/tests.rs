//! Tests for the config watcher.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use bitrule_core::{EngineError, WorkerConfig};

use super::*;
use crate::supervisor::RunningFlag;
use crate::worker::UnitState;

const INITIAL: &str = r#"
identifier = "initial"
mutation_rate = 0.1
pool_size = 4
"#;

const UPDATED: &str = r#"
identifier = "updated"
mutation_rate = 0.3
pool_size = 6
"#;

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    cond()
}

/// Replace the file in one rename so the watcher never sees partial contents.
fn replace(path: &Path, contents: &str) {
    let staging = path.with_file_name(".staging.tmp");
    fs::write(&staging, contents).unwrap();
    fs::rename(&staging, path).unwrap();
}

fn watcher_for(path: &Path, handle: &ConfigHandle, running: &RunningFlag) -> ConfigWatcher {
    ConfigWatcher::new(
        Arc::new(TomlFileSource::new(path)),
        handle.clone(),
        running.clone(),
    )
    .poll_interval(Duration::from_millis(20))
}

#[test]
fn handle_swaps_whole_config() {
    let handle = ConfigHandle::new(WorkerConfig::default());
    let before = handle.load();
    assert_eq!(handle.version(), 0);

    let next = WorkerConfig {
        mutation_rate: 0.4,
        ..WorkerConfig::default()
    };
    assert_eq!(handle.store(next.clone()), 1);

    assert_eq!(*handle.load(), next);
    assert_eq!(before.mutation_rate, WorkerConfig::default().mutation_rate);
}

#[test]
fn toml_source_reads_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bitrule.toml");
    fs::write(&path, INITIAL).unwrap();

    let source = TomlFileSource::new(&path);
    let config = source.load().unwrap();
    assert_eq!(config.identifier, "initial");
    assert_eq!(source.path(), path.as_path());
}

#[test]
fn missing_file_reports_watch_failure_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let handle = ConfigHandle::new(WorkerConfig::default());
    let running = RunningFlag::new();

    let watcher = watcher_for(&path, &handle, &running);
    let state = watcher.state();
    let err = watcher.run().unwrap_err();

    assert!(matches!(err, EngineError::WatchFailure { .. }));
    assert_eq!(state.get(), UnitState::Stopped);
    assert_eq!(*handle.load(), WorkerConfig::default());
    assert!(running.is_running(), "watch failure must not stop the run");
}

#[test]
fn modification_publishes_new_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bitrule.toml");
    fs::write(&path, INITIAL).unwrap();

    let handle = ConfigHandle::new(WorkerConfig::from_file(&path).unwrap());
    let running = RunningFlag::new();
    let watcher = watcher_for(&path, &handle, &running);
    let state = watcher.state();
    let join = watcher.spawn().unwrap();

    assert!(wait_until(Duration::from_secs(5), || state.get() == UnitState::Running));
    std::thread::sleep(Duration::from_millis(100));
    replace(&path, UPDATED);

    let reloaded = wait_until(Duration::from_secs(10), || handle.load().identifier == "updated");
    running.trigger();
    let report = join.join().unwrap().unwrap();

    assert!(reloaded, "config was not reloaded");
    assert_eq!(handle.load().mutation_rate, 0.3);
    assert!(report.reloads >= 1);
    assert_eq!(state.get(), UnitState::Stopped);
}

#[test]
fn invalid_contents_keep_last_known_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bitrule.toml");
    fs::write(&path, INITIAL).unwrap();

    let initial = WorkerConfig::from_file(&path).unwrap();
    let handle = ConfigHandle::new(initial.clone());
    let running = RunningFlag::new();
    let watcher = watcher_for(&path, &handle, &running);
    let state = watcher.state();
    let join = watcher.spawn().unwrap();

    assert!(wait_until(Duration::from_secs(5), || state.get() == UnitState::Running));
    replace(&path, "mutation_rate = 7.0\n");
    std::thread::sleep(Duration::from_millis(300));

    running.trigger();
    let report = join.join().unwrap().unwrap();

    assert_eq!(*handle.load(), initial);
    assert_eq!(handle.version(), 0);
    assert_eq!(report.reloads, 0);
}

#[test]
fn truncated_file_keeps_last_known_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bitrule.toml");
    fs::write(&path, INITIAL).unwrap();

    let initial = WorkerConfig::from_file(&path).unwrap();
    let handle = ConfigHandle::new(initial.clone());
    let running = RunningFlag::new();
    let watcher = watcher_for(&path, &handle, &running);
    let state = watcher.state();
    let join = watcher.spawn().unwrap();

    assert!(wait_until(Duration::from_secs(5), || state.get() == UnitState::Running));
    std::thread::sleep(Duration::from_millis(100));
    fs::write(&path, "").unwrap();
    std::thread::sleep(Duration::from_millis(300));

    running.trigger();
    let report = join.join().unwrap().unwrap();

    assert_eq!(handle.version(), 0);
    assert_eq!(*handle.load(), initial);
    assert_eq!(report.reloads, 0);
    assert!(report.failed_reloads >= 1);
}

#[test]
fn stops_when_flag_cleared() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bitrule.toml");
    fs::write(&path, INITIAL).unwrap();

    let handle = ConfigHandle::new(WorkerConfig::default());
    let running = RunningFlag::new();
    let watcher = watcher_for(&path, &handle, &running);
    let state = watcher.state();
    let join = watcher.spawn().unwrap();

    assert!(wait_until(Duration::from_secs(5), || state.get() == UnitState::Running));
    running.trigger();
    assert!(wait_until(Duration::from_secs(2), || state.is_stopped()));
    assert!(join.join().unwrap().is_ok());
}

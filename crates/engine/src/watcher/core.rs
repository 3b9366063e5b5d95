//! [`ConfigWatcher`]: filesystem-driven config reload loop.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use bitrule_core::{EngineError, Result};

use crate::supervisor::RunningFlag;
use crate::worker::{StateCell, UnitState};

use super::handle::ConfigHandle;
use super::source::ConfigSource;

/// Unit name used in logs and shutdown reports.
pub const WATCHER_NAME: &str = "config-watcher";

/// Counters returned when the watcher stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatcherReport {
    /// Change events whose contents loaded cleanly (including no-op touches).
    pub reloads: u64,
    pub failed_reloads: u64,
}

type EventRx = Receiver<notify::Result<Event>>;

/// Watches a [`ConfigSource`] and swaps a new config into a
/// [`ConfigHandle`] whenever the resource changes.
///
/// Blocks only on the event channel, with a timeout so the
/// [`RunningFlag`] is polled regularly. If the resource cannot be watched
/// the failure is logged once and the loop exits; workers keep the last
/// config they saw.
pub struct ConfigWatcher {
    source: Arc<dyn ConfigSource>,
    handle: ConfigHandle,
    running: RunningFlag,
    poll_interval: Duration,
    state: StateCell,
}

impl ConfigWatcher {
    pub fn new(source: Arc<dyn ConfigSource>, handle: ConfigHandle, running: RunningFlag) -> Self {
        Self {
            source,
            handle,
            running,
            poll_interval: Duration::from_millis(200),
            state: StateCell::new(),
        }
    }

    /// How long to wait for an event before re-checking the running flag
    /// (default: 200ms).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn state(&self) -> StateCell {
        self.state.clone()
    }

    /// Run the watch loop on a dedicated thread.
    pub fn spawn(self) -> Result<JoinHandle<Result<WatcherReport>>> {
        let handle = thread::Builder::new()
            .name(WATCHER_NAME.to_string())
            .spawn(move || {
                let _stopped = self.state.stop_on_drop();
                self.run()
            })?;
        Ok(handle)
    }

    /// Run the watch loop on the current thread until the running flag is
    /// cleared or the watch cannot be established.
    pub fn run(self) -> Result<WatcherReport> {
        let (watcher, rx) = match self.open() {
            Ok(opened) => opened,
            Err(e) => {
                error!(unit = WATCHER_NAME, error = %e, "config watch failed, continuing with last-known config");
                self.state.advance(UnitState::Stopped);
                return Err(e);
            }
        };

        self.state.advance(UnitState::Running);
        info!(path = %self.source.path().display(), "watching config for changes");

        let mut report = WatcherReport::default();
        while self.running.is_running() {
            match rx.recv_timeout(self.poll_interval) {
                Ok(Ok(event)) => {
                    if self.is_relevant(&event) {
                        if self.reload() {
                            report.reloads += 1;
                        } else {
                            report.failed_reloads += 1;
                        }
                    }
                }
                Ok(Err(e)) => warn!(error = %e, "config watcher error"),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("config watcher event channel closed");
                    break;
                }
            }
        }

        self.state.advance(UnitState::Draining);
        drop(watcher);
        self.state.advance(UnitState::Stopped);
        info!(reloads = report.reloads, "config watcher stopped");
        Ok(report)
    }

    /// Start watching the directory that holds the config file. Editors
    /// often replace files by rename, so the directory is watched rather
    /// than the file itself.
    fn open(&self) -> Result<(RecommendedWatcher, EventRx)> {
        let path = self.source.path();
        let failure = |reason: String| EngineError::WatchFailure {
            path: path.to_path_buf(),
            reason,
        };

        if !path.is_file() {
            return Err(failure("config file not found".into()));
        }

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx).map_err(|e| failure(e.to_string()))?;
        watcher
            .watch(&watch_dir(path), RecursiveMode::NonRecursive)
            .map_err(|e| failure(e.to_string()))?;
        Ok((watcher, rx))
    }

    fn is_relevant(&self, event: &Event) -> bool {
        let wanted = match &event.kind {
            EventKind::Create(_) => true,
            EventKind::Modify(ModifyKind::Metadata(_)) => false,
            EventKind::Modify(_) => true,
            _ => false,
        };
        let target = self.source.path().file_name();
        wanted && event.paths.iter().any(|p| p.file_name() == target)
    }

    /// Load the source and publish it if it differs from the current
    /// config. Returns false when the load failed.
    fn reload(&self) -> bool {
        match self.source.load() {
            Ok(config) => {
                if *self.handle.load() == config {
                    debug!("config file touched, contents unchanged");
                    return true;
                }
                let version = self.handle.store(config);
                info!(version, "config reloaded");
                self.handle.load().log_summary();
                true
            }
            Err(e) => {
                warn!(error = %e, "config reload failed, keeping last-known config");
                false
            }
        }
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

//! Hot reload of [`WorkerConfig`](bitrule_core::WorkerConfig) via a `notify`
//! filesystem watcher.
//!
//! The watcher is the only producer of new configs; workers read the current
//! one through a [`ConfigHandle`] at the start of each sweep.

mod core;
mod handle;
mod source;

#[cfg(test)]
mod tests;

pub use self::core::{ConfigWatcher, WatcherReport, WATCHER_NAME};
pub use self::handle::ConfigHandle;
pub use self::source::{ConfigSource, TomlFileSource};

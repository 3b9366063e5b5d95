use std::path::{Path, PathBuf};

use bitrule_core::{Result, WorkerConfig};

/// A watchable resource that yields a [`WorkerConfig`].
///
/// The watcher only needs the path to observe and a way to turn the current
/// contents into a config; the file format is the source's business.
pub trait ConfigSource: Send + Sync {
    fn path(&self) -> &Path;

    fn load(&self) -> Result<WorkerConfig>;
}

/// TOML file parsed with [`WorkerConfig::from_file`].
#[derive(Debug, Clone)]
pub struct TomlFileSource {
    path: PathBuf,
}

impl TomlFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for TomlFileSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<WorkerConfig> {
        WorkerConfig::from_file(&self.path)
    }
}

//! Bounded, append-only pool of discovered rules shared by all workers.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use bitrule_core::{EngineError, Result, Rule};

/// One published rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    pub rule: Rule,
    /// Identifier of the publishing unit.
    pub source: String,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct PoolState {
    entries: Vec<Discovery>,
    closed: bool,
}

/// Fixed-capacity result pool.
///
/// Every append runs under the pool's single mutex. Appends past capacity
/// are rejected with [`EngineError::CapacityExceeded`]; existing entries are
/// never overwritten, removed or reordered. Once [`close`](Self::close)d the
/// pool rejects all further appends with [`EngineError::PoolClosed`].
#[derive(Debug)]
pub struct ResultPool {
    capacity: usize,
    state: Mutex<PoolState>,
    rejected: AtomicU64,
}

impl ResultPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(PoolState {
                entries: Vec::with_capacity(capacity.min(4096)),
                closed: false,
            }),
            rejected: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, PoolState>> {
        self.state
            .lock()
            .map_err(|e| EngineError::LockPoisoned(format!("result pool: {e}")))
    }

    /// Read-only access for the infallible accessors. A poisoned lock is
    /// logged and its data read anyway.
    fn peek(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| {
            let poisoned = EngineError::LockPoisoned(format!("result pool: {e}"));
            warn!(error = %poisoned, "reading poisoned result pool");
            e.into_inner()
        })
    }

    /// Append `rule` if there is room. Returns the index of the new entry.
    pub fn try_append(&self, rule: Rule, source: &str) -> Result<usize> {
        let mut state = self.lock()?;
        if state.closed {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(EngineError::PoolClosed);
        }
        if state.entries.len() >= self.capacity {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(EngineError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        state.entries.push(Discovery {
            rule,
            source: source.to_string(),
            discovered_at: Utc::now(),
        });
        Ok(state.entries.len() - 1)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.peek().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Appends refused so far, for any reason.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Stop accepting appends. Idempotent.
    pub fn close(&self) -> Result<()> {
        self.lock()?.closed = true;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.peek().closed
    }

    /// Copy of all entries in append order.
    pub fn snapshot(&self) -> Result<Vec<Discovery>> {
        Ok(self.lock()?.entries.clone())
    }

    /// Write the current entries to `path` as pretty-printed JSON.
    pub fn dump_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let entries = self.snapshot()?;
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut writer, &entries).map_err(std::io::Error::from)?;
        writer.flush()?;
        Ok(())
    }
}

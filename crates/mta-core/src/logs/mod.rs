//! Bounded event logs
//!
//! Each log is a ring buffer: when full, appending evicts the oldest entry.
//! Entry ids increase monotonically from 1 and are never reused, not even
//! after a clear.

use crate::records::{DsxLogEntry, MtaLogEntry, SignallingLogEntry, Snapshot};
use crate::sync::lock;
use crate::{Error, Result};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// An entry that carries a log-assigned id
pub trait LogEntry: Clone + Send {
    fn id(&self) -> u64;
    fn assign_id(&mut self, id: u64);
}

impl LogEntry for DsxLogEntry {
    fn id(&self) -> u64 {
        self.id
    }

    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }
}

impl LogEntry for MtaLogEntry {
    fn id(&self) -> u64 {
        self.index
    }

    fn assign_id(&mut self, id: u64) {
        self.index = id;
    }
}

impl LogEntry for SignallingLogEntry {
    fn id(&self) -> u64 {
        self.id
    }

    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }
}

#[derive(Debug)]
struct LogState<T> {
    entries: VecDeque<T>,
    next_id: u64,
    enabled: bool,
    evicted: u64,
}

#[derive(Debug)]
pub struct LogBuffer<T: LogEntry> {
    name: &'static str,
    capacity: usize,
    state: Mutex<LogState<T>>,
}

impl<T: LogEntry> LogBuffer<T> {
    /// Create an enabled, empty log
    ///
    /// A log must hold at least one entry.
    pub fn new(name: &'static str, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config(format!("{} log capacity must be at least 1", name)));
        }
        Ok(Self {
            name,
            capacity,
            state: Mutex::new(LogState {
                entries: VecDeque::with_capacity(capacity),
                next_id: 1,
                enabled: true,
                evicted: 0,
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an entry, assigning its id
    ///
    /// Returns `None` without recording anything while the log is disabled.
    pub fn append(&self, mut entry: T) -> Option<u64> {
        let mut state = lock(&self.state);
        if !state.enabled {
            return None;
        }

        let id = state.next_id;
        state.next_id += 1;
        entry.assign_id(id);

        if state.entries.len() == self.capacity {
            state.entries.pop_front();
            state.evicted += 1;
        }
        state.entries.push_back(entry);
        Some(id)
    }

    /// Entries oldest first
    pub fn snapshot(&self) -> Snapshot<T> {
        let state = lock(&self.state);
        state.entries.iter().cloned().collect()
    }

    pub fn get(&self, id: u64) -> Option<T> {
        lock(&self.state)
            .entries
            .iter()
            .find(|entry| entry.id() == id)
            .cloned()
    }

    /// Drop every entry when `clear` is set; `false` is a no-op
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self, clear: bool) -> usize {
        if !clear {
            return 0;
        }
        let mut state = lock(&self.state);
        let removed = state.entries.len();
        state.entries.clear();
        debug!("{} log cleared ({} entries)", self.name, removed);
        removed
    }

    pub fn is_enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        lock(&self.state).enabled = enabled;
        debug!(
            "{} log {}",
            self.name,
            if enabled { "enabled" } else { "disabled" }
        );
    }

    /// Entries lost to ring eviction since construction
    pub fn evicted(&self) -> u64 {
        lock(&self.state).evicted
    }
}

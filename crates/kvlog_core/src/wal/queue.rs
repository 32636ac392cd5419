//! Appended-but-unconfirmed records awaiting flush.

use crate::types::TableMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// One record waiting for the main store to confirm it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    /// Offset of the record's header in the log file.
    pub offset: u64,
    /// The transaction's writes.
    pub tables: Arc<TableMap>,
}

impl PendingEntry {
    /// Creates a new pending entry.
    #[must_use]
    pub fn new(offset: u64, tables: Arc<TableMap>) -> Self {
        Self { offset, tables }
    }
}

/// Thread-safe, insertion-ordered queue of [`PendingEntry`]s.
///
/// The binlog pushes every new record to the **front**, so iteration runs
/// from the most recent write to the oldest. The flush path drains from the
/// back, oldest first.
///
/// All operations take a short internal lock; [`PendingQueue::entries`]
/// returns a snapshot so consumers can iterate while appends continue.
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: Mutex<VecDeque<PendingEntry>>,
}

impl PendingQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry as the most recent.
    pub fn push_front(&self, entry: PendingEntry) {
        self.entries.lock().push_front(entry);
    }

    /// Returns a snapshot of all entries, most recent first.
    #[must_use]
    pub fn entries(&self) -> Vec<PendingEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Returns the most recent entry.
    #[must_use]
    pub fn newest(&self) -> Option<PendingEntry> {
        self.entries.lock().front().cloned()
    }

    /// Returns the oldest entry without removing it.
    #[must_use]
    pub fn oldest(&self) -> Option<PendingEntry> {
        self.entries.lock().back().cloned()
    }

    /// Removes and returns the oldest entry.
    pub fn pop_oldest(&self) -> Option<PendingEntry> {
        self.entries.lock().pop_back()
    }

    /// Removes up to `max` entries, returned oldest first.
    pub fn drain_oldest(&self, max: usize) -> Vec<PendingEntry> {
        let mut entries = self.entries.lock();
        let count = max.min(entries.len());
        let mut drained = Vec::with_capacity(count);
        for _ in 0..count {
            if let Some(entry) = entries.pop_back() {
                drained.push(entry);
            }
        }
        drained
    }

    /// Removes the entry for the record at `offset`.
    pub fn remove(&self, offset: u64) -> Option<PendingEntry> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|entry| entry.offset == offset)?;
        entries.remove(index)
    }

    /// Returns true if a record at `offset` is pending.
    #[must_use]
    pub fn contains(&self, offset: u64) -> bool {
        self.entries.lock().iter().any(|entry| entry.offset == offset)
    }

    /// Looks up the most recent pending value for `key` in `table`.
    #[must_use]
    pub fn lookup(&self, table: &[u8], key: &[u8]) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .iter()
            .find_map(|entry| entry.tables.get(table)?.get(key).cloned())
    }

    /// Returns the number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

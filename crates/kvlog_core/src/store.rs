//! The main store that recovered records are replayed into.

use crate::error::CoreResult;
use crate::types::{Table, TableMap};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The primary storage engine (memtable or backing store).
///
/// The binlog only ever writes into it, during recovery.
pub trait MainStore: Send + Sync {
    /// Applies a single write.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write. Recovery stops on
    /// the first store error.
    fn apply(&self, table: &[u8], key: &[u8], value: &[u8]) -> CoreResult<()>;

    /// Applies every write of a transaction.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`MainStore::apply`].
    fn apply_tables(&self, tables: &TableMap) -> CoreResult<()> {
        for (table, entries) in tables {
            for (key, value) in entries {
                self.apply(table, key, value)?;
            }
        }
        Ok(())
    }
}

/// A simple in-memory [`MainStore`].
///
/// Suitable for tests, benchmarks and tooling that want to see what a
/// recovery would replay.
#[derive(Debug, Default)]
pub struct MemStore {
    tables: RwLock<TableMap>,
    applied: AtomicUsize,
}

impl MemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key` in `table`.
    #[must_use]
    pub fn get(&self, table: &[u8], key: &[u8]) -> Option<Vec<u8>> {
        self.tables.read().get(table)?.get(key).cloned()
    }

    /// Returns a copy of one table.
    #[must_use]
    pub fn table(&self, table: &[u8]) -> Option<Table> {
        self.tables.read().get(table).cloned()
    }

    /// Returns a copy of every table.
    #[must_use]
    pub fn snapshot(&self) -> TableMap {
        self.tables.read().clone()
    }

    /// Returns the number of distinct keys across all tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().values().map(Table::len).sum()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns how many writes have been applied, including overwrites.
    #[must_use]
    pub fn apply_count(&self) -> usize {
        self.applied.load(Ordering::Relaxed)
    }
}

impl MainStore for MemStore {
    fn apply(&self, table: &[u8], key: &[u8], value: &[u8]) -> CoreResult<()> {
        self.tables
            .write()
            .entry(table.to_vec())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        self.applied.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Transaction, TransactionId};

    #[test]
    fn apply_and_get() {
        let store = MemStore::new();
        store.apply(b"t", b"k", b"v").unwrap();

        assert_eq!(store.get(b"t", b"k"), Some(b"v".to_vec()));
        assert_eq!(store.get(b"t", b"missing"), None);
        assert_eq!(store.get(b"other", b"k"), None);
    }

    #[test]
    fn apply_tables_writes_everything() {
        let mut tx = Transaction::new(TransactionId::new(1));
        tx.put("a", "1", "x").put("a", "2", "y").put("b", "1", "z");

        let store = MemStore::new();
        store.apply_tables(tx.tables()).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.apply_count(), 3);
        assert_eq!(store.snapshot(), *tx.tables());
    }

    #[test]
    fn overwrite_counts_as_apply() {
        let store = MemStore::new();
        store.apply(b"t", b"k", b"1").unwrap();
        store.apply(b"t", b"k", b"2").unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.apply_count(), 2);
        assert_eq!(store.table(b"t").unwrap()[b"k".as_slice()], b"2".to_vec());
    }
}

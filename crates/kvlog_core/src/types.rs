//! Core type definitions for the binlog.

use std::collections::BTreeMap;
use std::fmt;

/// One table's contents within a transaction: key to value.
pub type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// A transaction's writes: table name to (key to value).
///
/// Ordered maps make record encoding deterministic.
pub type TableMap = BTreeMap<Vec<u8>, Table>;

/// Unique identifier for a transaction.
///
/// Transaction IDs are assigned monotonically by the caller and never reused
/// within a log's lifetime. Recovery relies on this: the header and trailer
/// copies of the id are the record's only self-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub i64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Returns the next transaction ID, or `None` at `i64::MAX`.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// A committed transaction as seen by the binlog.
///
/// The log only reads it; commit and rollback belong to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    id: TransactionId,
    tables: TableMap,
}

impl Transaction {
    /// Creates an empty transaction.
    #[must_use]
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            tables: TableMap::new(),
        }
    }

    /// Creates a transaction from an existing table map.
    ///
    /// Tables without any writes are dropped: the log has no way to record
    /// an empty table, so keeping one would make the transaction differ
    /// from what recovery reads back.
    #[must_use]
    pub fn with_tables(id: TransactionId, mut tables: TableMap) -> Self {
        tables.retain(|_, entries| !entries.is_empty());
        Self { id, tables }
    }

    /// Records a write of `value` under `key` in `table`.
    pub fn put(
        &mut self,
        table: impl Into<Vec<u8>>,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.tables
            .entry(table.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Returns the transaction ID.
    #[must_use]
    pub const fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the transaction's writes.
    #[must_use]
    pub const fn tables(&self) -> &TableMap {
        &self.tables
    }

    /// Consumes the transaction, returning its writes.
    #[must_use]
    pub fn into_tables(self) -> TableMap {
        self.tables
    }

    /// Returns the number of key/value writes across all tables.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.tables.values().map(Table::len).sum()
    }

    /// Returns true if the transaction writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }
}

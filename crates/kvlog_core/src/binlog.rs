//! The binlog handle used by the rest of the store.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::store::MainStore;
use crate::types::Transaction;
use crate::wal::{LogWriter, PendingEntry, PendingQueue, RecoveryReport};
use kvlog_storage::{FilePool, HandlePool, InMemoryPool};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// A transaction binlog over a single file.
///
/// `BinLog` is `Send + Sync`; share it behind an `Arc` and append from any
/// number of threads. Appends, synced-flag writes and recovery are
/// serialized by a lock owned by this instance.
///
/// # Lifecycle
///
/// 1. Open with [`BinLog::open`] (or [`BinLog::with_pool`]).
/// 2. Call [`BinLog::recover`] once, before the first append.
/// 3. [`BinLog::append`] committed transactions; hand the returned offsets
///    to [`BinLog::mark_synced`] once the main store has them durably.
/// 4. [`BinLog::close`], or drop the log.
pub struct BinLog {
    writer: LogWriter,
    store: Arc<dyn MainStore>,
    path: Option<PathBuf>,
    is_open: RwLock<bool>,
}

impl BinLog {
    /// Opens the log file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file exists but is read-only or not accessible (`PermissionDenied`)
    /// - The file is missing and `create_if_missing` is false
    /// - Another pool already holds the file's lock
    pub fn open(path: &Path, config: &Config, store: Arc<dyn MainStore>) -> CoreResult<Self> {
        let pool = FilePool::open(path, config.pool_options())?;
        let mut log = Self::with_pool(Arc::new(pool), config, store);
        log.path = Some(path.to_path_buf());
        info!(path = %path.display(), "opened binlog");
        Ok(log)
    }

    /// Creates a log over an already-built handle pool.
    #[must_use]
    pub fn with_pool(
        pool: Arc<dyn HandlePool>,
        config: &Config,
        store: Arc<dyn MainStore>,
    ) -> Self {
        let writer = LogWriter::new(
            pool,
            Arc::new(PendingQueue::new()),
            config.sync_on_append,
            config.sync_on_mark,
        );
        Self {
            writer,
            store,
            path: None,
            is_open: RwLock::new(true),
        }
    }

    /// Creates an empty, non-persistent log for testing.
    #[must_use]
    pub fn open_in_memory(store: Arc<dyn MainStore>) -> Self {
        Self::with_pool(Arc::new(InMemoryPool::new()), &Config::default(), store)
    }

    /// Replays every unsynced record into the main store.
    ///
    /// # Errors
    ///
    /// See [`LogWriter::recover`].
    pub fn recover(&self) -> CoreResult<RecoveryReport> {
        self.ensure_open()?;
        self.writer.recover(self.store.as_ref())
    }

    /// Appends a committed transaction and returns its record offset.
    ///
    /// # Errors
    ///
    /// See [`LogWriter::append`].
    pub fn append(&self, tx: &Transaction) -> CoreResult<u64> {
        self.ensure_open()?;
        self.writer.append(tx)
    }

    /// Marks the record at `offset` as durable in the main store.
    ///
    /// # Errors
    ///
    /// See [`LogWriter::mark_synced`].
    pub fn mark_synced(&self, offset: u64) -> CoreResult<()> {
        self.ensure_open()?;
        self.writer.mark_synced(offset)
    }

    /// Marks the record at `offset` synced and drops it from the pending queue.
    ///
    /// This is the flush path's last step for one record. The entry is only
    /// removed once the flag write has succeeded.
    ///
    /// # Errors
    ///
    /// Returns the error from [`BinLog::mark_synced`]; the entry stays queued.
    pub fn acknowledge(&self, offset: u64) -> CoreResult<Option<PendingEntry>> {
        self.mark_synced(offset)?;
        Ok(self.writer.pending().remove(offset))
    }

    /// Returns a snapshot of pending entries, most recent first.
    #[must_use]
    pub fn pending_entries(&self) -> Vec<PendingEntry> {
        self.writer.pending().entries()
    }

    /// Returns the pending queue shared with the flush path.
    #[must_use]
    pub fn pending(&self) -> Arc<PendingQueue> {
        Arc::clone(self.writer.pending())
    }

    /// Returns the main store recovery replays into.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn MainStore> {
        &self.store
    }

    /// Returns the current size of the log file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is closed or a handle cannot be acquired.
    pub fn size(&self) -> CoreResult<u64> {
        self.ensure_open()?;
        self.writer.size()
    }

    /// Returns the log file's path, if it was opened from one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Checks if the log is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    /// Syncs and closes the log. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.writer.close()?;
        *is_open = false;
        info!(pending = self.writer.pending().len(), "closed binlog");
        Ok(())
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::invalid_operation("binlog is closed"))
        }
    }
}

impl std::fmt::Debug for BinLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinLog")
            .field("path", &self.path)
            .field("is_open", &self.is_open())
            .field("writer", &self.writer)
            .finish_non_exhaustive()
    }
}

impl Drop for BinLog {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

//! Serialized appends to the binlog.

use crate::error::CoreResult;
use crate::types::Transaction;
use crate::wal::queue::{PendingEntry, PendingQueue};
use crate::wal::record::encode_record;
use kvlog_storage::{HandlePool, PooledHandle};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, warn};

/// Bookkeeping guarded by the log's exclusive lock.
#[derive(Debug, Default)]
pub(crate) struct WriterState {
    /// Records appended by this instance.
    pub(crate) appended: u64,
    /// Whether recovery has run.
    pub(crate) recovered: bool,
}

/// Owns the log file's write path.
///
/// Every operation that touches the file takes the same exclusive lock:
/// [`LogWriter::append`], [`LogWriter::mark_synced`] and
/// [`LogWriter::recover`]. The lock belongs to this instance; two logs over
/// different files never contend.
pub struct LogWriter {
    /// Pool lending handles onto the log file.
    pool: Arc<dyn HandlePool>,
    /// Serializes seek-then-write sequences and synced-flag writes.
    state: Mutex<WriterState>,
    /// Records appended but not yet confirmed by the main store.
    pending: Arc<PendingQueue>,
    /// Whether to sync after each append.
    sync_on_append: bool,
    /// Whether to sync after each synced-flag write.
    pub(crate) sync_on_mark: bool,
}

impl LogWriter {
    /// Creates a writer over `pool` that reports appends into `pending`.
    pub fn new(
        pool: Arc<dyn HandlePool>,
        pending: Arc<PendingQueue>,
        sync_on_append: bool,
        sync_on_mark: bool,
    ) -> Self {
        Self {
            pool,
            state: Mutex::new(WriterState::default()),
            pending,
            sync_on_append,
            sync_on_mark,
        }
    }

    /// Appends a transaction and returns the offset of its record.
    ///
    /// The record is encoded before any I/O. The handle is positioned at the
    /// end of the file and the whole record is written in one call while
    /// the exclusive lock is held, so concurrent appenders can never
    /// interleave. Only after the write succeeds is the record pushed to
    /// the front of the pending queue.
    ///
    /// With `sync_on_append`, a sync failure after a successful write is
    /// logged and the handle is dropped, but the append still succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A field exceeds its length prefix (`Encoding`); nothing is written
    /// - A handle cannot be acquired, or the seek or write fails; the
    ///   pending queue is left untouched
    pub fn append(&self, tx: &Transaction) -> CoreResult<u64> {
        let record = encode_record(tx.id(), tx.tables())?;
        let tables = Arc::new(tx.tables().clone());

        let mut handle = PooledHandle::acquire(self.pool.as_ref())?;
        let mut state = self.state.lock();

        let offset = handle.seek_end()?;
        let written = handle.write_at(&record, offset);
        if let Err(err) = written {
            handle.discard();
            return Err(err.into());
        }
        // The record is on file from here on and recovery would replay it,
        // so a failed sync must not report the append as failed.
        if self.sync_on_append {
            if let Err(err) = handle.sync() {
                warn!(offset, error = %err, "binlog sync failed after append");
                handle.discard();
            }
        }

        state.appended += 1;
        self.pending.push_front(PendingEntry::new(offset, tables));
        drop(state);

        debug!(
            offset,
            txid = tx.id().as_i64(),
            len = record.len(),
            "appended binlog record"
        );
        Ok(offset)
    }

    /// Returns the current size of the log file.
    ///
    /// # Errors
    ///
    /// Returns an error if a handle cannot be acquired.
    pub fn size(&self) -> CoreResult<u64> {
        let handle = PooledHandle::acquire(self.pool.as_ref())?;
        Ok(handle.size()?)
    }

    /// Returns the shared pending queue.
    #[must_use]
    pub fn pending(&self) -> &Arc<PendingQueue> {
        &self.pending
    }

    /// Syncs the log file and closes the handle pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync or close fails.
    pub fn close(&self) -> CoreResult<()> {
        let _state = self.state.lock();
        {
            let mut handle = PooledHandle::acquire(self.pool.as_ref())?;
            handle.sync()?;
        }
        self.pool.close()?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &dyn HandlePool {
        self.pool.as_ref()
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock()
    }
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("pending", &self.pending.len())
            .field("sync_on_append", &self.sync_on_append)
            .field("sync_on_mark", &self.sync_on_mark)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::types::TransactionId;
    use crate::wal::record::{decode_payload, RecordHeader, HEADER_SIZE, TRAILER_SIZE};
    use kvlog_storage::InMemoryPool;

    fn writer_over(pool: &Arc<InMemoryPool>) -> LogWriter {
        let pool: Arc<dyn HandlePool> = pool.clone();
        LogWriter::new(pool, Arc::new(PendingQueue::new()), false, false)
    }

    fn tx(id: i64, value: &str) -> Transaction {
        let mut tx = Transaction::new(TransactionId::new(id));
        tx.put("t", "k", value);
        tx
    }

    #[test]
    fn first_append_lands_at_zero() {
        let pool = Arc::new(InMemoryPool::new());
        let writer = writer_over(&pool);

        let offset = writer.append(&tx(1, "v")).unwrap();
        assert_eq!(offset, 0);

        let data = pool.data();
        let header = RecordHeader::parse(&data).unwrap();
        assert_eq!(header.txid, TransactionId::new(1));
        assert_eq!(header.record_len() as usize, data.len());

        let payload = &data[HEADER_SIZE..data.len() - TRAILER_SIZE];
        let tables = decode_payload(payload).unwrap();
        assert_eq!(tables[b"t".as_slice()][b"k".as_slice()], b"v".to_vec());
    }

    #[test]
    fn sequential_offsets_strictly_increase() {
        let pool = Arc::new(InMemoryPool::new());
        let writer = writer_over(&pool);

        let mut last = None;
        for id in 1..=20 {
            let offset = writer.append(&tx(id, &"x".repeat(id as usize))).unwrap();
            if let Some(previous) = last {
                assert!(offset > previous);
            }
            last = Some(offset);
        }
        assert_eq!(writer.size().unwrap(), pool.data().len() as u64);
    }

    #[test]
    fn append_pushes_to_front_of_queue() {
        let pool = Arc::new(InMemoryPool::new());
        let writer = writer_over(&pool);

        let first = writer.append(&tx(1, "a")).unwrap();
        let second = writer.append(&tx(2, "b")).unwrap();

        let offsets: Vec<u64> = writer.pending().entries().iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![second, first]);
    }

    #[test]
    fn encoding_error_writes_nothing() {
        let pool = Arc::new(InMemoryPool::new());
        let writer = writer_over(&pool);

        let mut bad = Transaction::new(TransactionId::new(1));
        bad.put(vec![b'n'; 300], "k", "v");

        let err = writer.append(&bad).unwrap_err();
        assert!(matches!(err, CoreError::Encoding { .. }));
        assert!(pool.data().is_empty());
        assert!(writer.pending().is_empty());
    }

    #[test]
    fn write_failure_leaves_queue_untouched() {
        let pool = Arc::new(InMemoryPool::new());
        let writer = writer_over(&pool);

        writer.append(&tx(1, "kept")).unwrap();
        pool.fail_next_writes(1);

        let err = writer.append(&tx(2, "lost")).unwrap_err();
        assert!(err.is_io());
        assert_eq!(writer.pending().len(), 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn sync_failure_after_write_still_commits() {
        let pool = Arc::new(InMemoryPool::new());
        let shared: Arc<dyn HandlePool> = pool.clone();
        let writer = LogWriter::new(shared, Arc::new(PendingQueue::new()), true, false);
        pool.fail_next_syncs(1);

        let offset = writer.append(&tx(1, "v")).unwrap();
        assert_eq!(offset, 0);

        let entries = writer.pending().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].offset, offset);

        let data = pool.data();
        let header = RecordHeader::parse(&data).unwrap();
        assert_eq!(header.txid, TransactionId::new(1));
        assert_eq!(header.record_len() as usize, data.len());
        assert_eq!(pool.outstanding(), 0);

        let next = writer.append(&tx(2, "w")).unwrap();
        assert_eq!(next, data.len() as u64);
    }

    #[test]
    fn checkout_failure_is_io_error() {
        let pool = Arc::new(InMemoryPool::new());
        let writer = writer_over(&pool);
        pool.fail_checkouts(true);

        let err = writer.append(&tx(1, "v")).unwrap_err();
        assert!(err.is_io());
        assert!(writer.pending().is_empty());
        assert!(pool.data().is_empty());
    }

    #[test]
    fn handles_are_released_after_append() {
        let pool = Arc::new(InMemoryPool::new());
        let writer = writer_over(&pool);

        for id in 0..10 {
            writer.append(&tx(id, "v")).unwrap();
        }
        assert_eq!(pool.outstanding(), 0);
    }
}

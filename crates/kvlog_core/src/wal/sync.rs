//! Synced-flag tracking.

use crate::error::{CoreError, CoreResult};
use crate::wal::record::{FLAG_SYNCED, HEADER_SIZE};
use crate::wal::writer::LogWriter;
use kvlog_storage::PooledHandle;
use tracing::debug;

impl LogWriter {
    /// Marks the record at `offset` as durable in the main store.
    ///
    /// Writes the single byte `1` over the record's synced flag. Marking an
    /// already-synced record rewrites the same byte and succeeds. The
    /// pending queue is not touched; removing the entry is up to the flush
    /// path once it has seen both the store write and this mark succeed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `offset` does not leave room for a record header inside the file
    ///   (`InvalidOperation`); nothing is written
    /// - A handle cannot be acquired or the write fails
    pub fn mark_synced(&self, offset: u64) -> CoreResult<()> {
        let mut handle = PooledHandle::acquire(self.pool())?;
        let _state = self.lock_state();

        let size = handle.size()?;
        if offset.saturating_add(HEADER_SIZE as u64) > size {
            return Err(CoreError::invalid_operation(format!(
                "no record header at offset {offset} in a log of {size} bytes"
            )));
        }

        let written = handle.write_at(&[FLAG_SYNCED], offset);
        if let Err(err) = written {
            handle.discard();
            return Err(err.into());
        }
        if self.sync_on_mark {
            handle.sync()?;
        }

        debug!(offset, "marked binlog record synced");
        Ok(())
    }
}

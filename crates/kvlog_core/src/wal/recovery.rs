//! Startup recovery: replay unsynced records into the main store.

use crate::error::{CoreError, CoreResult};
use crate::store::MainStore;
use crate::wal::queue::PendingEntry;
use crate::wal::scanner::{RecordScanner, ScanItem};
use crate::wal::writer::LogWriter;
use kvlog_storage::PooledHandle;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a recovery pass.
///
/// Corruption is counted here rather than reported as an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Size of the log image that was scanned.
    pub bytes_scanned: u64,
    /// Structurally valid records found.
    pub records_valid: u64,
    /// Unsynced records replayed into the main store.
    pub records_replayed: u64,
    /// Records skipped because they were already synced.
    pub records_already_synced: u64,
    /// Damaged regions skipped.
    pub corrupt_regions: u64,
    /// Total bytes inside damaged regions.
    pub corrupt_bytes: u64,
}

impl RecoveryReport {
    /// Returns true if no damaged bytes were found.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.corrupt_regions == 0
    }
}

impl LogWriter {
    /// Scans the whole log and replays every unsynced record.
    ///
    /// Must run once, before the first append. Each unsynced record's writes
    /// are applied to `store` and its entry is pushed to the front of the
    /// pending queue, so the newest unsynced record ends up first. Synced
    /// records are neither replayed nor queued. Damaged bytes are skipped
    /// and counted in the report.
    ///
    /// The exclusive lock is held for the whole pass.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Recovery already ran, or records were appended before it
    ///   (`InvalidOperation`)
    /// - The log cannot be read
    /// - The main store rejects a write; recovery stops at that record
    pub fn recover(&self, store: &dyn MainStore) -> CoreResult<RecoveryReport> {
        let mut state = self.lock_state();
        if state.recovered {
            return Err(CoreError::invalid_operation("recovery already ran"));
        }
        if state.appended > 0 {
            return Err(CoreError::invalid_operation(
                "recovery must run before the first append",
            ));
        }

        let image = {
            let mut handle = PooledHandle::acquire(self.pool())?;
            handle.read_all()?
        };
        // From here on a retry would enqueue records twice.
        state.recovered = true;

        let mut report = RecoveryReport {
            bytes_scanned: image.len() as u64,
            ..RecoveryReport::default()
        };

        for item in RecordScanner::new(&image) {
            match item {
                ScanItem::Skipped { offset, len } => {
                    warn!(offset, len, "skipping corrupted binlog region");
                    report.corrupt_regions += 1;
                    report.corrupt_bytes += len;
                }
                ScanItem::Record(record) if record.header.is_synced() => {
                    report.records_valid += 1;
                    report.records_already_synced += 1;
                }
                ScanItem::Record(record) => {
                    report.records_valid += 1;
                    let tables = record.decode()?;
                    store.apply_tables(&tables)?;
                    self.pending()
                        .push_front(PendingEntry::new(record.offset, Arc::new(tables)));
                    report.records_replayed += 1;
                }
            }
        }

        info!(
            bytes = report.bytes_scanned,
            valid = report.records_valid,
            replayed = report.records_replayed,
            already_synced = report.records_already_synced,
            corrupt_regions = report.corrupt_regions,
            corrupt_bytes = report.corrupt_bytes,
            "binlog recovery finished"
        );
        Ok(report)
    }
}

//! In-memory handle pool for testing.

use crate::error::{StorageError, StorageResult};
use crate::handle::{FileHandle, HandlePool};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// An in-memory handle pool.
///
/// Every handle checked out of the pool views the same shared buffer, so
/// it behaves like many descriptors onto one file. It is suitable for:
/// - Unit and integration tests
/// - Simulating torn writes and corrupted bytes
/// - Injecting I/O failures on writes and checkouts
///
/// # Example
///
/// ```rust
/// use kvlog_storage::{InMemoryPool, PooledHandle};
///
/// let pool = InMemoryPool::new();
/// let mut handle = PooledHandle::acquire(&pool).unwrap();
/// handle.write_at(b"test data", 0).unwrap();
/// assert_eq!(handle.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryPool {
    shared: Arc<Shared>,
    fail_checkouts: AtomicBool,
    outstanding: AtomicUsize,
    closed: AtomicBool,
}

#[derive(Debug, Default)]
struct Shared {
    data: RwLock<Vec<u8>>,
    failing_writes: AtomicUsize,
    failing_syncs: AtomicUsize,
}

impl InMemoryPool {
    /// Creates a new pool over an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pool over pre-existing bytes.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        let pool = Self::default();
        *pool.shared.data.write() = data;
        pool
    }

    /// Returns a copy of the buffer.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.shared.data.read().clone()
    }

    /// Overwrites bytes starting at `offset`, growing the buffer if needed.
    pub fn corrupt(&self, offset: usize, bytes: &[u8]) {
        let mut data = self.shared.data.write();
        let end = offset + bytes.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset..end].copy_from_slice(bytes);
    }

    /// Truncates the buffer to `len` bytes, simulating a torn tail.
    pub fn truncate(&self, len: usize) {
        self.shared.data.write().truncate(len);
    }

    /// Makes the next `count` writes through any handle fail.
    pub fn fail_next_writes(&self, count: usize) {
        self.shared.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` syncs through any handle fail.
    ///
    /// Writes still land in the buffer; only the durability step fails.
    pub fn fail_next_syncs(&self, count: usize) {
        self.shared.failing_syncs.store(count, Ordering::SeqCst);
    }

    /// Makes every checkout fail while `fail` is set.
    pub fn fail_checkouts(&self, fail: bool) {
        self.fail_checkouts.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of handles currently checked out.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

impl HandlePool for InMemoryPool {
    fn checkout(&self) -> StorageResult<Box<dyn FileHandle>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        if self.fail_checkouts.load(Ordering::SeqCst) {
            return Err(StorageError::Injected("checkout refused".into()));
        }
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryHandle {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn checkin(&self, handle: Box<dyn FileHandle>) {
        drop(handle);
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    fn discard(&self, handle: Box<dyn FileHandle>) {
        self.checkin(handle);
    }

    fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A handle onto an [`InMemoryPool`] buffer.
#[derive(Debug)]
struct MemoryHandle {
    shared: Arc<Shared>,
}

impl FileHandle for MemoryHandle {
    fn size(&self) -> StorageResult<u64> {
        Ok(self.shared.data.read().len() as u64)
    }

    fn seek_end(&mut self) -> StorageResult<u64> {
        self.size()
    }

    fn write_at(&mut self, bytes: &[u8], offset: u64) -> StorageResult<()> {
        if take_failure(&self.shared.failing_writes) {
            return Err(StorageError::Injected(format!(
                "write of {} bytes at offset {offset}",
                bytes.len()
            )));
        }

        let mut data = self.shared.data.write();
        let start = offset as usize;
        let end = start + bytes.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn read_at(&mut self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.shared.data.read();
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[start..end].to_vec())
    }

    fn sync(&mut self) -> StorageResult<()> {
        // Nothing is buffered outside the shared vector
        if take_failure(&self.shared.failing_syncs) {
            return Err(StorageError::Injected("sync".into()));
        }
        Ok(())
    }
}

/// Consumes one pending injected failure, if any.
fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

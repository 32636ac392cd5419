//! File handle and handle pool trait definitions.

use crate::error::StorageResult;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// A positioned read/write handle onto a single flat file.
///
/// Handles do not interpret the bytes they move. All offsets are absolute.
///
/// # Invariants
///
/// - `seek_end` returns the current file size, which is where the next
///   record must be written
/// - `write_at` writes all of `data` at `offset` or fails; writing at the
///   current end extends the file
/// - `read_at` returns exactly the bytes previously written at that offset
pub trait FileHandle: Send {
    /// Returns the current size of the file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Positions the handle at the end of the file and returns that offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the seek fails.
    fn seek_end(&mut self) -> StorageResult<u64>;

    /// Writes all of `data` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs. On error an unknown prefix
    /// of `data` may have reached the file.
    fn write_at(&mut self, data: &[u8], offset: u64) -> StorageResult<()>;

    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The read would extend beyond the current size
    /// - An I/O error occurs
    fn read_at(&mut self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Reads the whole file.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read_all(&mut self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        let len = usize::try_from(size).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("file of {size} bytes does not fit in memory"),
            )
        })?;
        self.read_at(0, len)
    }

    /// Flushes data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;
}

/// A pool that lends out [`FileHandle`]s for one file.
///
/// Callers should not use `checkout`/`checkin` directly; use
/// [`PooledHandle::acquire`], which guarantees the handle is returned.
pub trait HandlePool: Send + Sync {
    /// Takes a handle out of the pool, opening a new one if none is idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is closed or a handle cannot be opened.
    fn checkout(&self) -> StorageResult<Box<dyn FileHandle>>;

    /// Returns a handle to the pool for reuse.
    fn checkin(&self, handle: Box<dyn FileHandle>);

    /// Drops a handle that must not be reused.
    fn discard(&self, handle: Box<dyn FileHandle>) {
        drop(handle);
    }

    /// Closes the pool. Idle handles are released and further checkouts fail.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing handles fails.
    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// A handle borrowed from a [`HandlePool`] for the duration of a scope.
///
/// The handle goes back to its pool when the guard is dropped, including on
/// early `?` returns and panics.
pub struct PooledHandle<'a> {
    pool: &'a dyn HandlePool,
    handle: Option<Box<dyn FileHandle>>,
}

impl<'a> PooledHandle<'a> {
    /// Checks a handle out of `pool`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot supply a handle.
    pub fn acquire(pool: &'a dyn HandlePool) -> StorageResult<Self> {
        let handle = pool.checkout()?;
        Ok(Self {
            pool,
            handle: Some(handle),
        })
    }

    /// Releases the handle without returning it for reuse.
    pub fn discard(mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.discard(handle);
        }
    }
}

impl Deref for PooledHandle<'_> {
    type Target = dyn FileHandle;

    fn deref(&self) -> &Self::Target {
        match &self.handle {
            Some(handle) => handle.as_ref(),
            None => unreachable!("pooled handle used after release"),
        }
    }
}

impl DerefMut for PooledHandle<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.handle {
            Some(handle) => handle.as_mut(),
            None => unreachable!("pooled handle used after release"),
        }
    }
}

impl Drop for PooledHandle<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.checkin(handle);
        }
    }
}

impl fmt::Debug for PooledHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledHandle")
            .field("held", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryPool, StorageError};

    fn fallible(pool: &InMemoryPool) -> StorageResult<()> {
        let mut handle = PooledHandle::acquire(pool)?;
        handle.read_at(100, 1)?;
        Ok(())
    }

    #[test]
    fn guard_returns_handle_on_drop() {
        let pool = InMemoryPool::new();
        {
            let _handle = PooledHandle::acquire(&pool).unwrap();
            assert_eq!(pool.outstanding(), 1);
        }
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn guard_returns_handle_on_error_path() {
        let pool = InMemoryPool::new();
        let result = fallible(&pool);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn discard_releases_handle() {
        let pool = InMemoryPool::new();
        let handle = PooledHandle::acquire(&pool).unwrap();
        handle.discard();
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn read_all_reads_whole_buffer() {
        let pool = InMemoryPool::with_data(b"binlog bytes".to_vec());
        let mut handle = PooledHandle::acquire(&pool).unwrap();
        assert_eq!(handle.read_all().unwrap(), b"binlog bytes");
    }
}

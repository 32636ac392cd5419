//! File-backed handle pool for persistent logs.

use crate::error::{StorageError, StorageResult};
use crate::handle::{FileHandle, HandlePool};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Options controlling how a [`FilePool`] opens and caches handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Create the file if it does not exist.
    pub create_if_missing: bool,
    /// Maximum number of idle handles kept for reuse.
    pub max_idle: usize,
    /// Idle handles older than this are closed instead of reused.
    pub idle_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            max_idle: 8,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// A handle onto an OS file.
#[derive(Debug)]
pub struct OsFileHandle {
    file: File,
}

impl OsFileHandle {
    fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| StorageError::from_open(path, e))?;
        Ok(Self { file })
    }

    /// Opens a read-only handle onto an existing file.
    ///
    /// Takes no lock and creates nothing, so it works on files the current
    /// user cannot write. Writes through this handle fail with an I/O error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be read.
    pub fn open_read_only(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|e| StorageError::from_open(path, e))?;
        Ok(Self { file })
    }
}

impl FileHandle for OsFileHandle {
    fn size(&self) -> StorageResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn seek_end(&mut self) -> StorageResult<u64> {
        Ok(self.file.seek(SeekFrom::End(0))?)
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> StorageResult<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.flush()?;
        Ok(())
    }

    fn read_at(&mut self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        self.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        self.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// A pool of OS file handles onto one log file.
///
/// The pool holds an advisory exclusive lock on `<file>.lock` for its whole
/// lifetime, so two pools (in this or another process) cannot own the same
/// log at once.
///
/// # Example
///
/// ```no_run
/// use kvlog_storage::{FilePool, PoolOptions, PooledHandle};
/// use std::path::Path;
///
/// let pool = FilePool::open(Path::new("binlog"), PoolOptions::default()).unwrap();
/// let mut handle = PooledHandle::acquire(&pool).unwrap();
/// let end = handle.seek_end().unwrap();
/// handle.write_at(b"record", end).unwrap();
/// handle.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FilePool {
    path: PathBuf,
    options: PoolOptions,
    idle: Mutex<VecDeque<IdleHandle>>,
    closed: AtomicBool,
    _lock_file: File,
}

struct IdleHandle {
    handle: Box<dyn FileHandle>,
    since: Instant,
}

impl std::fmt::Debug for IdleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleHandle")
            .field("since", &self.since)
            .finish_non_exhaustive()
    }
}

impl FilePool {
    /// Opens a pool over the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file exists but is not both readable and writable
    ///   (`PermissionDenied`)
    /// - The file does not exist and `create_if_missing` is false
    /// - Another pool holds the lock (`Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path, options: PoolOptions) -> StorageResult<Self> {
        if path.exists() {
            let metadata = fs::metadata(path)?;
            if metadata.permissions().readonly() {
                return Err(StorageError::PermissionDenied {
                    path: path.to_path_buf(),
                });
            }
        }

        // Opening once up front surfaces permission and existence problems
        // before any caller gets a handle.
        let opened = OpenOptions::new()
            .read(true)
            .write(true)
            .create(options.create_if_missing)
            .truncate(false)
            .open(path)
            .map_err(|e| StorageError::from_open(path, e))?;

        let lock_path = lock_path_for(path);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StorageError::from_open(&lock_path, e))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked {
                path: path.to_path_buf(),
            });
        }

        let mut idle = VecDeque::with_capacity(options.max_idle);
        if options.max_idle > 0 {
            idle.push_back(IdleHandle {
                handle: Box::new(OsFileHandle { file: opened }),
                since: Instant::now(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            options,
            idle: Mutex::new(idle),
            closed: AtomicBool::new(false),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of idle handles currently cached.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    fn evict_expired(&self, idle: &mut VecDeque<IdleHandle>) {
        let timeout = self.options.idle_timeout;
        let before = idle.len();
        idle.retain(|entry| entry.since.elapsed() < timeout);
        let evicted = before - idle.len();
        if evicted > 0 {
            debug!(path = %self.path.display(), evicted, "closed expired log handles");
        }
    }
}

impl HandlePool for FilePool {
    fn checkout(&self) -> StorageResult<Box<dyn FileHandle>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }

        {
            let mut idle = self.idle.lock();
            self.evict_expired(&mut idle);
            if let Some(entry) = idle.pop_back() {
                return Ok(entry.handle);
            }
        }

        Ok(Box::new(OsFileHandle::open(&self.path)?))
    }

    fn checkin(&self, handle: Box<dyn FileHandle>) {
        if self.closed.load(Ordering::Acquire) || self.options.max_idle == 0 {
            return;
        }

        let mut idle = self.idle.lock();
        self.evict_expired(&mut idle);
        idle.push_back(IdleHandle {
            handle,
            since: Instant::now(),
        });
        while idle.len() > self.options.max_idle {
            idle.pop_front();
        }
    }

    fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::Release);
        let mut idle = self.idle.lock();
        for mut entry in idle.drain(..) {
            entry.handle.sync()?;
        }
        Ok(())
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

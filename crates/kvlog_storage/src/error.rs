//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while acquiring or using a file handle.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of the file.
    #[error("read beyond end of file: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current file size.
        size: u64,
    },

    /// The file exists but cannot be opened for both reading and writing.
    #[error("permission denied to log file: {}", path.display())]
    PermissionDenied {
        /// Path of the offending file.
        path: PathBuf,
    },

    /// Another pool already holds the advisory lock on this file.
    #[error("log file is locked by another owner: {}", path.display())]
    Locked {
        /// Path of the locked file.
        path: PathBuf,
    },

    /// The pool has been closed.
    #[error("handle pool is closed")]
    Closed,

    /// A failure injected by a test pool.
    #[error("injected failure: {0}")]
    Injected(String),
}

impl StorageError {
    /// Classifies an error from opening `path`, lifting OS permission
    /// failures into [`StorageError::PermissionDenied`].
    pub(crate) fn from_open(path: &std::path::Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io(err)
        }
    }
}

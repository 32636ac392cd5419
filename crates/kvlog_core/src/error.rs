//! Error types for kvlog core.

use kvlog_storage::StorageError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// The length-prefixed part of a record that overflowed its encoding width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingField {
    /// Table name (8-bit length).
    Table,
    /// Key (8-bit length).
    Key,
    /// Value (24-bit length).
    Value,
    /// Whole payload (32-bit length).
    Payload,
}

impl fmt::Display for EncodingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Table => "table name",
            Self::Key => "key",
            Self::Value => "value",
            Self::Payload => "payload",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in binlog operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Handle acquisition, seek, read or write failed.
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The log file exists but is not readable and writable.
    #[error("permission denied to binlog file: {}", path.display())]
    PermissionDenied {
        /// Path of the log file.
        path: PathBuf,
    },

    /// A field is too long for its length prefix. Nothing was written.
    #[error("{field} length {len} exceeds maximum of {max} bytes")]
    Encoding {
        /// The offending field.
        field: EncodingField,
        /// Its actual length.
        len: usize,
        /// The largest length the format can hold.
        max: usize,
    },

    /// A table has no writes, so the record could not carry it.
    #[error("table {table:?} has no writes")]
    EmptyTable {
        /// Name of the empty table.
        table: Vec<u8>,
    },

    /// A record or payload failed structural validation.
    #[error("WAL corruption: {message}")]
    WalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::PermissionDenied { path } => Self::PermissionDenied { path },
            other => Self::Storage(other),
        }
    }
}

impl CoreError {
    /// Creates an encoding error.
    pub fn encoding(field: EncodingField, len: usize, max: usize) -> Self {
        Self::Encoding { field, len, max }
    }

    /// Creates a WAL corruption error.
    pub fn wal_corruption(message: impl Into<String>) -> Self {
        Self::WalCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for failures of the underlying file or handle pool.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_error_is_lifted_from_storage() {
        let err: CoreError = StorageError::PermissionDenied {
            path: PathBuf::from("db/binlog"),
        }
        .into();
        assert!(matches!(err, CoreError::PermissionDenied { .. }));
        assert!(!err.is_io());
    }

    #[test]
    fn storage_failures_are_io() {
        let err: CoreError = StorageError::Closed.into();
        assert!(err.is_io());
    }

    #[test]
    fn encoding_message() {
        let err = CoreError::encoding(EncodingField::Table, 300, 255);
        assert_eq!(
            err.to_string(),
            "table name length 300 exceeds maximum of 255 bytes"
        );
    }
}

//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod verify;

use kvlog_core::CoreError;
use kvlog_storage::{FileHandle, OsFileHandle, StorageError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The log file does not exist.
    #[error("binlog not found at {}", path.display())]
    NotFound {
        /// The path that was given.
        path: PathBuf,
    },

    /// Opening or reading the log failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Decoding a record failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Verification found damage.
    #[error("verification failed: {regions} corrupted region(s), {bytes} byte(s)")]
    VerificationFailed {
        /// Number of damaged regions.
        regions: u64,
        /// Total damaged bytes.
        bytes: u64,
    },
}

/// Reads a whole log file without taking its lock.
///
/// The file is opened read-only and nothing is created next to it, so logs
/// on read-only media can be inspected. A log that a running store is
/// appending to may show a torn tail.
pub fn read_log(path: &Path) -> Result<Vec<u8>, CliError> {
    if !path.exists() {
        return Err(CliError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let image = OsFileHandle::open_read_only(path)?.read_all()?;
    debug!(path = %path.display(), bytes = image.len(), "read binlog");
    Ok(image)
}

/// Renders bytes as UTF-8 when printable, otherwise as hex.
pub fn display_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => {
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            format!("0x{hex}")
        }
    }
}

//! # kvlog storage
//!
//! Pooled file-handle access for the kvlog binlog.
//!
//! The binlog never owns an open file directly. Every append, synced-flag
//! write and recovery read borrows a handle from a [`HandlePool`] for the
//! duration of one operation and hands it back afterwards. Handles are
//! **opaque byte stores**: they know nothing about record layout.
//!
//! ## Design Principles
//!
//! - Acquisition is scoped: [`PooledHandle`] returns its handle to the pool
//!   when dropped, on every exit path
//! - Pools must be `Send + Sync`; handles must be `Send`
//! - Offsets are absolute byte positions in a single flat file
//!
//! ## Available Pools
//!
//! - [`FilePool`] - OS file handles with an idle-handle cache
//! - [`InMemoryPool`] - shared in-memory buffer with fault injection, for tests
//!
//! ## Example
//!
//! ```rust
//! use kvlog_storage::{InMemoryPool, PooledHandle};
//!
//! let pool = InMemoryPool::new();
//! let mut handle = PooledHandle::acquire(&pool).unwrap();
//! let end = handle.seek_end().unwrap();
//! handle.write_at(b"hello world", end).unwrap();
//! assert_eq!(handle.read_at(0, 5).unwrap(), b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod handle;
mod memory;

pub use error::{StorageError, StorageResult};
pub use file::{FilePool, OsFileHandle, PoolOptions};
pub use handle::{FileHandle, HandlePool, PooledHandle};
pub use memory::InMemoryPool;

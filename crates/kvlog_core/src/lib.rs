//! # kvlog core
//!
//! The transaction binlog of an embedded key-value store.
//!
//! Committed transactions are appended to a flat log file before (or while)
//! their data is folded into the main store. Once the main store confirms a
//! transaction is durable, its record is marked synced in place. On restart
//! the log is scanned from byte 0 and every unsynced record is replayed.
//!
//! This crate provides:
//! - The record codec ([`wal::encode_record`], [`wal::decode_payload`])
//! - Serialized appends returning record offsets ([`BinLog::append`])
//! - In-place synced-flag updates ([`BinLog::mark_synced`])
//! - The pending queue shared with the flush path ([`PendingQueue`])
//! - Crash recovery with byte-granular resynchronization ([`BinLog::recover`])
//!
//! ## Example
//!
//! ```rust
//! use kvlog_core::{BinLog, Config, MemStore, Transaction, TransactionId};
//! use kvlog_storage::InMemoryPool;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemStore::new());
//! let log = BinLog::with_pool(Arc::new(InMemoryPool::new()), &Config::default(), store);
//! log.recover().unwrap();
//!
//! let mut tx = Transaction::new(TransactionId::new(1));
//! tx.put("users", "alice", "admin");
//! let offset = log.append(&tx).unwrap();
//!
//! assert_eq!(log.pending_entries()[0].offset, offset);
//! log.mark_synced(offset).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod binlog;
mod config;
mod error;
mod store;
mod types;
pub mod wal;

pub use binlog::BinLog;
pub use config::Config;
pub use error::{CoreError, CoreResult, EncodingField};
pub use store::{MainStore, MemStore};
pub use types::{Table, TableMap, Transaction, TransactionId};
pub use wal::{PendingEntry, PendingQueue, RecoveryReport};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

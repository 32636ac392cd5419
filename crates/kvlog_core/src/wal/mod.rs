//! Transaction binlog: record format, appends, sync flags and recovery.
//!
//! Every committed transaction becomes one record appended at the end of a
//! single flat file. Records are never rewritten, except for the one-byte
//! synced flag at the start of each record.
//!
//! ## Record Format
//!
//! ```text
//! | synced (1) | payload_len (4) | txid (8) | payload (payload_len) | txid (8) |
//! ```
//!
//! Integers are little-endian. The payload is a run of field entries:
//!
//! ```text
//! | table_len (1) | key_len (1) | value_len (3, big-endian) | table | key | value |
//! ```
//!
//! ## Recovery Policy
//!
//! There is no checksum. A record is accepted when its header fits in the
//! file, its declared length does not overrun the file, the trailing txid
//! equals the header txid, and its payload walks cleanly into field entries.
//!
//! Anything else is treated as corruption and skipped **one byte at a time**
//! until a valid record boundary is found again. Corruption never aborts
//! recovery: a damaged region can only hold transactions that were never
//! confirmed synced, so the main store had no guarantee for them either.
//!
//! ## Locking
//!
//! Appends, synced-flag writes and recovery all take the same per-log
//! exclusive lock, so no operation observes another's partial write.

mod queue;
mod record;
mod recovery;
mod scanner;
mod sync;
mod writer;

pub use queue::{PendingEntry, PendingQueue};
pub use record::{
    decode_payload, encode_record, encoded_len, payload_is_well_formed, record_len, RecordHeader,
    FIELD_PREFIX_SIZE, FLAG_SYNCED, FLAG_UNSYNCED, HEADER_SIZE, MAX_KEY_LEN,
    MAX_TABLE_LEN, MAX_VALUE_LEN, TRAILER_SIZE,
};
pub use recovery::RecoveryReport;
pub use scanner::{RawRecord, RecordScanner, ScanItem};
pub use writer::LogWriter;

//! Benchmark utilities.

use kvlog_core::wal::encode_record;
use kvlog_core::{Transaction, TransactionId};

/// Generate deterministic value bytes of the specified size.
pub fn value_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Build a transaction with `writes` entries, each holding a value of `value_size` bytes.
pub fn transaction(id: i64, writes: usize, value_size: usize) -> Transaction {
    let mut tx = Transaction::new(TransactionId::new(id));
    for i in 0..writes {
        tx.put("bench", format!("key-{id}-{i}"), value_data(value_size));
    }
    tx
}

/// Build a log image of `records` unsynced records, with `junk` garbage
/// bytes inserted after every tenth record.
pub fn log_image(records: usize, value_size: usize, junk: usize) -> Vec<u8> {
    let mut image = Vec::new();
    for id in 0..records {
        let tx = transaction(id as i64, 4, value_size);
        if let Ok(record) = encode_record(tx.id(), tx.tables()) {
            image.extend_from_slice(&record);
        }
        if junk > 0 && id % 10 == 9 {
            image.extend(std::iter::repeat(0xFF).take(junk));
        }
    }
    image
}

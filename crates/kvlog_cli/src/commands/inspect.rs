//! Inspect command implementation.

use super::{read_log, CliError};
use kvlog_core::wal::{RecordScanner, ScanItem, FIELD_PREFIX_SIZE};
use serde::Serialize;
use std::path::Path;

/// Binlog inspection result.
#[derive(Debug, Default, Serialize)]
pub struct InspectResult {
    /// Log file path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Number of valid records.
    pub record_count: u64,
    /// Records whose synced flag is set.
    pub synced_count: u64,
    /// Records still waiting to be synced.
    pub unsynced_count: u64,
    /// Field entries across all records.
    pub entry_count: u64,
    /// Payload bytes across all records.
    pub payload_bytes: u64,
    /// Damaged regions skipped.
    pub corrupt_regions: u64,
    /// Bytes inside damaged regions.
    pub corrupt_bytes: u64,
    /// Smallest transaction ID seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_txid: Option<i64>,
    /// Largest transaction ID seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_txid: Option<i64>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let image = read_log(path)?;
    let result = summarize(&path.display().to_string(), &image)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Scans a log image and tallies what it holds.
pub fn summarize(path: &str, image: &[u8]) -> Result<InspectResult, CliError> {
    let mut result = InspectResult {
        path: path.to_string(),
        file_size: image.len() as u64,
        ..InspectResult::default()
    };

    for item in RecordScanner::new(image) {
        match item {
            ScanItem::Record(record) => {
                result.record_count += 1;
                if record.header.is_synced() {
                    result.synced_count += 1;
                } else {
                    result.unsynced_count += 1;
                }
                result.payload_bytes += u64::from(record.header.payload_len);
                result.entry_count += count_entries(&record.decode()?);

                let txid = record.header.txid.as_i64();
                result.min_txid = Some(result.min_txid.map_or(txid, |m| m.min(txid)));
                result.max_txid = Some(result.max_txid.map_or(txid, |m| m.max(txid)));
            }
            ScanItem::Skipped { len, .. } => {
                result.corrupt_regions += 1;
                result.corrupt_bytes += len;
            }
        }
    }

    Ok(result)
}

fn count_entries(tables: &kvlog_core::TableMap) -> u64 {
    tables.values().map(|table| table.len() as u64).sum()
}

fn print_text_output(result: &InspectResult) {
    println!("Binlog: {}", result.path);
    println!("================");
    println!();
    println!("File size:        {} bytes", result.file_size);
    println!("Records:          {}", result.record_count);
    println!("  synced:         {}", result.synced_count);
    println!("  unsynced:       {}", result.unsynced_count);
    println!("Entries:          {}", result.entry_count);
    println!(
        "Payload bytes:    {} ({} in entry prefixes)",
        result.payload_bytes,
        result.entry_count * FIELD_PREFIX_SIZE as u64
    );
    if let (Some(min), Some(max)) = (result.min_txid, result.max_txid) {
        println!("Transaction IDs:  {min}..={max}");
    }
    println!();
    if result.corrupt_regions == 0 {
        println!("No corrupted regions");
    } else {
        println!(
            "Corrupted:        {} region(s), {} byte(s)",
            result.corrupt_regions, result.corrupt_bytes
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvlog_core::wal::encode_record;
    use kvlog_core::{Transaction, TransactionId};

    fn record(id: i64, writes: &[(&str, &str)]) -> Vec<u8> {
        let mut tx = Transaction::new(TransactionId::new(id));
        for (key, value) in writes {
            tx.put("t", *key, *value);
        }
        encode_record(tx.id(), tx.tables()).unwrap()
    }

    #[test]
    fn summarize_counts_records_and_entries() {
        let mut first = record(4, &[("a", "1"), ("b", "2")]);
        first[0] = 1;
        let image = [first, record(9, &[("c", "3")])].concat();

        let result = summarize("binlog", &image).unwrap();
        assert_eq!(result.record_count, 2);
        assert_eq!(result.synced_count, 1);
        assert_eq!(result.unsynced_count, 1);
        assert_eq!(result.entry_count, 3);
        assert_eq!(result.min_txid, Some(4));
        assert_eq!(result.max_txid, Some(9));
        assert_eq!(result.corrupt_regions, 0);
    }

    #[test]
    fn summarize_counts_damage() {
        let image = [record(1, &[("a", "1")]), vec![0xFF; 3]].concat();

        let result = summarize("binlog", &image).unwrap();
        assert_eq!(result.record_count, 1);
        assert_eq!(result.corrupt_regions, 1);
        assert_eq!(result.corrupt_bytes, 3);
    }

    #[test]
    fn empty_log_has_no_txids() {
        let result = summarize("binlog", &[]).unwrap();
        assert_eq!(result.record_count, 0);
        assert!(result.min_txid.is_none());
    }
}

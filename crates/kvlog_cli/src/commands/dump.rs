//! Dump command implementation.

use super::{display_bytes, read_log, CliError};
use kvlog_core::wal::{RecordScanner, ScanItem};
use serde::Serialize;
use std::path::Path;

/// One line of dump output.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DumpItem {
    /// A valid record.
    Record {
        /// Offset of the record header.
        offset: u64,
        /// Record length on disk.
        len: u64,
        /// Transaction ID.
        txid: i64,
        /// Synced flag.
        synced: bool,
        /// Number of field entries.
        entry_count: usize,
        /// The entries themselves, if requested.
        #[serde(skip_serializing_if = "Option::is_none")]
        entries: Option<Vec<EntryInfo>>,
    },
    /// A damaged region.
    Skipped {
        /// Offset of the first damaged byte.
        offset: u64,
        /// Number of damaged bytes.
        len: u64,
    },
}

/// One table/key/value write.
#[derive(Debug, Serialize)]
pub struct EntryInfo {
    /// Table name.
    pub table: String,
    /// Key.
    pub key: String,
    /// Value.
    pub value: String,
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    start_offset: u64,
    with_entries: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = read_log(path)?;
    let items = collect_items(&image, start_offset, limit, with_entries)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        _ => {
            print_text_output(&items);
        }
    }

    Ok(())
}

/// Scans from `start_offset`, collecting at most `limit` records.
///
/// Skipped regions are always included and do not count toward the limit.
pub fn collect_items(
    image: &[u8],
    start_offset: u64,
    limit: Option<usize>,
    with_entries: bool,
) -> Result<Vec<DumpItem>, CliError> {
    let start = usize::try_from(start_offset).unwrap_or(usize::MAX);
    let max_records = limit.unwrap_or(usize::MAX);
    let mut records = 0;
    let mut items = Vec::new();

    for item in RecordScanner::starting_at(image, start) {
        if records >= max_records {
            break;
        }
        match item {
            ScanItem::Record(record) => {
                let tables = record.decode()?;
                let entry_count = tables.values().map(|table| table.len()).sum();
                let entries = with_entries.then(|| {
                    tables
                        .iter()
                        .flat_map(|(table, writes)| {
                            writes.iter().map(move |(key, value)| EntryInfo {
                                table: display_bytes(table),
                                key: display_bytes(key),
                                value: display_bytes(value),
                            })
                        })
                        .collect()
                });
                items.push(DumpItem::Record {
                    offset: record.offset,
                    len: record.len(),
                    txid: record.header.txid.as_i64(),
                    synced: record.header.is_synced(),
                    entry_count,
                    entries,
                });
                records += 1;
            }
            ScanItem::Skipped { offset, len } => {
                items.push(DumpItem::Skipped { offset, len });
            }
        }
    }

    Ok(items)
}

fn print_text_output(items: &[DumpItem]) {
    println!("Binlog Records");
    println!("================");
    println!();

    for item in items {
        match item {
            DumpItem::Record {
                offset,
                len,
                txid,
                synced,
                entry_count,
                entries,
            } => {
                let state = if *synced { "SYNCED" } else { "PENDING" };
                println!("[{offset:08}] {state:8} txid={txid} len={len} entries={entry_count}");
                for entry in entries.iter().flatten() {
                    println!("           {}/{} = {}", entry.table, entry.key, entry.value);
                }
            }
            DumpItem::Skipped { offset, len } => {
                println!("[{offset:08}] SKIPPED  {len} corrupted byte(s)");
            }
        }
    }
}

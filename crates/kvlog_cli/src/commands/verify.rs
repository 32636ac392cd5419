//! Verify command implementation.

use super::{read_log, CliError};
use kvlog_core::wal::{RecordScanner, ScanItem};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of bytes checked.
    pub bytes_checked: u64,
    /// Number of valid records.
    pub valid_records: u64,
    /// Valid records still waiting to be synced.
    pub unsynced_records: u64,
    /// Damaged regions as `(offset, len)`.
    pub corrupt_regions: Vec<(u64, u64)>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.corrupt_regions.is_empty()
    }

    fn corrupt_bytes(&self) -> u64 {
        self.corrupt_regions.iter().map(|(_, len)| len).sum()
    }
}

/// Runs the verify command.
///
/// Fails with [`CliError::VerificationFailed`] when any region is damaged,
/// which gives the process a non-zero exit status.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying binlog at {}", path.display());
    println!();

    let image = read_log(path)?;
    let result = verify_image(&image);
    print_result(&result);

    println!();
    if result.is_ok() {
        println!("✓ Binlog verification passed");
        Ok(())
    } else {
        println!("✗ Binlog verification failed");
        Err(CliError::VerificationFailed {
            regions: result.corrupt_regions.len() as u64,
            bytes: result.corrupt_bytes(),
        }
        .into())
    }
}

/// Scans a log image for damaged regions.
pub fn verify_image(image: &[u8]) -> VerifyResult {
    let mut result = VerifyResult {
        bytes_checked: image.len() as u64,
        ..VerifyResult::default()
    };

    for item in RecordScanner::new(image) {
        match item {
            ScanItem::Record(record) => {
                result.valid_records += 1;
                if !record.header.is_synced() {
                    result.unsynced_records += 1;
                }
            }
            ScanItem::Skipped { offset, len } => {
                result.corrupt_regions.push((offset, len));
            }
        }
    }

    result
}

fn print_result(result: &VerifyResult) {
    println!("  Bytes checked:    {}", result.bytes_checked);
    println!("  Valid records:    {}", result.valid_records);
    println!("  Unsynced records: {}", result.unsynced_records);
    println!("  Corrupt regions:  {}", result.corrupt_regions.len());

    for (offset, len) in result.corrupt_regions.iter().take(10) {
        println!("    - {len} byte(s) at offset {offset}");
    }
    if result.corrupt_regions.len() > 10 {
        println!(
            "    ... and {} more regions",
            result.corrupt_regions.len() - 10
        );
    }
}

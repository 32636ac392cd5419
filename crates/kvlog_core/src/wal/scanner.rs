//! Byte-granular record scanning over a whole log image.

use crate::error::CoreResult;
use crate::types::TableMap;
use crate::wal::record::{
    decode_payload, payload_is_well_formed, read_txid, RecordHeader, HEADER_SIZE,
};

/// A structurally valid record found by [`RecordScanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    /// Offset of the record's header.
    pub offset: u64,
    /// The parsed header.
    pub header: RecordHeader,
    /// Payload bytes between header and trailer.
    pub payload: &'a [u8],
}

impl RawRecord<'_> {
    /// Returns the record's length on disk.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.header.record_len()
    }

    /// Returns true if the record carries no field entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Decodes the record's writes.
    ///
    /// # Errors
    ///
    /// Never fails for records produced by the scanner, whose payloads have
    /// already been walked; returns `WalCorruption` otherwise.
    pub fn decode(&self) -> CoreResult<TableMap> {
        decode_payload(self.payload)
    }
}

/// One step of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanItem<'a> {
    /// A valid record.
    Record(RawRecord<'a>),
    /// A run of bytes where no valid record starts.
    Skipped {
        /// Offset of the first skipped byte.
        offset: u64,
        /// Number of consecutive bytes skipped.
        len: u64,
    },
}

/// Walks a log image from a starting offset, resynchronizing past damage.
///
/// At each candidate offset the scanner checks that a header fits, that the
/// declared payload does not overrun the image, that the trailing txid
/// matches the header txid, and that the payload splits into field entries.
/// A valid record advances the scan by its full length; anything else
/// advances it by exactly one byte. Consecutive rejected bytes are reported
/// as a single [`ScanItem::Skipped`] run.
#[derive(Debug, Clone)]
pub struct RecordScanner<'a> {
    image: &'a [u8],
    pos: usize,
}

impl<'a> RecordScanner<'a> {
    /// Creates a scanner over `image` starting at byte 0.
    #[must_use]
    pub fn new(image: &'a [u8]) -> Self {
        Self { image, pos: 0 }
    }

    /// Creates a scanner starting at `offset`.
    #[must_use]
    pub fn starting_at(image: &'a [u8], offset: usize) -> Self {
        Self {
            image,
            pos: offset.min(image.len()),
        }
    }

    /// Returns the record starting exactly at `at`, if one is valid there.
    #[must_use]
    pub fn record_at(&self, at: usize) -> Option<RawRecord<'a>> {
        let rest = self.image.get(at..)?;
        let header = RecordHeader::parse(rest)?;
        if header.record_len() > rest.len() as u64 {
            return None;
        }

        let payload_end = HEADER_SIZE + header.payload_len as usize;
        if read_txid(rest, payload_end)? != header.txid {
            return None;
        }

        let payload = &rest[HEADER_SIZE..payload_end];
        if !payload_is_well_formed(payload) {
            return None;
        }

        Some(RawRecord {
            offset: at as u64,
            header,
            payload,
        })
    }
}

impl<'a> Iterator for RecordScanner<'a> {
    type Item = ScanItem<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.pos;
        while self.pos < self.image.len() {
            if let Some(record) = self.record_at(self.pos) {
                if self.pos > start {
                    // Report the damaged run first; the record is picked up
                    // again on the next call.
                    return Some(ScanItem::Skipped {
                        offset: start as u64,
                        len: (self.pos - start) as u64,
                    });
                }
                self.pos += record.len() as usize;
                return Some(ScanItem::Record(record));
            }
            self.pos += 1;
        }

        (self.pos > start).then(|| ScanItem::Skipped {
            offset: start as u64,
            len: (self.pos - start) as u64,
        })
    }
}

//! Record encoding and decoding.
//!
//! Pure byte manipulation; no I/O happens here.

use crate::error::{CoreError, CoreResult, EncodingField};
use crate::types::{Table, TableMap, TransactionId};

/// Header size: synced (1) + payload length (4) + txid (8).
pub const HEADER_SIZE: usize = 13;

/// Trailer size: txid (8).
pub const TRAILER_SIZE: usize = 8;

/// Field entry prefix: table length (1) + key length (1) + value length (3).
pub const FIELD_PREFIX_SIZE: usize = 5;

/// Synced flag of a record that the main store has not yet confirmed.
pub const FLAG_UNSYNCED: u8 = 0;

/// Synced flag of a record whose data is durable in the main store.
pub const FLAG_SYNCED: u8 = 1;

/// Longest table name an 8-bit length can describe.
pub const MAX_TABLE_LEN: usize = u8::MAX as usize;

/// Longest key an 8-bit length can describe.
pub const MAX_KEY_LEN: usize = u8::MAX as usize;

/// Longest value a 24-bit length can describe.
pub const MAX_VALUE_LEN: usize = 0x00FF_FFFF;

const PAYLOAD_LEN_RANGE: std::ops::Range<usize> = 1..5;
const TXID_RANGE: std::ops::Range<usize> = 5..13;

/// The fixed-size header at the start of every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Raw synced flag byte.
    pub flag: u8,
    /// Number of payload bytes between header and trailer.
    pub payload_len: u32,
    /// Transaction id, repeated in the trailer.
    pub txid: TransactionId,
}

impl RecordHeader {
    /// Parses a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// Returns `None` if fewer than [`HEADER_SIZE`] bytes are given.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        let payload_len = u32::from_le_bytes(bytes[PAYLOAD_LEN_RANGE].try_into().ok()?);
        let txid = i64::from_le_bytes(bytes[TXID_RANGE].try_into().ok()?);
        Some(Self {
            flag: bytes[0],
            payload_len,
            txid: TransactionId::new(txid),
        })
    }

    /// Returns true if the main store has confirmed this record.
    ///
    /// Any non-zero flag counts as synced.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        self.flag != FLAG_UNSYNCED
    }

    /// Returns the full record length, header and trailer included.
    #[must_use]
    pub const fn record_len(&self) -> u64 {
        (HEADER_SIZE + TRAILER_SIZE) as u64 + self.payload_len as u64
    }
}

/// Returns the full record length for a payload of `payload_len` bytes.
#[must_use]
pub const fn record_len(payload_len: usize) -> usize {
    HEADER_SIZE + payload_len + TRAILER_SIZE
}

/// Returns the payload length `tables` would encode to.
///
/// Does not check field widths; [`encode_record`] does.
#[must_use]
pub fn encoded_len(tables: &TableMap) -> usize {
    tables
        .iter()
        .flat_map(|(table, entries)| {
            entries
                .iter()
                .map(move |(key, value)| FIELD_PREFIX_SIZE + table.len() + key.len() + value.len())
        })
        .sum()
}

/// Encodes a complete record: header, payload and trailer.
///
/// The record is built in a single pass with a zero payload length, which is
/// patched once the payload is complete. The synced flag is always
/// [`FLAG_UNSYNCED`].
///
/// # Errors
///
/// Returns [`CoreError::Encoding`] if a table name or key is longer than 255
/// bytes, a value is longer than [`MAX_VALUE_LEN`], or the payload does not
/// fit a 32-bit length. Returns [`CoreError::EmptyTable`] if a table has no
/// writes, since decoding could not bring it back.
pub fn encode_record(txid: TransactionId, tables: &TableMap) -> CoreResult<Vec<u8>> {
    let txid_bytes = txid.as_i64().to_le_bytes();

    let mut buf = Vec::with_capacity(record_len(encoded_len(tables)));
    buf.push(FLAG_UNSYNCED);
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&txid_bytes);

    for (table, entries) in tables {
        if entries.is_empty() {
            return Err(CoreError::EmptyTable {
                table: table.clone(),
            });
        }
        let table_len = u8::try_from(table.len())
            .map_err(|_| CoreError::encoding(EncodingField::Table, table.len(), MAX_TABLE_LEN))?;

        for (key, value) in entries {
            let key_len = u8::try_from(key.len())
                .map_err(|_| CoreError::encoding(EncodingField::Key, key.len(), MAX_KEY_LEN))?;
            if value.len() > MAX_VALUE_LEN {
                return Err(CoreError::encoding(
                    EncodingField::Value,
                    value.len(),
                    MAX_VALUE_LEN,
                ));
            }
            let value_len = (value.len() as u32).to_be_bytes();

            buf.push(table_len);
            buf.push(key_len);
            buf.extend_from_slice(&value_len[1..]);
            buf.extend_from_slice(table);
            buf.extend_from_slice(key);
            buf.extend_from_slice(value);
        }
    }

    let payload_len = buf.len() - HEADER_SIZE;
    let declared = u32::try_from(payload_len)
        .map_err(|_| CoreError::encoding(EncodingField::Payload, payload_len, u32::MAX as usize))?;
    buf[PAYLOAD_LEN_RANGE].copy_from_slice(&declared.to_le_bytes());

    buf.extend_from_slice(&txid_bytes);
    Ok(buf)
}

/// Decodes a payload back into its table map.
///
/// # Errors
///
/// Returns [`CoreError::WalCorruption`] if a field entry's prefix or bytes
/// run past the end of the payload.
pub fn decode_payload(payload: &[u8]) -> CoreResult<TableMap> {
    let mut tables = TableMap::new();
    for entry in FieldEntries::new(payload) {
        let (table, key, value) = entry?;
        tables
            .entry(table.to_vec())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
    }
    Ok(tables)
}

/// Returns true if `payload` splits exactly into field entries.
#[must_use]
pub fn payload_is_well_formed(payload: &[u8]) -> bool {
    FieldEntries::new(payload).all(|entry| entry.is_ok())
}

/// Reads a little-endian txid at `at`, if eight bytes are available.
pub(crate) fn read_txid(bytes: &[u8], at: usize) -> Option<TransactionId> {
    let raw = bytes.get(at..at.checked_add(TRAILER_SIZE)?)?;
    Some(TransactionId::new(i64::from_le_bytes(raw.try_into().ok()?)))
}

/// Walks a payload one field entry at a time.
struct FieldEntries<'a> {
    payload: &'a [u8],
    cursor: usize,
    failed: bool,
}

impl<'a> FieldEntries<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            cursor: 0,
            failed: false,
        }
    }

    fn fail(&mut self, message: String) -> Option<CoreResult<(&'a [u8], &'a [u8], &'a [u8])>> {
        self.failed = true;
        Some(Err(CoreError::wal_corruption(message)))
    }
}

impl<'a> Iterator for FieldEntries<'a> {
    type Item = CoreResult<(&'a [u8], &'a [u8], &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor == self.payload.len() {
            return None;
        }

        let start = self.cursor;
        let Some(prefix) = self.payload.get(start..start + FIELD_PREFIX_SIZE) else {
            return self.fail(format!("truncated field prefix at payload offset {start}"));
        };
        let table_len = usize::from(prefix[0]);
        let key_len = usize::from(prefix[1]);
        let value_len = u32::from_be_bytes([0, prefix[2], prefix[3], prefix[4]]) as usize;

        let table_start = start + FIELD_PREFIX_SIZE;
        let key_start = table_start + table_len;
        let value_start = key_start + key_len;
        let end = value_start + value_len;
        if end > self.payload.len() {
            return self.fail(format!(
                "field entry at payload offset {start} needs {} bytes, only {} remain",
                end - start,
                self.payload.len() - start
            ));
        }

        self.cursor = end;
        Some(Ok((
            &self.payload[table_start..key_start],
            &self.payload[key_start..value_start],
            &self.payload[value_start..end],
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;
    use proptest::prelude::*;

    fn tx(id: i64, writes: &[(&str, &str, &str)]) -> Transaction {
        let mut tx = Transaction::new(TransactionId::new(id));
        for (table, key, value) in writes {
            tx.put(*table, *key, *value);
        }
        tx
    }

    fn payload_of(record: &[u8]) -> &[u8] {
        &record[HEADER_SIZE..record.len() - TRAILER_SIZE]
    }

    #[test]
    fn single_entry_layout() {
        let tx = tx(1, &[("t", "k", "v")]);
        let record = encode_record(tx.id(), tx.tables()).unwrap();

        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0,                      // synced
            8, 0, 0, 0,             // payload length
            1, 0, 0, 0, 0, 0, 0, 0, // txid
            1, 1, 0, 0, 1,          // table, key, value lengths
            b't', b'k', b'v',
            1, 0, 0, 0, 0, 0, 0, 0, // txid
        ];
        assert_eq!(record, expected);
    }

    #[test]
    fn scenario_decode_yields_written_map() {
        let tx = tx(1, &[("t", "k", "v")]);
        let record = encode_record(tx.id(), tx.tables()).unwrap();

        let decoded = decode_payload(payload_of(&record)).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[b"t".as_slice()][b"k".as_slice()], b"v".to_vec());
    }

    #[test]
    fn value_length_is_24_bit_big_endian() {
        let mut tx = Transaction::new(TransactionId::new(2));
        tx.put("t", "k", vec![7u8; 0x01_02_03]);
        let record = encode_record(tx.id(), tx.tables()).unwrap();

        assert_eq!(&record[HEADER_SIZE + 2..HEADER_SIZE + 5], &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn payload_length_covers_every_entry() {
        let tx = tx(3, &[("users", "alice", "1"), ("users", "bob", "22"), ("o", "", "")]);
        let record = encode_record(tx.id(), tx.tables()).unwrap();
        let header = RecordHeader::parse(&record).unwrap();

        let expected = (5 + 5 + 5 + 1) + (5 + 5 + 3 + 2) + (5 + 1);
        assert_eq!(header.payload_len as usize, expected);
        assert_eq!(header.record_len() as usize, record.len());
        assert_eq!(record_len(expected), record.len());
    }

    #[test]
    fn header_and_trailer_carry_txid() {
        let tx = tx(-42, &[("t", "k", "v")]);
        let record = encode_record(tx.id(), tx.tables()).unwrap();
        let header = RecordHeader::parse(&record).unwrap();

        assert_eq!(header.txid, TransactionId::new(-42));
        assert_eq!(header.flag, FLAG_UNSYNCED);
        assert!(!header.is_synced());
        assert_eq!(
            read_txid(&record, record.len() - TRAILER_SIZE),
            Some(TransactionId::new(-42))
        );
    }

    #[test]
    fn encoded_len_matches_payload() {
        let mut tx = Transaction::new(TransactionId::new(3));
        tx.put("users", "alice", "admin").put("users", "bob", "").put("t", "k", "v");

        let record = encode_record(tx.id(), tx.tables()).unwrap();
        assert_eq!(record_len(encoded_len(tx.tables())), record.len());
    }

    #[test]
    fn empty_transaction_encodes_empty_payload() {
        let record = encode_record(TransactionId::new(5), &TableMap::new()).unwrap();
        assert_eq!(record.len(), HEADER_SIZE + TRAILER_SIZE);
        assert!(decode_payload(payload_of(&record)).unwrap().is_empty());
    }

    #[test]
    fn table_name_of_300_bytes_is_rejected() {
        let mut tx = Transaction::new(TransactionId::new(1));
        tx.put(vec![b'x'; 300], "k", "v");

        let err = encode_record(tx.id(), tx.tables()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Encoding {
                field: EncodingField::Table,
                len: 300,
                max: 255
            }
        ));
    }

    #[test]
    fn oversized_key_is_rejected() {
        let mut tx = Transaction::new(TransactionId::new(1));
        tx.put("t", vec![b'k'; 256], "v");

        let err = encode_record(tx.id(), tx.tables()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Encoding {
                field: EncodingField::Key,
                ..
            }
        ));
    }

    #[test]
    fn oversized_value_is_rejected() {
        let mut tx = Transaction::new(TransactionId::new(1));
        tx.put("t", "k", vec![0u8; MAX_VALUE_LEN + 1]);

        let err = encode_record(tx.id(), tx.tables()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Encoding {
                field: EncodingField::Value,
                ..
            }
        ));
    }

    #[test]
    fn widths_at_their_limits_are_accepted() {
        let mut tx = Transaction::new(TransactionId::new(1));
        tx.put(vec![b't'; MAX_TABLE_LEN], vec![b'k'; MAX_KEY_LEN], vec![1u8; 1024]);

        let record = encode_record(tx.id(), tx.tables()).unwrap();
        assert_eq!(decode_payload(payload_of(&record)).unwrap(), *tx.tables());
    }

    #[test]
    fn table_without_writes_is_rejected() {
        let mut tables = TableMap::new();
        tables.insert(b"t".to_vec(), Table::new());

        let err = encode_record(TransactionId::new(1), &tables).unwrap_err();
        assert!(matches!(err, CoreError::EmptyTable { ref table } if table == b"t"));
    }

    #[test]
    fn table_without_writes_round_trips_through_transaction() {
        let mut tables = TableMap::new();
        tables.insert(b"t".to_vec(), Table::new());
        tables
            .entry(b"u".to_vec())
            .or_default()
            .insert(b"k".to_vec(), b"v".to_vec());

        let tx = Transaction::with_tables(TransactionId::new(1), tables);
        let record = encode_record(tx.id(), tx.tables()).unwrap();
        assert_eq!(&decode_payload(payload_of(&record)).unwrap(), tx.tables());
    }

    #[test]
    fn header_parse_needs_thirteen_bytes() {
        assert!(RecordHeader::parse(&[0u8; HEADER_SIZE - 1]).is_none());
        assert!(RecordHeader::parse(&[0u8; HEADER_SIZE]).is_some());
    }

    #[test]
    fn any_nonzero_flag_is_synced() {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0] = 7;
        assert!(RecordHeader::parse(&bytes).unwrap().is_synced());
    }

    #[test]
    fn truncated_prefix_is_corruption() {
        let payload = [1u8, 1, 0];
        assert!(matches!(
            decode_payload(&payload),
            Err(CoreError::WalCorruption { .. })
        ));
        assert!(!payload_is_well_formed(&payload));
    }

    #[test]
    fn overrunning_entry_is_corruption() {
        // Declares a 9-byte value but carries only 3 bytes of data.
        let payload = [1u8, 1, 0, 0, 9, b't', b'k', b'v'];
        assert!(decode_payload(&payload).is_err());
        assert!(!payload_is_well_formed(&payload));
    }

    #[test]
    fn empty_payload_is_well_formed() {
        assert!(payload_is_well_formed(&[]));
    }

    #[test]
    fn read_txid_out_of_bounds() {
        assert_eq!(read_txid(&[0u8; 10], 5), None);
        assert_eq!(read_txid(&[0u8; 10], usize::MAX), None);
    }

    fn arb_tables() -> impl Strategy<Value = TableMap> {
        let table = proptest::collection::btree_map(
            proptest::collection::vec(any::<u8>(), 0..=MAX_KEY_LEN),
            proptest::collection::vec(any::<u8>(), 0..512),
            0..6,
        );
        proptest::collection::btree_map(
            proptest::collection::vec(any::<u8>(), 0..=MAX_TABLE_LEN),
            table,
            0..4,
        )
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(id in any::<i64>(), tables in arb_tables()) {
            let tx = Transaction::with_tables(TransactionId::new(id), tables);
            let record = encode_record(tx.id(), tx.tables()).unwrap();
            let header = RecordHeader::parse(&record).unwrap();

            prop_assert_eq!(header.txid, TransactionId::new(id));
            prop_assert_eq!(header.record_len() as usize, record.len());
            prop_assert_eq!(&decode_payload(payload_of(&record)).unwrap(), tx.tables());
        }
    }
}

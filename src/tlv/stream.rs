//! Ordered TLV record sets.

use std::collections::{BTreeMap, btree_map::Entry};

use bytes::{Buf, Bytes};

use super::{TlvError, bigsize_len, read_bigsize, write_bigsize};

/// Largest value length accepted for a single record.
pub const MAX_RECORD_SIZE: usize = 65_535;

/// A decoded TLV stream keyed by record type.
///
/// Values are kept as raw bytes, so record types this crate knows nothing
/// about survive a decode/encode cycle unchanged. Iteration and encoding
/// always follow ascending type order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlvStream {
    records: BTreeMap<u64, Bytes>,
}

impl TlvStream {
    /// Create an empty stream.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Decode a complete TLV stream.
    ///
    /// The whole of `input` is consumed; record types must be strictly
    /// ascending and every value must fit within the remaining bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`TlvError`] describing the first framing violation found.
    ///
    /// # Examples
    ///
    /// ```
    /// use htlc_interceptor::tlv::TlvStream;
    ///
    /// let stream = TlvStream::decode(&[0x02, 0x01, 0x2a, 0x06, 0x00]).expect("valid stream");
    /// assert_eq!(stream.get(2).map(|v| v.as_ref()), Some(&[0x2a][..]));
    /// assert_eq!(stream.len(), 2);
    /// ```
    pub fn decode(mut input: &[u8]) -> Result<Self, TlvError> {
        let mut records = BTreeMap::new();
        let mut previous: Option<u64> = None;
        while input.has_remaining() {
            let record_type = read_bigsize(&mut input)?;
            if let Some(previous) = previous
                && record_type <= previous
            {
                return Err(TlvError::InvalidTypeOrder {
                    previous,
                    current: record_type,
                });
            }
            let declared = read_bigsize(&mut input)?;
            let len = usize::try_from(declared).unwrap_or(usize::MAX);
            if len > MAX_RECORD_SIZE {
                return Err(TlvError::RecordTooLarge {
                    record_type,
                    len,
                    limit: MAX_RECORD_SIZE,
                });
            }
            if input.remaining() < len {
                return Err(TlvError::UnexpectedEof {
                    needed: len,
                    available: input.remaining(),
                });
            }
            records.insert(record_type, input.copy_to_bytes(len));
            previous = Some(record_type);
        }
        Ok(Self { records })
    }

    /// Build a stream from `(type, value)` pairs in any order.
    ///
    /// # Errors
    ///
    /// Returns [`TlvError::DuplicateType`] if a type appears twice and
    /// [`TlvError::RecordTooLarge`] if a value exceeds [`MAX_RECORD_SIZE`].
    pub fn from_records<I>(records: I) -> Result<Self, TlvError>
    where
        I: IntoIterator<Item = (u64, Bytes)>,
    {
        let mut stream = Self::new();
        for (record_type, value) in records {
            check_size(record_type, &value)?;
            match stream.records.entry(record_type) {
                Entry::Occupied(_) => return Err(TlvError::DuplicateType(record_type)),
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
            }
        }
        Ok(stream)
    }

    /// Raw value of the record with `record_type`, if present.
    #[must_use]
    pub fn get(&self, record_type: u64) -> Option<&Bytes> { self.records.get(&record_type) }

    /// Insert or replace a record, returning the previous value.
    pub fn insert(&mut self, record_type: u64, value: impl Into<Bytes>) -> Option<Bytes> {
        self.records.insert(record_type, value.into())
    }

    /// Number of records in the stream.
    #[must_use]
    pub fn len(&self) -> usize { self.records.len() }

    /// Whether the stream holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Iterate over records in ascending type order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Bytes)> {
        self.records.iter().map(|(record_type, value)| (*record_type, value))
    }

    /// Consume the stream, yielding records in ascending type order.
    pub fn into_records(self) -> impl Iterator<Item = (u64, Bytes)> { self.records.into_iter() }

    /// Encode every record in ascending type order.
    ///
    /// # Errors
    ///
    /// Returns [`TlvError::RecordTooLarge`] if a value inserted after
    /// construction exceeds [`MAX_RECORD_SIZE`].
    pub fn encode(&self) -> Result<Vec<u8>, TlvError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        for (record_type, value) in self.iter() {
            check_size(record_type, value)?;
            write_bigsize(record_type, &mut out);
            write_bigsize(value.len() as u64, &mut out);
            out.extend_from_slice(value);
        }
        Ok(out)
    }

    fn encoded_len(&self) -> usize {
        self.iter()
            .map(|(record_type, value)| {
                bigsize_len(record_type) + bigsize_len(value.len() as u64) + value.len()
            })
            .sum()
    }
}

fn check_size(record_type: u64, value: &Bytes) -> Result<(), TlvError> {
    if value.len() > MAX_RECORD_SIZE {
        return Err(TlvError::RecordTooLarge {
            record_type,
            len: value.len(),
            limit: MAX_RECORD_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn decode_keeps_unknown_records_verbatim() {
        let raw = [
            0x02, 0x02, 0x01, 0x02, // amt_to_forward
            0x04, 0x01, 0x90, // outgoing_cltv_value
            0xfd, 0x01, 0x01, 0x03, 0xaa, 0xbb, 0xcc, // unknown odd type 257
        ];
        let stream = TlvStream::decode(&raw).expect("decode");
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.get(257).map(AsRef::as_ref), Some(&[0xaa, 0xbb, 0xcc][..]));
        assert_eq!(stream.encode().expect("encode"), raw);
    }

    #[test]
    fn empty_input_is_an_empty_stream() {
        let stream = TlvStream::decode(&[]).expect("decode");
        assert!(stream.is_empty());
        assert!(stream.encode().expect("encode").is_empty());
    }

    #[rstest]
    #[case::descending(&[0x04, 0x00, 0x02, 0x00], TlvError::InvalidTypeOrder { previous: 4, current: 2 })]
    #[case::repeated(&[0x02, 0x00, 0x02, 0x00], TlvError::InvalidTypeOrder { previous: 2, current: 2 })]
    #[case::short_value(&[0x02, 0x03, 0x01], TlvError::UnexpectedEof { needed: 3, available: 1 })]
    #[case::missing_length(&[0x02], TlvError::UnexpectedEof { needed: 1, available: 0 })]
    #[case::oversized(&[0x02, 0xfe, 0x00, 0x01, 0x00, 0x00], TlvError::RecordTooLarge { record_type: 2, len: 65_536, limit: MAX_RECORD_SIZE })]
    fn decode_rejects_malformed_framing(#[case] raw: &[u8], #[case] expected: TlvError) {
        assert_eq!(TlvStream::decode(raw), Err(expected));
    }

    #[test]
    fn from_records_sorts_and_rejects_duplicates() {
        let stream = TlvStream::from_records([
            (6, Bytes::from_static(&[1])),
            (2, Bytes::from_static(&[2])),
        ])
        .expect("distinct types");
        assert_eq!(stream.encode().expect("encode"), [0x02, 0x01, 0x02, 0x06, 0x01, 0x01]);

        let err = TlvStream::from_records([
            (6, Bytes::from_static(&[1])),
            (6, Bytes::from_static(&[2])),
        ])
        .expect_err("duplicate type");
        assert_eq!(err, TlvError::DuplicateType(6));
    }

    #[test]
    fn encode_rejects_oversized_inserted_value() {
        let mut stream = TlvStream::new();
        stream.insert(8, vec![0_u8; MAX_RECORD_SIZE + 1]);
        assert!(matches!(
            stream.encode(),
            Err(TlvError::RecordTooLarge { record_type: 8, .. })
        ));
    }
}

//! Errors raised while decoding or encoding TLV record streams.

use thiserror::Error;

/// Failures produced by the TLV codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TlvError {
    /// The input ended in the middle of a varint, length, or value.
    #[error("unexpected end of input: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        /// Bytes required to finish the current field.
        needed: usize,
        /// Bytes remaining in the input.
        available: usize,
    },
    /// A BigSize varint used more bytes than its value requires.
    #[error("non-canonical BigSize encoding for value {value}")]
    NonCanonicalVarint {
        /// The decoded value.
        value: u64,
    },
    /// Record types were not strictly ascending.
    #[error("record type {current} does not follow {previous} in ascending order")]
    InvalidTypeOrder {
        /// Type of the preceding record.
        previous: u64,
        /// Offending record type.
        current: u64,
    },
    /// The same record type appeared more than once while building a stream.
    #[error("duplicate record type {0}")]
    DuplicateType(u64),
    /// A record value exceeds the maximum encodable size.
    #[error("record {record_type} is {len} bytes, limit is {limit}")]
    RecordTooLarge {
        /// Type of the oversized record.
        record_type: u64,
        /// Length of its value.
        len: usize,
        /// Maximum permitted length.
        limit: usize,
    },
}

//! Onion payload rewriting.
//!
//! A TLV onion payload arrives as a BigSize length followed by that many bytes
//! of TLV records. Redirecting an HTLC into a freshly opened channel means
//! replacing (or adding) the `short_channel_id` record so the node forwards
//! over the channel we pick, while every other record is left untouched.

use bytes::{Buf, Bytes};
use thiserror::Error;

use crate::tlv::{TlvError, TlvStream, read_bigsize};

/// TLV type of the onion `short_channel_id` ("next hop") record.
pub const NEXT_HOP_RECORD_TYPE: u64 = 6;

/// Errors raised while rewriting an onion payload.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PayloadError {
    /// The payload was not valid hex.
    #[error("payload is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    /// The length prefix could not be read.
    #[error("failed to read payload length: {0}")]
    Length(#[source] TlvError),
    /// Fewer bytes follow the length prefix than it declares.
    #[error("payload declares {declared} bytes but only {available} follow")]
    Truncated {
        /// Length announced by the prefix.
        declared: u64,
        /// Bytes actually present after the prefix.
        available: usize,
    },
    /// The inner records are not a well-formed TLV stream.
    #[error("failed to decode payload records: {0}")]
    Decode(#[source] TlvError),
    /// The rewritten record set could not be encoded.
    #[error("failed to encode payload records: {0}")]
    Encode(#[source] TlvError),
}

/// Split a length-prefixed payload into its inner TLV bytes.
///
/// Bytes beyond the declared length are ignored.
///
/// # Errors
///
/// Returns [`PayloadError::Length`] if the prefix is malformed and
/// [`PayloadError::Truncated`] if the payload is shorter than declared.
pub fn inner_payload(payload: &[u8]) -> Result<&[u8], PayloadError> {
    let mut input = payload;
    let declared = read_bigsize(&mut input).map_err(PayloadError::Length)?;
    let available = input.remaining();
    match usize::try_from(declared) {
        Ok(len) if len <= available => Ok(&input[..len]),
        _ => Err(PayloadError::Truncated {
            declared,
            available,
        }),
    }
}

/// Value of the next-hop record for `short_channel_id`.
#[must_use]
pub fn next_hop_record(short_channel_id: u64) -> Bytes {
    Bytes::copy_from_slice(&short_channel_id.to_be_bytes())
}

/// Rewrite `payload` so that it routes over `short_channel_id`.
///
/// The returned bytes are the bare TLV stream, without a length prefix, with
/// the next-hop record set to the 8-byte big-endian channel id and all other
/// records preserved in ascending type order.
///
/// # Errors
///
/// Returns a [`PayloadError`] if the payload cannot be decoded or the
/// rewritten record set cannot be encoded. Callers must fail the HTLC rather
/// than forward the original payload.
///
/// # Examples
///
/// ```
/// use htlc_interceptor::payload::encode_payload_with_next_hop;
///
/// // length 3, record type 2 (amount) with a one-byte value
/// let payload = [0x03, 0x02, 0x01, 0x64];
/// let rewritten = encode_payload_with_next_hop(&payload, 0x0102).expect("rewrite");
/// assert_eq!(
///     rewritten,
///     [0x02, 0x01, 0x64, 0x06, 0x08, 0, 0, 0, 0, 0, 0, 0x01, 0x02]
/// );
/// ```
pub fn encode_payload_with_next_hop(
    payload: &[u8],
    short_channel_id: u64,
) -> Result<Vec<u8>, PayloadError> {
    let inner = inner_payload(payload)?;
    let parsed = TlvStream::decode(inner).map_err(PayloadError::Decode)?;
    let next_hop = next_hop_record(short_channel_id);
    let records = parsed
        .into_records()
        .filter(|(record_type, _)| *record_type != NEXT_HOP_RECORD_TYPE)
        .chain(std::iter::once((NEXT_HOP_RECORD_TYPE, next_hop)));
    let rewritten = TlvStream::from_records(records).map_err(PayloadError::Encode)?;
    rewritten.encode().map_err(PayloadError::Encode)
}

/// Hex-in, hex-out wrapper around [`encode_payload_with_next_hop`].
///
/// # Errors
///
/// Returns [`PayloadError::Hex`] for malformed hex and otherwise propagates
/// the errors of [`encode_payload_with_next_hop`].
pub fn rewrite_hex_payload(payload_hex: &str, short_channel_id: u64) -> Result<String, PayloadError> {
    let payload = hex::decode(payload_hex)?;
    let rewritten = encode_payload_with_next_hop(&payload, short_channel_id)?;
    Ok(hex::encode(rewritten))
}

//! Wire-level data model exchanged with the node's HTLC stream.
//!
//! [`HtlcEvent`] travels from the node to the interceptor and [`Resolution`]
//! travels back. Both are plain data: they are created by the transport (or a
//! test) and consumed by the dispatcher, which owns an event exclusively until
//! its resolution is sent.

use std::{fmt, str::FromStr};

use bincode::{Decode, Encode};
use thiserror::Error;

/// Errors raised when parsing identifiers from their text form.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseIdError {
    /// The input was not valid hex.
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    /// The short channel id was not of the form `block x tx x output`.
    #[error("invalid short channel id `{0}`")]
    ShortChannelId(String),
    /// The channel point was not of the form `txid:index`.
    #[error("invalid channel point `{0}`")]
    ChannelPoint(String),
}

/// Opaque token pairing an [`HtlcEvent`] with its [`Resolution`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct CorrelationId(pub String);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self { Self(value.to_owned()) }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self { Self(value) }
}

/// Compact channel identifier: funding block, transaction index and output.
///
/// # Examples
///
/// ```
/// use htlc_interceptor::model::ShortChannelId;
///
/// let scid: ShortChannelId = "700000x1x0".parse().expect("valid scid");
/// assert_eq!(scid.block_height(), 700_000);
/// assert_eq!(scid.to_string(), "700000x1x0");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct ShortChannelId(pub u64);

impl ShortChannelId {
    /// Assemble an id from its components; oversized components are masked.
    #[must_use]
    pub const fn from_parts(block_height: u32, tx_index: u32, output_index: u16) -> Self {
        Self(
            ((block_height as u64 & 0xff_ffff) << 40)
                | ((tx_index as u64 & 0xff_ffff) << 16)
                | output_index as u64,
        )
    }

    /// Height of the block containing the funding transaction.
    #[must_use]
    pub const fn block_height(self) -> u32 { (self.0 >> 40) as u32 }

    /// Index of the funding transaction within its block.
    #[must_use]
    pub const fn tx_index(self) -> u32 { ((self.0 >> 16) & 0xff_ffff) as u32 }

    /// Index of the funding output.
    #[must_use]
    pub const fn output_index(self) -> u16 { (self.0 & 0xffff) as u16 }
}

impl fmt::Display for ShortChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{}",
            self.block_height(),
            self.tx_index(),
            self.output_index()
        )
    }
}

impl FromStr for ShortChannelId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseIdError::ShortChannelId(s.to_owned());
        let mut parts = s.split('x');
        let (Some(block), Some(tx), Some(output), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        let block: u32 = block.parse().map_err(|_| invalid())?;
        let tx: u32 = tx.parse().map_err(|_| invalid())?;
        let output: u16 = output.parse().map_err(|_| invalid())?;
        if block > 0xff_ffff || tx > 0xff_ffff {
            return Err(invalid());
        }
        Ok(Self::from_parts(block, tx, output))
    }
}

/// SHA-256 payment hash of an HTLC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PaymentHash(pub [u8; 32]);

impl FromStr for PaymentHash {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(<[u8; 32] as hex::FromHex>::from_hex(s)?))
    }
}

impl fmt::Display for PaymentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Compressed secp256k1 public key identifying a Lightning node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub [u8; 33]);

impl FromStr for NodeId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(<[u8; 33] as hex::FromHex>::from_hex(s)?))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Funding outpoint of a channel.
///
/// `txid` is stored in internal byte order; the text form shows it reversed,
/// as node RPC interfaces do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelPoint {
    /// Funding transaction id in internal byte order.
    pub txid: [u8; 32],
    /// Index of the funding output.
    pub output_index: u32,
}

impl FromStr for ChannelPoint {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, index) = s
            .split_once(':')
            .ok_or_else(|| ParseIdError::ChannelPoint(s.to_owned()))?;
        let mut txid = <[u8; 32] as hex::FromHex>::from_hex(txid)?;
        txid.reverse();
        let output_index = index
            .parse()
            .map_err(|_| ParseIdError::ChannelPoint(s.to_owned()))?;
        Ok(Self { txid, output_index })
    }
}

impl fmt::Display for ChannelPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut txid = self.txid;
        txid.reverse();
        write!(f, "{}:{}", hex::encode(txid), self.output_index)
    }
}

/// 32-byte wire channel id derived from a funding outpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub struct ChannelId(pub [u8; 32]);

impl ChannelId {
    /// Derive the v1 channel id: the funding txid with its last two bytes
    /// XORed with the big-endian output index.
    ///
    /// Only the low 16 bits of the output index take part.
    ///
    /// # Examples
    ///
    /// ```
    /// use htlc_interceptor::model::{ChannelId, ChannelPoint};
    ///
    /// let point = ChannelPoint { txid: [0xff; 32], output_index: 0x0102 };
    /// let id = ChannelId::from_channel_point(&point);
    /// assert_eq!(id.0[30..], [0xfe, 0xfd]);
    /// assert_eq!(id.0[..30], [0xff; 30]);
    /// ```
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "v1 channel ids only encode a 16-bit output index"
    )]
    pub fn from_channel_point(point: &ChannelPoint) -> Self {
        let mut id = point.txid;
        let [high, low] = (point.output_index as u16).to_be_bytes();
        id[30] ^= high;
        id[31] ^= low;
        Self(id)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// An HTLC the node is about to forward.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct HtlcEvent {
    /// Token echoed back in the [`Resolution`].
    pub correlation_id: CorrelationId,
    /// Incoming HTLC details.
    pub htlc: HtlcDetails,
    /// Forwarding instructions from this hop's onion layer.
    pub onion: OnionDetails,
}

/// Incoming side of an intercepted HTLC.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct HtlcDetails {
    /// Hex-encoded payment hash.
    pub payment_hash: String,
    /// Incoming amount, fees included.
    pub amount_msat: u64,
    /// Absolute block height at which the incoming HTLC expires.
    pub cltv_expiry: u32,
    /// Blocks remaining until `cltv_expiry`.
    pub cltv_expiry_relative: u32,
}

/// Outgoing side of an intercepted HTLC, as requested by the sender.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct OnionDetails {
    /// Channel the sender asked us to forward over.
    pub short_channel_id: ShortChannelId,
    /// Amount to forward.
    pub forward_msat: u64,
    /// CLTV value for the outgoing HTLC.
    pub outgoing_cltv_value: u32,
    /// Hex-encoded, length-prefixed onion payload for this hop.
    pub payload: String,
}

/// Instruction returned to the node for one [`HtlcEvent`].
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Resolution {
    /// Copied verbatim from the originating event.
    pub correlation_id: CorrelationId,
    /// What the node should do with the HTLC.
    pub outcome: ResolutionOutcome,
}

/// Outcome carried by a [`Resolution`].
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum ResolutionOutcome {
    /// Forward the HTLC, optionally over another channel with a new payload.
    Continue(HtlcContinue),
    /// Fail the HTLC back with a BOLT-4 failure message.
    Fail(HtlcFail),
}

/// Continue instruction; both fields empty means "forward unchanged".
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct HtlcContinue {
    /// Channel to forward over instead of the requested one.
    pub forward_to: Option<ChannelId>,
    /// Hex-encoded replacement onion payload.
    pub payload: Option<String>,
}

/// Failure instruction.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct HtlcFail {
    /// Hex-encoded BOLT-4 failure code, e.g. `"1007"`.
    pub failure_message: String,
}

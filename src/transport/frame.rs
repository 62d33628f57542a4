use bincode::{Decode, Encode, config, decode_from_slice, encode_to_vec};
use bytes::Bytes;

use super::TransportError;

/// Types carried as a single transport frame.
///
/// Any type deriving [`Encode`] and [`Decode`] implements this trait through
/// the blanket implementation. Frames use bincode's standard configuration.
pub trait WireMessage: Encode + Decode<()> + Sized {
    /// Serialize into a frame body.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Encode`] if serialization fails.
    fn to_frame(&self) -> Result<Bytes, TransportError> {
        encode_to_vec(self, config::standard())
            .map(Bytes::from)
            .map_err(TransportError::Encode)
    }

    /// Deserialize a whole frame body.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Decode`] for malformed input and
    /// [`TransportError::TrailingBytes`] if the frame is longer than the
    /// message it holds.
    fn from_frame(frame: &[u8]) -> Result<Self, TransportError> {
        let (message, consumed) =
            decode_from_slice(frame, config::standard()).map_err(TransportError::Decode)?;
        if consumed != frame.len() {
            return Err(TransportError::TrailingBytes {
                trailing: frame.len() - consumed,
            });
        }
        Ok(message)
    }
}

impl<T> WireMessage for T where T: Encode + Decode<()> {}

//! Type-Length-Value record codec used by onion payloads.
//!
//! Both the type and the length of each record are BigSize varints. A stream
//! is a concatenation of records with strictly ascending types.

mod bigsize;
mod error;
mod stream;

pub use bigsize::{bigsize_len, read_bigsize, write_bigsize};
pub use error::TlvError;
pub use stream::{MAX_RECORD_SIZE, TlvStream};

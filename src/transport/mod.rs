//! Streaming contract between the interceptor and the node plugin.
//!
//! A [`PluginTransport`] establishes a [`PluginChannel`] once at start-up.
//! The channel can then open any number of bidirectional HTLC streams over
//! its lifetime: the stream manager reopens a stream after every failure
//! without redialling.

use std::io;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::model::{HtlcEvent, Resolution};

mod frame;
pub mod tcp;

pub use frame::WireMessage;
pub use tcp::TcpTransport;

/// Inbound half of an HTLC stream.
pub type EventStream = BoxStream<'static, Result<HtlcEvent, TransportError>>;

/// Errors raised while dialling, opening, or using an HTLC stream.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Address lookup failed.
    #[error("failed to resolve `{address}`: {source}")]
    Resolve {
        /// Address as configured.
        address: String,
        /// Lookup failure.
        #[source]
        source: io::Error,
    },
    /// Address lookup returned nothing to connect to.
    #[error("`{0}` resolved to no socket addresses")]
    NoAddress(String),
    /// Socket level failure.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// A frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] bincode::error::EncodeError),
    /// A frame could not be deserialized.
    #[error("failed to decode frame: {0}")]
    Decode(#[source] bincode::error::DecodeError),
    /// A frame decoded cleanly but carried unread bytes.
    #[error("frame has {trailing} trailing bytes")]
    TrailingBytes { trailing: usize },
    /// The peer closed the stream or the resolution writer has exited.
    #[error("stream closed")]
    Closed,
    /// The stream was torn down on purpose.
    #[error("stream cancelled")]
    Cancelled,
}

/// An open HTLC stream: events in, resolutions out.
pub struct HtlcStream {
    /// HTLC events sent by the node.
    pub events: EventStream,
    /// Where resolutions for those events are written.
    pub sink: ResolutionSink,
}

impl HtlcStream {
    /// Pair an event stream with its resolution sink.
    #[must_use]
    pub fn new(events: EventStream, sink: ResolutionSink) -> Self { Self { events, sink } }
}

/// Cloneable handle used by HTLC handlers to send resolutions.
///
/// Sends from many tasks are serialized through a single writer, so
/// resolutions never interleave on the wire.
#[derive(Clone, Debug)]
pub struct ResolutionSink {
    tx: mpsc::Sender<Resolution>,
}

impl ResolutionSink {
    /// Create a sink and the receiver the stream writer drains.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Resolution>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue `resolution` for delivery to the node.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once the stream writer has stopped.
    pub async fn send(&self, resolution: Resolution) -> Result<(), TransportError> {
        self.tx
            .send(resolution)
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Whether the stream writer has stopped accepting resolutions.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.tx.is_closed() }
}

/// Factory for plugin channels. Called once per interceptor start.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait PluginTransport: Send + Sync + 'static {
    /// Establish a channel to the plugin.
    async fn dial(&self) -> Result<Box<dyn PluginChannel>, TransportError>;
}

/// A dialled connection capable of opening HTLC streams.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait PluginChannel: Send + Sync {
    /// Open a fresh HTLC stream.
    ///
    /// Implementations must be cancellation-safe: dropping the pending future
    /// must not leak resources.
    async fn open_htlc_stream(&self) -> Result<HtlcStream, TransportError>;
}

#[async_trait]
impl<T: PluginTransport + ?Sized> PluginTransport for std::sync::Arc<T> {
    async fn dial(&self) -> Result<Box<dyn PluginChannel>, TransportError> { (**self).dial().await }
}

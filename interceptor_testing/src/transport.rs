//! In-memory plugin transport.
//!
//! [`memory_transport`] returns a [`MemoryTransport`] to hand to the
//! interceptor and a [`NodeHandle`] that plays the node: it sees every stream
//! the interceptor opens, pushes events into it and reads resolutions back.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{StreamExt, channel::mpsc as fmpsc};
use htlc_interceptor::{
    HtlcEvent,
    HtlcStream,
    PluginChannel,
    PluginTransport,
    Resolution,
    ResolutionSink,
    TransportError,
};
use tokio::sync::mpsc;

const SINK_CAPACITY: usize = 64;

struct Shared {
    refuse_dial: AtomicBool,
    open_failures: AtomicUsize,
    attempts: AtomicUsize,
    opens: AtomicUsize,
    streams: mpsc::UnboundedSender<NodeStream>,
}

/// Interceptor side of the in-memory transport.
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

/// Node side of the in-memory transport.
pub struct NodeHandle {
    shared: Arc<Shared>,
    streams: mpsc::UnboundedReceiver<NodeStream>,
}

/// Node side of one open HTLC stream.
pub struct NodeStream {
    events: fmpsc::UnboundedSender<Result<HtlcEvent, TransportError>>,
    resolutions: mpsc::Receiver<Resolution>,
}

/// Create a connected transport/node pair.
#[must_use]
pub fn memory_transport() -> (MemoryTransport, NodeHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        refuse_dial: AtomicBool::new(false),
        open_failures: AtomicUsize::new(0),
        attempts: AtomicUsize::new(0),
        opens: AtomicUsize::new(0),
        streams: tx,
    });
    (
        MemoryTransport {
            shared: Arc::clone(&shared),
        },
        NodeHandle {
            shared,
            streams: rx,
        },
    )
}

impl MemoryTransport {
    /// Make every dial fail with a connection-refused error.
    #[must_use]
    pub fn refuse_dial(self) -> Self {
        self.shared.refuse_dial.store(true, Ordering::SeqCst);
        self
    }

    /// Make the next `n` stream opens fail.
    #[must_use]
    pub fn fail_opens(self, n: usize) -> Self {
        self.shared.open_failures.store(n, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl PluginTransport for MemoryTransport {
    async fn dial(&self) -> Result<Box<dyn PluginChannel>, TransportError> {
        if self.shared.refuse_dial.load(Ordering::SeqCst) {
            return Err(TransportError::Io(io::ErrorKind::ConnectionRefused.into()));
        }
        Ok(Box::new(MemoryChannel {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MemoryChannel {
    shared: Arc<Shared>,
}

#[async_trait]
impl PluginChannel for MemoryChannel {
    async fn open_htlc_stream(&self) -> Result<HtlcStream, TransportError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.shared.open_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.shared
                .open_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::Io(io::ErrorKind::ConnectionRefused.into()));
        }

        let (events_tx, events_rx) = fmpsc::unbounded();
        let (sink, resolutions) = ResolutionSink::channel(SINK_CAPACITY);
        self.shared
            .streams
            .send(NodeStream {
                events: events_tx,
                resolutions,
            })
            .map_err(|_| TransportError::Closed)?;
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        Ok(HtlcStream::new(events_rx.boxed(), sink))
    }
}

impl NodeHandle {
    /// Wait for the interceptor to open its next stream.
    ///
    /// # Panics
    ///
    /// Panics if no stream is opened within five seconds of runtime time.
    pub async fn next_stream(&mut self) -> NodeStream {
        tokio::time::timeout(Duration::from_secs(5), self.streams.recv())
            .await
            .expect("interceptor did not open a stream")
            .expect("transport dropped")
    }

    /// Number of stream opens attempted, successful or not.
    #[must_use]
    pub fn attempts(&self) -> usize { self.shared.attempts.load(Ordering::SeqCst) }

    /// Number of streams successfully opened.
    #[must_use]
    pub fn opens(&self) -> usize { self.shared.opens.load(Ordering::SeqCst) }
}

impl NodeStream {
    /// Deliver `event` to the interceptor. Returns `false` once the
    /// interceptor has dropped the stream.
    pub fn send(&self, event: HtlcEvent) -> bool { self.events.unbounded_send(Ok(event)).is_ok() }

    /// Break the stream with `error`.
    pub fn fail(&self, error: TransportError) { let _ = self.events.unbounded_send(Err(error)); }

    /// End the stream cleanly, as a node restart would.
    pub fn close(self) { self.events.close_channel(); }

    /// Whether the interceptor has stopped reading from this stream.
    #[must_use]
    pub fn is_abandoned(&self) -> bool { self.events.is_closed() }

    /// Next resolution written by the interceptor, or `None` once every
    /// resolution sender is gone.
    pub async fn resolution(&mut self) -> Option<Resolution> { self.resolutions.recv().await }

    /// Collect exactly `n` resolutions.
    ///
    /// # Panics
    ///
    /// Panics if the stream closes before `n` resolutions arrive.
    pub async fn resolutions(&mut self, n: usize) -> Vec<Resolution> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.resolution().await.expect("stream closed early"));
        }
        out
    }

    /// A resolution already queued, without waiting.
    pub fn try_resolution(&mut self) -> Option<Resolution> { self.resolutions.try_recv().ok() }
}

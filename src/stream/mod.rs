//! HTLC stream manager.
//!
//! Keeps one HTLC stream open against a dialled [`PluginChannel`], reopening
//! it after every failure, and feeds received events to the [`Dispatcher`].
//! The loop only ends when the interceptor is asked to stop or its
//! connection is torn down.

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::{select, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::{
    decision::Decider,
    dispatch::Dispatcher,
    graph::ChannelGraph,
    metrics::{self, ErrorKind},
    transport::{HtlcStream, PluginChannel, TransportError},
};

mod backoff;
mod ready;

pub use backoff::ReconnectConfig;
pub(crate) use ready::ReadyBarrier;

/// Cancellation handles for one interceptor run.
#[derive(Clone, Debug, Default)]
pub(crate) struct SessionTokens {
    /// Set when a graceful stop has been requested.
    pub stop: CancellationToken,
    /// Teardown handle for the connection, cancelled after draining;
    /// transports that observe it end their streams with `Cancelled`.
    pub connection: CancellationToken,
}

/// Why the stream loop returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LoopExit {
    StopRequested,
    Cancelled,
}

enum ReceiveEnd {
    StopRequested,
    Cancelled,
    Failed,
}

/// Run the stream loop until a stop or a connection teardown.
///
/// `on_open` runs after every successful stream open.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
pub(crate) async fn run_stream_loop<D, G>(
    channel: &dyn PluginChannel,
    dispatcher: &Dispatcher<D, G>,
    reconnect: ReconnectConfig,
    tokens: &SessionTokens,
    on_open: impl Fn(),
) -> LoopExit
where
    D: Decider,
    G: ChannelGraph,
{
    let reconnect = reconnect.normalized();
    loop {
        if let Some(exit) = requested_exit(tokens) {
            return exit;
        }
        let opened = select! {
            biased;

            () = tokens.connection.cancelled() => return LoopExit::Cancelled,
            () = tokens.stop.cancelled() => return LoopExit::StopRequested,
            res = channel.open_htlc_stream() => res,
        };
        match opened {
            Ok(stream) => {
                info!("htlc stream open");
                on_open();
                match receive_events(stream, dispatcher, tokens).await {
                    ReceiveEnd::StopRequested => return LoopExit::StopRequested,
                    ReceiveEnd::Cancelled | ReceiveEnd::Failed => {}
                }
            }
            Err(e) => {
                warn!("failed to open htlc stream: error={e}");
                metrics::inc_errors(ErrorKind::Stream);
            }
        }
        metrics::inc_reconnects();
        select! {
            biased;

            () = tokens.connection.cancelled() => return LoopExit::Cancelled,
            () = tokens.stop.cancelled() => return LoopExit::StopRequested,
            () = sleep(reconnect.delay) => {}
        }
    }
}

fn requested_exit(tokens: &SessionTokens) -> Option<LoopExit> {
    if tokens.connection.is_cancelled() {
        Some(LoopExit::Cancelled)
    } else if tokens.stop.is_cancelled() {
        Some(LoopExit::StopRequested)
    } else {
        None
    }
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn receive_events<D, G>(
    stream: HtlcStream,
    dispatcher: &Dispatcher<D, G>,
    tokens: &SessionTokens,
) -> ReceiveEnd
where
    D: Decider,
    G: ChannelGraph,
{
    let HtlcStream { mut events, sink } = stream;
    loop {
        let next = select! {
            biased;

            () = tokens.stop.cancelled() => return ReceiveEnd::StopRequested,
            () = tokens.connection.cancelled() => return ReceiveEnd::Cancelled,
            next = events.next() => next,
        };
        match next {
            Some(Ok(event)) => {
                if tokens.stop.is_cancelled() {
                    debug!(
                        "ignoring htlc received after stop request: correlation_id={}",
                        event.correlation_id
                    );
                    return ReceiveEnd::StopRequested;
                }
                dispatcher.dispatch(event, sink.clone()).await;
            }
            Some(Err(TransportError::Cancelled)) => {
                info!("htlc stream cancelled");
                return ReceiveEnd::Cancelled;
            }
            Some(Err(e)) => {
                warn!("unexpected error receiving htlc: error={e}");
                metrics::inc_errors(ErrorKind::Stream);
                return ReceiveEnd::Failed;
            }
            None => {
                warn!("htlc stream closed by node");
                metrics::inc_errors(ErrorKind::Stream);
                return ReceiveEnd::Failed;
            }
        }
    }
}

#[cfg(test)]
mod tests;

//! Tests for the stream reconnect loop.

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use rstest::{fixture, rstest};
use tokio::{sync::mpsc, time::Instant};

use super::*;
use crate::{
    config::InterceptorConfig,
    decision::PassThrough,
    graph::NoGraph,
    model::{
        CorrelationId,
        HtlcDetails,
        HtlcEvent,
        NodeId,
        OnionDetails,
        Resolution,
        ShortChannelId,
    },
    transport::ResolutionSink,
};

/// Fails the first `failures` opens, then hands out queued streams.
struct ScriptedChannel {
    failures: usize,
    attempts: AtomicUsize,
    streams: Mutex<VecDeque<HtlcStream>>,
}

impl ScriptedChannel {
    fn new(failures: usize, streams: Vec<HtlcStream>) -> Self {
        Self {
            failures,
            attempts: AtomicUsize::new(0),
            streams: Mutex::new(streams.into()),
        }
    }

    fn attempts(&self) -> usize { self.attempts.load(Ordering::SeqCst) }
}

#[async_trait]
impl PluginChannel for ScriptedChannel {
    async fn open_htlc_stream(&self) -> Result<HtlcStream, TransportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(TransportError::Closed);
        }
        self.streams
            .lock()
            .expect("streams lock")
            .pop_front()
            .ok_or(TransportError::Closed)
    }
}

fn event(id: &str) -> HtlcEvent {
    HtlcEvent {
        correlation_id: CorrelationId::from(id),
        htlc: HtlcDetails {
            payment_hash: "11".repeat(32),
            amount_msat: 2_000,
            cltv_expiry: 700_100,
            cltv_expiry_relative: 80,
        },
        onion: OnionDetails {
            short_channel_id: ShortChannelId::from_parts(700_000, 3, 0),
            forward_msat: 1_000,
            outgoing_cltv_value: 700_020,
            payload: String::new(),
        },
    }
}

/// A stream yielding `items` and then idling forever.
fn open_stream(
    items: Vec<Result<HtlcEvent, TransportError>>,
) -> (HtlcStream, mpsc::Receiver<Resolution>) {
    let (sink, rx) = ResolutionSink::channel(8);
    let events = stream::iter(items).chain(stream::pending()).boxed();
    (HtlcStream::new(events, sink), rx)
}

/// A stream yielding `items` and then ending.
fn closing_stream(items: Vec<Result<HtlcEvent, TransportError>>) -> HtlcStream {
    let (sink, _rx) = ResolutionSink::channel(8);
    HtlcStream::new(stream::iter(items).boxed(), sink)
}

#[fixture]
fn dispatcher() -> Dispatcher<PassThrough, NoGraph> {
    Dispatcher::new(
        PassThrough,
        NoGraph,
        &InterceptorConfig::new("127.0.0.1:1", NodeId([2; 33])),
    )
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn reopens_after_failed_opens(dispatcher: Dispatcher<PassThrough, NoGraph>) {
    let (stream, mut rx) = open_stream(vec![Ok(event("a"))]);
    let channel = ScriptedChannel::new(3, vec![stream]);
    let tokens = SessionTokens::default();
    let opens = AtomicUsize::new(0);
    let started = Instant::now();

    let driver = async {
        let resolution = rx.recv().await;
        tokens.stop.cancel();
        resolution
    };
    let (exit, resolution) = tokio::join!(
        run_stream_loop(
            &channel,
            &dispatcher,
            ReconnectConfig::default(),
            &tokens,
            || {
                opens.fetch_add(1, Ordering::SeqCst);
            },
        ),
        driver
    );

    assert_eq!(exit, LoopExit::StopRequested);
    assert_eq!(
        resolution.expect("resolution").correlation_id,
        CorrelationId::from("a")
    );
    assert_eq!(channel.attempts(), 4);
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[rstest]
#[case::closed(TransportError::Closed)]
#[case::cancelled(TransportError::Cancelled)]
#[case::peer_hangup(TransportError::Io(std::io::ErrorKind::ConnectionReset.into()))]
#[tokio::test(start_paused = true)]
async fn receive_error_reopens_stream(
    dispatcher: Dispatcher<PassThrough, NoGraph>,
    #[case] error: TransportError,
) {
    let first = closing_stream(vec![Err(error)]);
    let (second, mut rx) = open_stream(vec![Ok(event("b"))]);
    let channel = ScriptedChannel::new(0, vec![first, second]);
    let tokens = SessionTokens::default();
    let opens = AtomicUsize::new(0);

    let driver = async {
        let resolution = rx.recv().await;
        tokens.connection.cancel();
        resolution
    };
    let (exit, resolution) = tokio::join!(
        run_stream_loop(
            &channel,
            &dispatcher,
            ReconnectConfig::default(),
            &tokens,
            || {
                opens.fetch_add(1, Ordering::SeqCst);
            },
        ),
        driver
    );

    assert_eq!(exit, LoopExit::Cancelled);
    assert!(resolution.is_some());
    assert_eq!(opens.load(Ordering::SeqCst), 2);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn clean_close_reopens_stream(dispatcher: Dispatcher<PassThrough, NoGraph>) {
    let first = closing_stream(Vec::new());
    let (second, _rx) = open_stream(Vec::new());
    let channel = ScriptedChannel::new(0, vec![first, second]);
    let tokens = SessionTokens::default();
    let opens = AtomicUsize::new(0);

    let exit = run_stream_loop(
        &channel,
        &dispatcher,
        ReconnectConfig::default(),
        &tokens,
        || {
            if opens.fetch_add(1, Ordering::SeqCst) == 1 {
                tokens.stop.cancel();
            }
        },
    )
    .await;

    assert_eq!(exit, LoopExit::StopRequested);
    assert_eq!(channel.attempts(), 2);
}

#[rstest]
#[tokio::test]
async fn events_after_stop_are_not_dispatched(dispatcher: Dispatcher<PassThrough, NoGraph>) {
    let (stream, mut rx) = open_stream(vec![Ok(event("c")), Ok(event("d"))]);
    let channel = ScriptedChannel::new(0, vec![stream]);
    let tokens = SessionTokens::default();

    let exit = run_stream_loop(
        &channel,
        &dispatcher,
        ReconnectConfig::default(),
        &tokens,
        || tokens.stop.cancel(),
    )
    .await;
    dispatcher.drain().await;

    assert_eq!(exit, LoopExit::StopRequested);
    assert_eq!(dispatcher.in_flight(), 0);
    assert!(rx.try_recv().is_err());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_backoff(dispatcher: Dispatcher<PassThrough, NoGraph>) {
    let channel = ScriptedChannel::new(usize::MAX, Vec::new());
    let tokens = SessionTokens::default();

    let (exit, ()) = tokio::join!(
        run_stream_loop(
            &channel,
            &dispatcher,
            ReconnectConfig {
                delay: Duration::from_secs(30),
            },
            &tokens,
            || {},
        ),
        async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            tokens.connection.cancel();
        }
    );

    assert_eq!(exit, LoopExit::Cancelled);
    assert_eq!(channel.attempts(), 1);
}

#[rstest]
#[tokio::test]
async fn cancelled_before_open_returns_immediately(dispatcher: Dispatcher<PassThrough, NoGraph>) {
    let channel = ScriptedChannel::new(0, Vec::new());
    let tokens = SessionTokens::default();
    tokens.connection.cancel();

    let exit = run_stream_loop(
        &channel,
        &dispatcher,
        ReconnectConfig::default(),
        &tokens,
        || {},
    )
    .await;

    assert_eq!(exit, LoopExit::Cancelled);
    assert_eq!(channel.attempts(), 0);
}

//! Start/stop behaviour of the interceptor over the in-memory transport.

use std::{sync::Arc, time::Duration};

use htlc_interceptor::{
    Interceptor,
    InterceptorConfig,
    InterceptorError,
    LifecycleState,
    NoGraph,
    PassThrough,
    ResolutionOutcome,
    TransportError,
};
use interceptor_testing::{
    LOCAL_NODE,
    MemoryTransport,
    gated_decider,
    htlc_event,
    htlc_events,
    memory_transport,
};
use rstest::{fixture, rstest};
use tokio::task::JoinHandle;

#[fixture]
fn config() -> InterceptorConfig { InterceptorConfig::new("memory", LOCAL_NODE) }

fn spawn_start<D, G>(
    interceptor: &Arc<Interceptor<MemoryTransport, D, G>>,
) -> JoinHandle<Result<(), InterceptorError>>
where
    D: htlc_interceptor::Decider,
    G: htlc_interceptor::ChannelGraph,
{
    let interceptor = Arc::clone(interceptor);
    tokio::spawn(async move { interceptor.start().await })
}

#[rstest]
#[tokio::test]
async fn stop_waits_for_in_flight_htlcs(config: InterceptorConfig) {
    let (transport, mut node) = memory_transport();
    let (decider, gate) = gated_decider();
    let interceptor = Arc::new(Interceptor::new(&config, transport, decider, NoGraph));
    let run = spawn_start(&interceptor);

    let mut stream = node.next_stream().await;
    interceptor.wait_until_ready().await;
    for event in htlc_events(3) {
        assert!(stream.send(event));
    }
    gate.wait_entered(3).await;
    assert_eq!(interceptor.in_flight(), 3);

    let stop = tokio::spawn({
        let interceptor = Arc::clone(&interceptor);
        async move { interceptor.stop().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!stop.is_finished(), "stop returned with htlcs in flight");
    assert_eq!(interceptor.state(), LifecycleState::Stopping);
    assert!(
        !stream.send(htlc_event("late")),
        "receiver still reading after stop"
    );

    let mut ids = Vec::new();
    for (released, pause) in [(1, 40), (2, 10), (3, 25)] {
        tokio::time::sleep(Duration::from_millis(pause)).await;
        assert!(!stop.is_finished(), "stop returned after {} of 3", released - 1);
        gate.open(1);
        let resolution = stream.resolution().await.expect("resolution");
        assert!(matches!(resolution.outcome, ResolutionOutcome::Continue(_)));
        ids.push(resolution.correlation_id.0);
    }
    stop.await.expect("stop task").expect("stop");
    run.await.expect("start task").expect("start");

    ids.sort();
    assert_eq!(ids, ["htlc-0", "htlc-1", "htlc-2"]);
    assert_eq!(gate.entered(), 3);
    assert!(stream.try_resolution().is_none());
    assert_eq!(interceptor.in_flight(), 0);
    assert_eq!(interceptor.state(), LifecycleState::Stopped);
}

#[rstest]
#[tokio::test]
async fn events_after_stop_are_left_to_the_node(config: InterceptorConfig) {
    let (transport, mut node) = memory_transport();
    let interceptor = Arc::new(Interceptor::new(&config, transport, PassThrough, NoGraph));
    let run = spawn_start(&interceptor);

    let mut stream = node.next_stream().await;
    assert!(stream.send(htlc_event("before")));
    let first = stream.resolution().await.expect("resolution");
    assert_eq!(first.correlation_id.0, "before");

    interceptor.stop().await.expect("stop");
    run.await.expect("start task").expect("start");

    assert!(stream.is_abandoned());
    assert!(!stream.send(htlc_event("after")));
    assert!(stream.try_resolution().is_none());
}

#[rstest]
#[tokio::test]
async fn refused_dial_fails_start(config: InterceptorConfig) {
    let (transport, node) = memory_transport();
    let interceptor = Interceptor::new(&config, transport.refuse_dial(), PassThrough, NoGraph);

    let err = interceptor.start().await.expect_err("start must fail");
    match err {
        InterceptorError::Dial { address, source } => {
            assert_eq!(address, "memory");
            assert!(matches!(source, TransportError::Io(_)));
        }
        other => panic!("expected dial error, got {other:?}"),
    }
    assert_eq!(node.attempts(), 0);

    tokio::time::timeout(Duration::from_secs(1), interceptor.wait_until_ready())
        .await
        .expect("readiness released after failed start");
    assert_eq!(interceptor.state(), LifecycleState::Stopped);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn stream_failures_are_retried(config: InterceptorConfig) {
    let (transport, mut node) = memory_transport();
    let interceptor = Arc::new(Interceptor::new(
        &config,
        transport.fail_opens(3),
        PassThrough,
        NoGraph,
    ));
    let run = spawn_start(&interceptor);

    let mut samples = 0;
    while node.opens() == 0 {
        assert!(
            !interceptor.is_ready(),
            "ready after {} failed opens",
            node.attempts()
        );
        samples += 1;
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    assert!(samples > 3, "only {samples} samples before the first open");
    let first = node.next_stream().await;
    interceptor.wait_until_ready().await;
    assert_eq!(node.attempts(), 4);
    assert_eq!(interceptor.state(), LifecycleState::Running);

    first.fail(TransportError::Closed);
    let mut second = node.next_stream().await;
    assert!(second.send(htlc_event("after-reconnect")));
    let resolution = second.resolution().await.expect("resolution");
    assert_eq!(resolution.correlation_id.0, "after-reconnect");
    assert_eq!(node.opens(), 2);

    second.close();
    let mut third = node.next_stream().await;
    assert!(third.send(htlc_event("after-close")));
    assert!(third.resolution().await.is_some());

    interceptor.stop().await.expect("stop");
    run.await.expect("start task").expect("start");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn stop_while_reconnecting(config: InterceptorConfig) {
    let (transport, node) = memory_transport();
    let interceptor = Arc::new(Interceptor::new(
        &config,
        transport.fail_opens(usize::MAX),
        PassThrough,
        NoGraph,
    ));
    let run = spawn_start(&interceptor);
    while node.attempts() < 2 {
        assert!(!interceptor.is_ready());
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(interceptor.state(), LifecycleState::Starting);

    interceptor.stop().await.expect("stop");
    run.await.expect("start task").expect("start");
    assert_eq!(node.opens(), 0);
    assert!(interceptor.is_ready());
}

#[rstest]
#[tokio::test]
async fn start_twice_is_rejected(config: InterceptorConfig) {
    let (transport, mut node) = memory_transport();
    let interceptor = Arc::new(Interceptor::new(&config, transport, PassThrough, NoGraph));
    let run = spawn_start(&interceptor);
    let _stream = node.next_stream().await;
    interceptor.wait_until_ready().await;

    let err = interceptor.start().await.expect_err("second start");
    assert!(matches!(
        err,
        InterceptorError::InvalidState {
            operation: "start",
            ..
        }
    ));

    interceptor.stop().await.expect("stop");
    run.await.expect("start task").expect("start");
}

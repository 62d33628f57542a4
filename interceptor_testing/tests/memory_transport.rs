//! Self-tests for the in-memory transport.

use htlc_interceptor::{PluginTransport, TransportError, resolution::continue_unmodified};
use interceptor_testing::{htlc_event, memory_transport};

#[tokio::test]
async fn stream_carries_events_and_resolutions() {
    let (transport, mut node) = memory_transport();
    let channel = transport.dial().await.expect("dial");
    let mut stream = channel.open_htlc_stream().await.expect("open");
    let mut node_stream = node.next_stream().await;

    assert!(node_stream.send(htlc_event("a")));
    let event = futures::StreamExt::next(&mut stream.events)
        .await
        .expect("event")
        .expect("ok");
    stream
        .sink
        .send(continue_unmodified(&event))
        .await
        .expect("send");

    let resolution = node_stream.resolution().await.expect("resolution");
    assert_eq!(resolution.correlation_id, event.correlation_id);
    assert_eq!(node.opens(), 1);
}

#[tokio::test]
async fn scripted_open_failures() {
    let (transport, node) = memory_transport();
    let channel = transport.fail_opens(2).dial().await.expect("dial");
    for _ in 0..2 {
        assert!(matches!(
            channel.open_htlc_stream().await,
            Err(TransportError::Io(_))
        ));
    }
    assert!(channel.open_htlc_stream().await.is_ok());
    assert_eq!(node.attempts(), 3);
    assert_eq!(node.opens(), 1);
}

#[tokio::test]
async fn refused_dial() {
    let (transport, _node) = memory_transport();
    assert!(transport.refuse_dial().dial().await.is_err());
}

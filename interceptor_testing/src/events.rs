//! Canned HTLC events and identities.

use htlc_interceptor::{
    CorrelationId,
    HtlcEvent,
    NodeId,
    ShortChannelId,
    model::{HtlcDetails, OnionDetails},
};
use rstest::fixture;

/// Local node identity used by the fixtures.
pub const LOCAL_NODE: NodeId = NodeId([2; 33]);

/// Hop payload with `amt_to_forward = 100000` and
/// `outgoing_cltv_value = 800104`, behind its BigSize length prefix.
pub const SAMPLE_PAYLOAD: &str = "0a02030186a004030c3568";

/// Build a well-formed event tagged `id`.
#[must_use]
pub fn htlc_event(id: &str) -> HtlcEvent {
    HtlcEvent {
        correlation_id: CorrelationId::from(id),
        htlc: HtlcDetails {
            payment_hash: "5a".repeat(32),
            amount_msat: 101_000,
            cltv_expiry: 800_144,
            cltv_expiry_relative: 40,
        },
        onion: OnionDetails {
            short_channel_id: ShortChannelId::from_parts(800_000, 12, 1),
            forward_msat: 100_000,
            outgoing_cltv_value: 800_104,
            payload: SAMPLE_PAYLOAD.to_owned(),
        },
    }
}

/// Build `count` well-formed events tagged `htlc-0`, `htlc-1`, ...
#[must_use]
pub fn htlc_events(count: usize) -> Vec<HtlcEvent> {
    (0..count).map(|i| htlc_event(&format!("htlc-{i}"))).collect()
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn event() -> HtlcEvent { htlc_event("htlc-0") }

//! Builders for the resolutions sent back to the node.
//!
//! Every builder copies the event's correlation id verbatim; that id, not
//! arrival order, is what the node uses to match answers to HTLCs.

use log::{info, warn};

use crate::{
    decision::InterceptDecision,
    failure::{FailureReason, failure_code},
    model::{
        ChannelId,
        ChannelPoint,
        HtlcContinue,
        HtlcEvent,
        HtlcFail,
        Resolution,
        ResolutionOutcome,
        ShortChannelId,
    },
    payload::rewrite_hex_payload,
};

/// Forward the HTLC exactly as the node proposed.
#[must_use]
pub fn continue_unmodified(event: &HtlcEvent) -> Resolution {
    Resolution {
        correlation_id: event.correlation_id.clone(),
        outcome: ResolutionOutcome::Continue(HtlcContinue::default()),
    }
}

/// Forward the HTLC over the channel at `channel_point` with a new payload.
#[must_use]
pub fn continue_with_payload(
    event: &HtlcEvent,
    payload_hex: String,
    channel_point: &ChannelPoint,
) -> Resolution {
    Resolution {
        correlation_id: event.correlation_id.clone(),
        outcome: ResolutionOutcome::Continue(HtlcContinue {
            forward_to: Some(ChannelId::from_channel_point(channel_point)),
            payload: Some(payload_hex),
        }),
    }
}

/// Fail the HTLC with the BOLT-4 code for `reason`.
#[must_use]
pub fn fail_with_code(event: &HtlcEvent, reason: FailureReason) -> Resolution {
    Resolution {
        correlation_id: event.correlation_id.clone(),
        outcome: ResolutionOutcome::Fail(HtlcFail {
            failure_message: failure_code(reason).to_owned(),
        }),
    }
}

/// Redirect the HTLC into the channel identified by `short_channel_id`.
///
/// If the onion payload cannot be rewritten the HTLC is failed with
/// `temporary_channel_failure`; the original payload is never forwarded.
#[must_use]
pub fn resume_with_onion(
    event: &HtlcEvent,
    short_channel_id: ShortChannelId,
    channel_point: &ChannelPoint,
) -> Resolution {
    match rewrite_hex_payload(&event.onion.payload, short_channel_id.0) {
        Ok(payload) => {
            info!(
                "redirecting htlc into channel: correlation_id={}, short_channel_id={short_channel_id}, \
                 channel_point={channel_point}",
                event.correlation_id
            );
            continue_with_payload(event, payload, channel_point)
        }
        Err(e) => {
            warn!(
                "failed to rewrite onion payload: correlation_id={}, payload={}, error={e}",
                event.correlation_id, event.onion.payload
            );
            fail_with_code(event, FailureReason::TemporaryChannelFailure)
        }
    }
}

/// Build the resolution that carries out `decision` for `event`.
#[must_use]
pub fn resolve(event: &HtlcEvent, decision: &InterceptDecision) -> Resolution {
    match decision {
        InterceptDecision::ResumeWithOnion {
            short_channel_id,
            channel_point,
        } => resume_with_onion(event, *short_channel_id, channel_point),
        InterceptDecision::FailWithCode(reason) => fail_with_code(event, *reason),
        InterceptDecision::Resume => continue_unmodified(event),
    }
}

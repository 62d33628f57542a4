//! The routing-decision collaborator.
//!
//! The interceptor does not decide what happens to an HTLC; it asks a
//! [`Decider`] and carries out the answer. Deciders may be slow and may fail.
//! A failed or panicking decision is treated as [`InterceptDecision::Resume`],
//! which favours payment completion over strictness.

use std::error::Error;

use async_trait::async_trait;

use crate::{
    failure::FailureReason,
    model::{ChannelPoint, PaymentHash, ShortChannelId},
};

/// Error type returned by [`Decider`] implementations.
pub type DecisionError = Box<dyn Error + Send + Sync>;

/// Payment parameters handed to the decision function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterceptRequest {
    /// Human-readable next hop, `"<unknown>"` when the graph lookup failed.
    pub next_hop: String,
    /// Payment hash of the HTLC.
    pub payment_hash: PaymentHash,
    /// Amount the sender asked us to forward.
    pub outgoing_amount_msat: u64,
    /// CLTV value the sender asked us to use downstream.
    pub outgoing_cltv_value: u32,
    /// Absolute expiry height of the incoming HTLC.
    pub cltv_expiry: u32,
}

/// What to do with an intercepted HTLC.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum InterceptDecision {
    /// Forward unchanged.
    #[default]
    Resume,
    /// Forward over a different channel, rewriting the onion's next hop.
    ResumeWithOnion {
        /// Short id (usually an alias) written into the next-hop record.
        short_channel_id: ShortChannelId,
        /// Funding outpoint of the target channel.
        channel_point: ChannelPoint,
    },
    /// Fail the HTLC back.
    FailWithCode(FailureReason),
}

/// Decides how each intercepted HTLC is handled.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Decider: Send + Sync + 'static {
    /// Decide what to do with the HTLC described by `request`.
    ///
    /// # Errors
    ///
    /// Any error is logged and the HTLC is resumed unchanged.
    async fn decide(&self, request: InterceptRequest) -> Result<InterceptDecision, DecisionError>;
}

/// Decider that resumes every HTLC unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThrough;

#[async_trait]
impl Decider for PassThrough {
    async fn decide(&self, _request: InterceptRequest) -> Result<InterceptDecision, DecisionError> {
        Ok(InterceptDecision::Resume)
    }
}

//! Metric helpers for the interceptor.
//!
//! Names and thin wrappers around the [`metrics`](https://docs.rs/metrics)
//! crate. Without the `metrics` feature every helper is a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Gauge of HTLCs received but not yet resolved.
pub const HTLCS_IN_FLIGHT: &str = "htlc_interceptor_htlcs_in_flight";
/// Counter of resolutions sent, labelled by outcome.
pub const RESOLUTIONS_TOTAL: &str = "htlc_interceptor_resolutions_total";
/// Counter of stream (re)connection attempts that failed.
pub const STREAM_RECONNECTS: &str = "htlc_interceptor_stream_reconnects_total";
/// Counter of handled errors, labelled by kind.
pub const ERRORS_TOTAL: &str = "htlc_interceptor_errors_total";

/// Kind of resolution sent to the node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Forwarded unchanged.
    Continue,
    /// Forwarded into another channel with a rewritten payload.
    Redirect,
    /// Failed back.
    Fail,
}

impl Outcome {
    #[cfg(feature = "metrics")]
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Continue => "continue",
            Outcome::Redirect => "redirect",
            Outcome::Fail => "fail",
        }
    }
}

/// Category of a handled error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Opening or reading the HTLC stream failed.
    Stream,
    /// A resolution could not be sent.
    Send,
    /// The decision function failed or panicked.
    Decision,
    /// An event could not be decoded.
    Decode,
}

impl ErrorKind {
    #[cfg(feature = "metrics")]
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Stream => "stream",
            ErrorKind::Send => "send",
            ErrorKind::Decision => "decision",
            ErrorKind::Decode => "decode",
        }
    }
}

/// Increment the in-flight gauge.
pub fn inc_in_flight() {
    #[cfg(feature = "metrics")]
    gauge!(HTLCS_IN_FLIGHT).increment(1.0);
}

/// Decrement the in-flight gauge.
pub fn dec_in_flight() {
    #[cfg(feature = "metrics")]
    gauge!(HTLCS_IN_FLIGHT).decrement(1.0);
}

/// Record a resolution sent with `outcome`.
pub fn inc_resolutions(outcome: Outcome) {
    #[cfg(feature = "metrics")]
    counter!(RESOLUTIONS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record a failed stream open or receive.
pub fn inc_reconnects() {
    #[cfg(feature = "metrics")]
    counter!(STREAM_RECONNECTS).increment(1);
}

/// Record a handled error of `kind`.
pub fn inc_errors(kind: ErrorKind) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

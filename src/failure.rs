//! Mapping from internal failure reasons to BOLT-4 failure codes.

use std::fmt;

use log::warn;

/// Code sent for `temporary_channel_failure`, also the fallback.
pub const TEMPORARY_CHANNEL_FAILURE: &str = "1007";
/// Code sent for `temporary_node_failure`.
pub const TEMPORARY_NODE_FAILURE: &str = "2002";
/// Code sent for `incorrect_or_unknown_payment_details`.
pub const INCORRECT_OR_UNKNOWN_PAYMENT_DETAILS: &str = "400F";

/// Why the decision function wants an HTLC failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The outgoing channel cannot carry the HTLC right now.
    TemporaryChannelFailure,
    /// This node cannot handle the HTLC right now.
    TemporaryNodeFailure,
    /// The payment is unknown or its parameters are wrong.
    IncorrectOrUnknownPaymentDetails,
    /// Any other numeric reason reported by the decision function.
    Other(u16),
}

impl FailureReason {
    /// Interpret a numeric BOLT-4 code reported by a collaborator.
    ///
    /// # Examples
    ///
    /// ```
    /// use htlc_interceptor::failure::FailureReason;
    ///
    /// assert_eq!(FailureReason::from_code(0x2002), FailureReason::TemporaryNodeFailure);
    /// assert_eq!(FailureReason::from_code(0x4010), FailureReason::Other(0x4010));
    /// ```
    #[must_use]
    pub const fn from_code(code: u16) -> Self {
        match code {
            0x1007 => Self::TemporaryChannelFailure,
            0x2002 => Self::TemporaryNodeFailure,
            0x400f => Self::IncorrectOrUnknownPaymentDetails,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemporaryChannelFailure => f.write_str("temporary_channel_failure"),
            Self::TemporaryNodeFailure => f.write_str("temporary_node_failure"),
            Self::IncorrectOrUnknownPaymentDetails => {
                f.write_str("incorrect_or_unknown_payment_details")
            }
            Self::Other(code) => write!(f, "unknown({code:#06x})"),
        }
    }
}

/// Hex failure code to send for `reason`.
///
/// Unrecognised reasons fall back to [`TEMPORARY_CHANNEL_FAILURE`] so the
/// node always receives a valid failure message.
#[must_use]
pub fn failure_code(reason: FailureReason) -> &'static str {
    match reason {
        FailureReason::TemporaryChannelFailure => TEMPORARY_CHANNEL_FAILURE,
        FailureReason::TemporaryNodeFailure => TEMPORARY_NODE_FAILURE,
        FailureReason::IncorrectOrUnknownPaymentDetails => INCORRECT_OR_UNKNOWN_PAYMENT_DETAILS,
        FailureReason::Other(_) => {
            warn!("unknown failure reason {reason}, defaulting to temporary channel failure");
            TEMPORARY_CHANNEL_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(FailureReason::TemporaryChannelFailure, "1007")]
    #[case(FailureReason::TemporaryNodeFailure, "2002")]
    #[case(FailureReason::IncorrectOrUnknownPaymentDetails, "400F")]
    #[case(FailureReason::Other(0x4010), "1007")]
    #[case(FailureReason::Other(0), "1007")]
    fn maps_reasons_to_codes(#[case] reason: FailureReason, #[case] expected: &str) {
        assert_eq!(failure_code(reason), expected);
    }

    #[rstest]
    #[case(0x1007)]
    #[case(0x2002)]
    #[case(0x400f)]
    fn known_numeric_codes_round_trip(#[case] code: u16) {
        let reason = FailureReason::from_code(code);
        assert!(!matches!(reason, FailureReason::Other(_)));
        assert_eq!(
            u16::from_str_radix(failure_code(reason), 16).expect("hex code"),
            code
        );
    }
}

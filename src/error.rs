//! Top-level error type returned by [`crate::Interceptor`].

use thiserror::Error;

use crate::{lifecycle::LifecycleState, transport::TransportError};

/// Errors surfaced by the interceptor lifecycle.
///
/// Per-HTLC failures never appear here: they are resolved, logged and
/// counted inside the dispatcher.
#[derive(Debug, Error)]
pub enum InterceptorError {
    /// The plugin could not be dialled at start-up.
    #[error("failed to dial plugin at `{address}`: {source}")]
    Dial {
        address: String,
        #[source]
        source: TransportError,
    },
    /// A lifecycle operation was called in a state that does not permit it.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },
}

/// Result alias used by the lifecycle API.
pub type Result<T> = std::result::Result<T, InterceptorError>;

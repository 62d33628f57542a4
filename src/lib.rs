#![doc(html_root_url = "https://docs.rs/htlc_interceptor/latest")]
//! HTLC interception for a Lightning service-provider node.
//!
//! The node streams every HTLC it is about to forward to an
//! [`Interceptor`]. For each one the interceptor asks a [`Decider`] what to
//! do, then answers with a [`Resolution`]: forward unchanged, forward over a
//! different channel with a rewritten onion payload, or fail with a BOLT-4
//! failure code.
//!
//! Every HTLC receives exactly one resolution. Decision errors and panics
//! resolve to "forward unchanged"; payload rewrite failures resolve to a
//! temporary channel failure.

pub mod config;
pub mod decision;
pub mod dispatch;
pub mod error;
pub mod failure;
pub mod graph;
pub mod lifecycle;
pub mod metrics;
pub mod model;
pub mod payload;
pub mod resolution;
pub mod stream;
pub mod tlv;
pub mod transport;

pub use config::{InterceptorConfig, KeepaliveConfig};
pub use decision::{Decider, DecisionError, InterceptDecision, InterceptRequest, PassThrough};
pub use dispatch::Dispatcher;
pub use error::InterceptorError;
pub use failure::{FailureReason, failure_code};
pub use graph::{ChannelEdge, ChannelGraph, GraphError, NoGraph};
pub use lifecycle::{Interceptor, LifecycleState};
pub use model::{
    ChannelId,
    ChannelPoint,
    CorrelationId,
    HtlcEvent,
    NodeId,
    PaymentHash,
    Resolution,
    ResolutionOutcome,
    ShortChannelId,
};
pub use stream::ReconnectConfig;
pub use transport::{
    HtlcStream,
    PluginChannel,
    PluginTransport,
    ResolutionSink,
    TcpTransport,
    TransportError,
};

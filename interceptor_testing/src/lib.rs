//! Test support for `htlc_interceptor`.
//!
//! Provides an in-memory transport whose node side is scriptable, deciders
//! with controllable behaviour, canned HTLC events and a serialised log
//! capture fixture.
//!
//! ```rust,no_run
//! use htlc_interceptor::{Interceptor, InterceptorConfig, NoGraph, PassThrough};
//! use interceptor_testing::{LOCAL_NODE, htlc_event, memory_transport};
//!
//! # async fn example() {
//! let (transport, mut node) = memory_transport();
//! let config = InterceptorConfig::new("memory", LOCAL_NODE);
//! let interceptor = Interceptor::new(&config, transport, PassThrough, NoGraph);
//! let run = interceptor.start();
//! # let _ = run;
//! let mut stream = node.next_stream().await;
//! stream.send(htlc_event("a"));
//! let _resolution = stream.resolution().await;
//! # }
//! ```

pub mod decider;
pub mod events;
pub mod logging;
pub mod transport;

pub use decider::{FnDecider, Gate, GatedDecider, always, gated_decider};
pub use events::{LOCAL_NODE, SAMPLE_PAYLOAD, event, htlc_event, htlc_events};
pub use logging::{LoggerHandle, logger};
pub use transport::{MemoryTransport, NodeHandle, NodeStream, memory_transport};

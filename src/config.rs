//! Runtime configuration for the interceptor.
//!
//! [`InterceptorConfig`] gathers everything the lifecycle controller needs to
//! dial the node plugin, keep the stream alive and bound HTLC fan-out. The
//! builder methods clamp out-of-range values instead of failing.

use std::{num::NonZeroUsize, time::Duration};

use crate::{model::NodeId, stream::ReconnectConfig};

/// Default deadline for a single channel graph lookup.
pub const DEFAULT_GRAPH_TIMEOUT: Duration = Duration::from_secs(5);
/// Default maximum length of a single transport frame.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024;
const MIN_FRAME_LENGTH: usize = 1024;
const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// TCP keepalive settings applied to the plugin connection.
///
/// Probes start after `time` of idleness and repeat every `interval`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Idle time before the first keepalive probe.
    pub time: Duration,
    /// Interval between subsequent probes.
    pub interval: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            time: Duration::from_secs(10),
            interval: Duration::from_secs(10),
        }
    }
}

/// Configuration consumed by [`crate::Interceptor`].
#[derive(Clone, Debug)]
pub struct InterceptorConfig {
    plugin_address: String,
    node_id: NodeId,
    reconnect: ReconnectConfig,
    keepalive: KeepaliveConfig,
    graph_timeout: Duration,
    max_in_flight: Option<NonZeroUsize>,
    max_frame_length: usize,
}

impl InterceptorConfig {
    /// Create a configuration for the plugin at `plugin_address`, acting on
    /// behalf of the local node `node_id`.
    #[must_use]
    pub fn new(plugin_address: impl Into<String>, node_id: NodeId) -> Self {
        Self {
            plugin_address: plugin_address.into(),
            node_id,
            reconnect: ReconnectConfig::default(),
            keepalive: KeepaliveConfig::default(),
            graph_timeout: DEFAULT_GRAPH_TIMEOUT,
            max_in_flight: None,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    /// Override the delay between stream reconnect attempts.
    #[must_use]
    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect.normalized();
        self
    }

    /// Override the TCP keepalive settings.
    #[must_use]
    pub fn keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Override the deadline for channel graph lookups.
    #[must_use]
    pub fn graph_timeout(mut self, timeout: Duration) -> Self {
        self.graph_timeout = timeout;
        self
    }

    /// Bound the number of HTLCs processed concurrently.
    ///
    /// `None` or zero leaves fan-out unbounded.
    #[must_use]
    pub fn max_in_flight(mut self, limit: Option<usize>) -> Self {
        self.max_in_flight = limit.and_then(NonZeroUsize::new);
        self
    }

    /// Set the maximum transport frame length, clamped to 1 KiB..=16 MiB.
    #[must_use]
    pub fn max_frame_length(mut self, len: usize) -> Self {
        self.max_frame_length = len.clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH);
        self
    }

    #[must_use]
    pub fn plugin_address(&self) -> &str { &self.plugin_address }

    #[must_use]
    pub const fn node_id(&self) -> &NodeId { &self.node_id }

    #[must_use]
    pub const fn reconnect_config(&self) -> ReconnectConfig { self.reconnect }

    #[must_use]
    pub const fn keepalive_config(&self) -> KeepaliveConfig { self.keepalive }

    #[must_use]
    pub const fn graph_timeout_duration(&self) -> Duration { self.graph_timeout }

    #[must_use]
    pub const fn max_in_flight_limit(&self) -> Option<NonZeroUsize> { self.max_in_flight }

    #[must_use]
    pub const fn max_frame_len(&self) -> usize { self.max_frame_length }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn node_id() -> NodeId { NodeId([2; 33]) }

    #[test]
    fn defaults() {
        let cfg = InterceptorConfig::new("127.0.0.1:9735", node_id());
        assert_eq!(cfg.plugin_address(), "127.0.0.1:9735");
        assert_eq!(cfg.reconnect_config().delay, Duration::from_secs(1));
        assert_eq!(cfg.keepalive_config(), KeepaliveConfig::default());
        assert_eq!(cfg.graph_timeout_duration(), DEFAULT_GRAPH_TIMEOUT);
        assert!(cfg.max_in_flight_limit().is_none());
        assert_eq!(cfg.max_frame_len(), DEFAULT_MAX_FRAME_LENGTH);
    }

    #[rstest]
    #[case(0, MIN_FRAME_LENGTH)]
    #[case(8 * 1024, 8 * 1024)]
    #[case(usize::MAX, MAX_FRAME_LENGTH)]
    fn frame_length_is_clamped(#[case] requested: usize, #[case] expected: usize) {
        let cfg = InterceptorConfig::new("node:1", node_id()).max_frame_length(requested);
        assert_eq!(cfg.max_frame_len(), expected);
    }

    #[test]
    fn zero_in_flight_limit_means_unbounded() {
        let cfg = InterceptorConfig::new("node:1", node_id()).max_in_flight(Some(0));
        assert!(cfg.max_in_flight_limit().is_none());
    }

    #[test]
    fn reconnect_delay_is_normalized() {
        let cfg = InterceptorConfig::new("node:1", node_id()).reconnect(ReconnectConfig {
            delay: Duration::ZERO,
        });
        assert_eq!(cfg.reconnect_config().delay, Duration::from_millis(1));
    }
}

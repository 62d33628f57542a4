//! Reconnect timing for the HTLC stream.

use std::time::Duration;

/// Delay applied before reopening the HTLC stream after it fails.
///
/// The delay is fixed; it does not grow across consecutive failures.
///
/// # Default Values
/// - `delay`: 1 second
///
/// # Invariants
/// - `delay` must be at least 1 millisecond
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Pause between a stream failure and the next open attempt.
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
        }
    }
}

impl ReconnectConfig {
    /// Clamp the delay to at least one millisecond.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use htlc_interceptor::ReconnectConfig;
    ///
    /// let cfg = ReconnectConfig {
    ///     delay: Duration::ZERO,
    /// };
    /// assert_eq!(cfg.normalized().delay, Duration::from_millis(1));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.delay = self.delay.max(Duration::from_millis(1));
        self
    }
}

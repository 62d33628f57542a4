//! One-shot readiness barrier.

use tokio::sync::watch;

/// Latch released the first time the HTLC stream is open, or when `start`
/// gives up before ever opening it.
///
/// Once released it stays released for the life of the value, so later
/// reconnects never signal again.
#[derive(Debug)]
pub(crate) struct ReadyBarrier {
    tx: watch::Sender<bool>,
}

impl ReadyBarrier {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Release the barrier. Returns `true` only for the call that released it.
    pub(crate) fn release(&self) -> bool {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    pub(crate) fn is_released(&self) -> bool { *self.tx.borrow() }

    /// Wait until [`release`](Self::release) has been called.
    pub(crate) async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a close.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

//! Deciders with scripted behaviour.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use htlc_interceptor::{Decider, DecisionError, InterceptDecision, InterceptRequest};
use tokio::sync::Semaphore;

/// Decider driven by a closure. Counts its calls.
pub struct FnDecider<F> {
    decide: F,
    calls: Arc<AtomicUsize>,
}

impl<F> FnDecider<F>
where
    F: Fn(&InterceptRequest) -> Result<InterceptDecision, DecisionError> + Send + Sync + 'static,
{
    pub fn new(decide: F) -> Self {
        Self {
            decide,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared call counter, readable after the decider has been moved.
    #[must_use]
    pub fn calls(&self) -> Arc<AtomicUsize> { Arc::clone(&self.calls) }
}

#[async_trait]
impl<F> Decider for FnDecider<F>
where
    F: Fn(&InterceptRequest) -> Result<InterceptDecision, DecisionError> + Send + Sync + 'static,
{
    async fn decide(&self, request: InterceptRequest) -> Result<InterceptDecision, DecisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.decide)(&request)
    }
}

/// Always answers `decision`.
pub fn always(
    decision: InterceptDecision,
) -> FnDecider<
    impl Fn(&InterceptRequest) -> Result<InterceptDecision, DecisionError> + Send + Sync + 'static,
> {
    FnDecider::new(move |_| Ok(decision.clone()))
}

/// Parks every decision until [`Gate::open`] releases it, then resumes.
pub struct GatedDecider {
    gate: Arc<Semaphore>,
    entered: Arc<AtomicUsize>,
}

/// Control side of a [`GatedDecider`].
#[derive(Clone)]
pub struct Gate {
    gate: Arc<Semaphore>,
    entered: Arc<AtomicUsize>,
}

/// Build a closed [`GatedDecider`] and its [`Gate`].
#[must_use]
pub fn gated_decider() -> (GatedDecider, Gate) {
    let gate = Arc::new(Semaphore::new(0));
    let entered = Arc::new(AtomicUsize::new(0));
    (
        GatedDecider {
            gate: Arc::clone(&gate),
            entered: Arc::clone(&entered),
        },
        Gate { gate, entered },
    )
}

impl Gate {
    /// Let `n` parked or future decisions complete.
    pub fn open(&self, n: usize) { self.gate.add_permits(n); }

    /// Number of decisions that have started.
    #[must_use]
    pub fn entered(&self) -> usize { self.entered.load(Ordering::SeqCst) }

    /// Wait until `n` decisions have started.
    pub async fn wait_entered(&self, n: usize) {
        while self.entered() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Decider for GatedDecider {
    async fn decide(&self, _request: InterceptRequest) -> Result<InterceptDecision, DecisionError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let _permit = self.gate.acquire().await?;
        Ok(InterceptDecision::Resume)
    }
}

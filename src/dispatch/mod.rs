//! Per-HTLC fan-out.
//!
//! [`Dispatcher::dispatch`] hands each intercepted HTLC to its own task and
//! returns immediately, so one slow decision never blocks the receive loop.
//! Every task ends by sending exactly one [`Resolution`]; decision errors
//! and panics are downgraded to "forward unchanged".

use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::Duration,
};

use futures::FutureExt;
use log::{error, info, warn};
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::{
    config::InterceptorConfig,
    decision::{Decider, InterceptDecision, InterceptRequest},
    graph::{ChannelGraph, next_hop_label},
    metrics::{self, ErrorKind, Outcome},
    model::{HtlcEvent, NodeId, PaymentHash, Resolution, ResolutionOutcome},
    resolution::{continue_unmodified, resolve},
    transport::ResolutionSink,
};

mod counter;

use counter::InFlightHtlc;

/// Spawns and tracks one handler task per intercepted HTLC.
pub struct Dispatcher<D, G> {
    handler: Arc<Handler<D, G>>,
    tracker: TaskTracker,
    limiter: Option<Arc<Semaphore>>,
}

struct Handler<D, G> {
    decider: D,
    graph: G,
    node_id: NodeId,
    graph_timeout: Duration,
}

impl<D, G> Dispatcher<D, G>
where
    D: Decider,
    G: ChannelGraph,
{
    /// Build a dispatcher that consults `decider` and labels next hops using
    /// `graph`.
    #[must_use]
    pub fn new(decider: D, graph: G, config: &InterceptorConfig) -> Self {
        Self {
            handler: Arc::new(Handler {
                decider,
                graph,
                node_id: *config.node_id(),
                graph_timeout: config.graph_timeout_duration(),
            }),
            tracker: TaskTracker::new(),
            limiter: config
                .max_in_flight_limit()
                .map(|limit| Arc::new(Semaphore::new(limit.get()))),
        }
    }

    /// Number of HTLCs accepted but not yet resolved.
    #[must_use]
    pub fn in_flight(&self) -> usize { self.tracker.len() }

    /// Start handling `event`; its resolution is sent on `sink`.
    ///
    /// The HTLC counts as in flight as soon as this returns. When a
    /// concurrency limit is configured this waits for a free slot first.
    pub async fn dispatch(&self, event: HtlcEvent, sink: ResolutionSink) {
        let permit = match &self.limiter {
            Some(limiter) => Arc::clone(limiter).acquire_owned().await.ok(),
            None => None,
        };
        let handler = Arc::clone(&self.handler);
        let guard = InFlightHtlc::new();
        let span = tracing::info_span!("htlc", correlation_id = %event.correlation_id);
        self.tracker.spawn(
            async move {
                let _guard = guard;
                let _permit = permit;
                handler.handle(event, &sink).await;
            }
            .instrument(span),
        );
    }

    /// Wait until every dispatched HTLC has been resolved.
    ///
    /// Dispatching after `drain` is not allowed until [`reopen`](Self::reopen).
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Accept new HTLCs again after a [`drain`](Self::drain).
    pub fn reopen(&self) { self.tracker.reopen(); }
}

impl<D, G> Handler<D, G>
where
    D: Decider,
    G: ChannelGraph,
{
    async fn handle(&self, event: HtlcEvent, sink: &ResolutionSink) {
        let resolution = self.resolution_for(&event).await;
        let outcome = outcome_of(&resolution);
        match sink.send(resolution).await {
            Ok(()) => metrics::inc_resolutions(outcome),
            Err(e) => {
                warn!(
                    "failed to send resolution: correlation_id={}, error={e}",
                    event.correlation_id
                );
                metrics::inc_errors(ErrorKind::Send);
            }
        }
    }

    async fn resolution_for(&self, event: &HtlcEvent) -> Resolution {
        let payment_hash = match event.htlc.payment_hash.parse::<PaymentHash>() {
            Ok(hash) => hash,
            Err(e) => {
                warn!(
                    "undecodable payment hash, forwarding unchanged: correlation_id={}, error={e}",
                    event.correlation_id
                );
                metrics::inc_errors(ErrorKind::Decode);
                return continue_unmodified(event);
            }
        };
        let next_hop = next_hop_label(
            &self.graph,
            &self.node_id,
            event.onion.short_channel_id,
            self.graph_timeout,
        )
        .await;
        info!(
            "htlc intercepted: correlation_id={}, short_channel_id={}, next_hop={next_hop}, \
             incoming_amount_msat={}, outgoing_amount_msat={}, cltv_expiry={}, \
             cltv_expiry_relative={}, payment_hash={payment_hash}",
            event.correlation_id,
            event.onion.short_channel_id,
            event.htlc.amount_msat,
            event.onion.forward_msat,
            event.htlc.cltv_expiry,
            event.htlc.cltv_expiry_relative,
        );
        let request = InterceptRequest {
            next_hop,
            payment_hash,
            outgoing_amount_msat: event.onion.forward_msat,
            outgoing_cltv_value: event.onion.outgoing_cltv_value,
            cltv_expiry: event.htlc.cltv_expiry,
        };
        let decision = self.decide(request).await;
        resolve(event, &decision)
    }

    async fn decide(&self, request: InterceptRequest) -> InterceptDecision {
        match AssertUnwindSafe(self.decider.decide(request))
            .catch_unwind()
            .await
        {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                warn!("decision failed, forwarding unchanged: error={e}");
                metrics::inc_errors(ErrorKind::Decision);
                InterceptDecision::Resume
            }
            Err(panic) => {
                let panic_msg = panic_message(panic.as_ref());
                error!("decision panicked, forwarding unchanged: panic={panic_msg}");
                tracing::error!(panic = %panic_msg, "decision panicked");
                metrics::inc_errors(ErrorKind::Decision);
                InterceptDecision::Resume
            }
        }
    }
}

fn outcome_of(resolution: &Resolution) -> Outcome {
    match &resolution.outcome {
        ResolutionOutcome::Continue(cont) if cont.forward_to.is_some() => Outcome::Redirect,
        ResolutionOutcome::Continue(_) => Outcome::Continue,
        ResolutionOutcome::Fail(_) => Outcome::Fail,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

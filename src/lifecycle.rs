//! Interceptor lifecycle: start, readiness, graceful stop.
//!
//! [`Interceptor::start`] dials the plugin once and then runs the stream
//! manager until [`Interceptor::stop`] is called. Stop first waits for the
//! receive loop to let go of the stream, then for every in-flight HTLC to be
//! resolved, and only then tears the connection down.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

use log::{debug, error, info};
use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::{
    config::InterceptorConfig,
    decision::Decider,
    dispatch::Dispatcher,
    error::{InterceptorError, Result},
    graph::ChannelGraph,
    stream::{LoopExit, ReadyBarrier, ReconnectConfig, SessionTokens, run_stream_loop},
    transport::{PluginChannel, PluginTransport},
};

/// Externally visible lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Built but never started.
    Created,
    /// `start` is running but no stream has opened yet.
    Starting,
    /// The HTLC stream has been opened at least once in this run.
    Running,
    /// `stop` is draining in-flight HTLCs.
    Stopping,
    /// The last run has ended; `start` may be called again.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        })
    }
}

#[derive(Clone, Debug, Default)]
struct Session {
    tokens: SessionTokens,
    /// Cancelled once `start` has left the stream loop.
    receiver_done: CancellationToken,
}

#[derive(Debug)]
struct Inner {
    state: LifecycleState,
    session: Option<Session>,
}

/// HTLC interceptor bound to one plugin transport.
pub struct Interceptor<T, D, G> {
    transport: T,
    dispatcher: Dispatcher<D, G>,
    address: String,
    reconnect: ReconnectConfig,
    inner: Mutex<Inner>,
    ready: ReadyBarrier,
}

impl<T, D, G> Interceptor<T, D, G>
where
    T: PluginTransport,
    D: Decider,
    G: ChannelGraph,
{
    /// Assemble an interceptor. Nothing is dialled until [`start`](Self::start).
    #[must_use]
    pub fn new(config: &InterceptorConfig, transport: T, decider: D, graph: G) -> Self {
        Self {
            transport,
            dispatcher: Dispatcher::new(decider, graph, config),
            address: config.plugin_address().to_owned(),
            reconnect: config.reconnect_config(),
            inner: Mutex::new(Inner {
                state: LifecycleState::Created,
                session: None,
            }),
            ready: ReadyBarrier::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState { self.lock_inner().state }

    /// Number of HTLCs received but not yet resolved.
    #[must_use]
    pub fn in_flight(&self) -> usize { self.dispatcher.in_flight() }

    /// Whether [`wait_until_ready`](Self::wait_until_ready) would return
    /// immediately.
    #[must_use]
    pub fn is_ready(&self) -> bool { self.ready.is_released() }

    /// Wait until the HTLC stream has opened for the first time, or until
    /// the first `start` has given up.
    ///
    /// Readiness is signalled at most once per interceptor; later reconnects
    /// and restarts do not signal again.
    pub async fn wait_until_ready(&self) { self.ready.wait().await; }

    /// Dial the plugin and run the stream loop until [`stop`](Self::stop).
    ///
    /// Returns once the loop has exited and every HTLC it received has been
    /// resolved.
    ///
    /// # Errors
    ///
    /// Returns [`InterceptorError::Dial`] if the plugin cannot be dialled and
    /// [`InterceptorError::InvalidState`] if the interceptor is already
    /// running.
    pub async fn start(&self) -> Result<()> {
        let session = self.begin_start()?;
        let receiver_done = session.receiver_done.clone().drop_guard();
        let outcome = self.run_session(&session.tokens).await;
        drop(receiver_done);

        if self.ready.release() {
            debug!("readiness released without an open htlc stream");
        }
        info!(
            "htlc receiver stopped; waiting for in-flight htlcs: in_flight={}",
            self.in_flight()
        );
        self.dispatcher.drain().await;
        self.finish_start();
        outcome
    }

    /// Stop intercepting and wait for in-flight HTLCs to be resolved.
    ///
    /// Events that arrive after this call are left to the node. Calling
    /// `stop` on an interceptor that is not running is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`InterceptorError::InvalidState`] if another `stop` is
    /// already in progress.
    pub async fn stop(&self) -> Result<()> {
        let session = {
            let mut inner = self.lock_inner();
            match inner.state {
                LifecycleState::Starting | LifecycleState::Running => {}
                LifecycleState::Created | LifecycleState::Stopped => {
                    debug!("stop ignored: state={}", inner.state);
                    return Ok(());
                }
                LifecycleState::Stopping => {
                    return Err(InterceptorError::InvalidState {
                        operation: "stop",
                        state: inner.state,
                    });
                }
            }
            inner.state = LifecycleState::Stopping;
            inner.session.clone().unwrap_or_default()
        };

        info!("stop requested; waiting for htlc receiver");
        session.tokens.stop.cancel();
        session.receiver_done.cancelled().await;
        info!("waiting for in-flight htlcs: in_flight={}", self.in_flight());
        self.dispatcher.drain().await;
        session.tokens.connection.cancel();

        let mut inner = self.lock_inner();
        inner.state = LifecycleState::Stopped;
        inner.session = None;
        drop(inner);
        info!("interceptor stopped");
        Ok(())
    }

    fn begin_start(&self) -> Result<Session> {
        let mut inner = self.lock_inner();
        match inner.state {
            LifecycleState::Created | LifecycleState::Stopped => {}
            state => {
                return Err(InterceptorError::InvalidState {
                    operation: "start",
                    state,
                });
            }
        }
        let session = Session::default();
        inner.state = LifecycleState::Starting;
        inner.session = Some(session.clone());
        self.dispatcher.reopen();
        Ok(session)
    }

    fn finish_start(&self) {
        let mut inner = self.lock_inner();
        if matches!(
            inner.state,
            LifecycleState::Starting | LifecycleState::Running
        ) {
            inner.state = LifecycleState::Stopped;
            inner.session = None;
        }
    }

    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    async fn run_session(&self, tokens: &SessionTokens) -> Result<()> {
        info!("dialling plugin: address={}", self.address);
        let dialled = select! {
            biased;

            () = tokens.stop.cancelled() => return Ok(()),
            () = tokens.connection.cancelled() => return Ok(()),
            res = self.transport.dial() => res,
        };
        let channel: Box<dyn PluginChannel> = match dialled {
            Ok(channel) => channel,
            Err(source) => {
                error!("failed to dial plugin: address={}, error={source}", self.address);
                return Err(InterceptorError::Dial {
                    address: self.address.clone(),
                    source,
                });
            }
        };
        let exit = run_stream_loop(
            channel.as_ref(),
            &self.dispatcher,
            self.reconnect,
            tokens,
            || self.mark_open(),
        )
        .await;
        match exit {
            LoopExit::StopRequested => info!("htlc stream loop exited: reason=stop"),
            LoopExit::Cancelled => info!("htlc stream loop exited: reason=cancelled"),
        }
        Ok(())
    }

    fn mark_open(&self) {
        if self.ready.release() {
            info!("interceptor ready: address={}", self.address);
        }
        let mut inner = self.lock_inner();
        if inner.state == LifecycleState::Starting {
            inner.state = LifecycleState::Running;
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! The dispatcher: submission, the dispatch loop and shutdown.
//!
//! # Responsibilities
//! - Accept GET/POST submissions and hand back a handle immediately
//! - Queue envelopes (bounded, FIFO) for the single dispatch loop
//! - Fan each dequeued envelope out to its own execution task
//! - Close exactly once, releasing queued envelopes and idle connections
//!
//! # Design Decisions
//! - The loop owns the queue receiver; no lock guards queue state
//! - The closed flag is a one-way atomic inside [`Shutdown`]
//! - Every handle resolves: submissions refused after close carry `Closed`,
//!   envelopes still queued at close carry `Abandoned`

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Request;
use serde::Serialize;
use tokio::sync::mpsc::error::{SendError, TrySendError};
use tokio::sync::{broadcast, mpsc, watch};

use crate::config::{validate_config, ConfigError, DispatcherConfig, OverflowPolicy};
use crate::dispatch::envelope::{build_get, build_post, Envelope, Handle};
use crate::dispatch::execute::execute;
use crate::dispatch::tracker::InFlightTracker;
use crate::dispatch::types::{DispatchError, DispatchResult, Headers, Method};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::transport::TransportPool;

/// Dispatch loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Draining the queue.
    Running,
    /// Exited; terminal.
    Closed,
}

/// Asynchronous HTTP request dispatcher.
///
/// Owns a transport pool and one background dispatch loop. Must be created
/// from within a Tokio runtime. Dropping the dispatcher closes it.
pub struct Dispatcher {
    queue: mpsc::Sender<Envelope>,
    shutdown: Shutdown,
    state: watch::Receiver<LoopState>,
    tracker: InFlightTracker,
    overflow: OverflowPolicy,
    error_statuses: HashSet<u16>,
}

impl Dispatcher {
    /// Create a dispatcher with explicit pool limits.
    ///
    /// `timeout_secs == 0` makes every call time out immediately.
    pub fn new(
        timeout_secs: u64,
        max_conns_per_host: usize,
        max_idle_conns_per_host: usize,
        idle_timeout_secs: u64,
    ) -> Result<Self, DispatchError> {
        let mut config = DispatcherConfig::default();
        config.timeouts.request_secs = timeout_secs;
        config.timeouts.idle_secs = idle_timeout_secs;
        config.pool.max_connections_per_host = max_conns_per_host;
        config.pool.max_idle_connections_per_host = max_idle_conns_per_host;
        Self::from_config(config)
    }

    /// Create a dispatcher whose pool limits come from the environment
    /// (`MAX_CONNECTION_PER_HOST`, `MAX_IDLE_CONNECTION_PER_HOST`).
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, DispatchError> {
        let mut config = DispatcherConfig::from_env();
        config.timeouts.request_secs = timeout_secs;
        Self::from_config(config)
    }

    /// Create a dispatcher from a full configuration.
    ///
    /// Fails with [`DispatchError::Runtime`] when called outside a Tokio
    /// runtime.
    pub fn from_config(config: DispatcherConfig) -> Result<Self, DispatchError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(DispatchError::Runtime)?;
        validate_config(&config).map_err(ConfigError::Validation)?;

        let pool = Arc::new(TransportPool::new(&config.pool, &config.timeouts)?);
        let (queue, rx) = mpsc::channel(config.queue.capacity);
        let shutdown = Shutdown::new();
        let (state_tx, state) = watch::channel(LoopState::Running);
        let tracker = InFlightTracker::new(config.dispatch.max_in_flight);

        runtime.spawn(run_loop(
            rx,
            shutdown.subscribe(),
            pool,
            tracker.clone(),
            state_tx,
        ));

        tracing::info!(
            queue_capacity = config.queue.capacity,
            overflow = ?config.queue.overflow,
            max_in_flight = config.dispatch.max_in_flight,
            "Dispatcher started"
        );

        Ok(Self {
            queue,
            shutdown,
            state,
            tracker,
            overflow: config.queue.overflow,
            error_statuses: config.dispatch.error_status_codes.into_iter().collect(),
        })
    }

    /// Submit a GET request.
    pub async fn get(&self, url: &str, headers: Option<&Headers>) -> Handle {
        self.submit(Method::Get, build_get(url, headers)).await
    }

    /// Submit a POST request with `body` encoded as JSON.
    pub async fn post<T>(&self, url: &str, headers: Option<&Headers>, body: &T) -> Handle
    where
        T: Serialize + ?Sized,
    {
        self.submit(Method::Post, build_post(url, headers, body)).await
    }

    /// Wait for a handle's result.
    ///
    /// Responses whose status is configured as an error come back as
    /// [`DispatchError::Status`]. Consumes the handle, so each result is read
    /// at most once.
    pub async fn get_result(&self, handle: Handle) -> DispatchResult {
        let response = handle.recv().await?;
        if self.error_statuses.contains(&response.status.as_u16()) {
            return Err(DispatchError::Status(response.status));
        }
        Ok(response)
    }

    /// Stop dispatching. Idempotent and safe to call concurrently.
    ///
    /// Requests already executing run to completion.
    pub fn close(&self) {
        if self.shutdown.trigger() {
            tracing::info!(in_flight = self.tracker.active_count(), "Dispatcher closing");
        }
    }

    /// Whether [`Dispatcher::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Current state of the dispatch loop.
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Wait until the dispatch loop has exited.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == LoopState::Closed).await;
    }

    /// Number of execution tasks currently running.
    pub fn in_flight(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Wait for running execution tasks to finish.
    ///
    /// Returns `false` if some were still running when `timeout` elapsed.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.wait_idle(timeout).await
    }

    async fn submit(&self, method: Method, built: Result<Request, DispatchError>) -> Handle {
        let request = match built {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(method = %method, error = %e, "Request not submitted");
                metrics::record_rejected(e.kind());
                return Handle::ready(Err(e));
            }
        };

        if self.shutdown.is_triggered() {
            tracing::warn!(method = %method, url = %request.url(), "Dispatcher closed, refusing request");
            metrics::record_rejected("closed");
            return Handle::ready(Err(DispatchError::Closed));
        }

        let (envelope, handle) = Envelope::new(method, request);
        tracing::trace!(request_id = %envelope.id, method = %method, "Request queued");

        match self.overflow {
            OverflowPolicy::Block => {
                if let Err(SendError(envelope)) = self.queue.send(envelope).await {
                    refuse(envelope, DispatchError::Closed);
                }
            }
            OverflowPolicy::Reject => match self.queue.try_send(envelope) {
                Ok(()) => {}
                Err(TrySendError::Full(envelope)) => refuse(envelope, DispatchError::QueueFull),
                Err(TrySendError::Closed(envelope)) => refuse(envelope, DispatchError::Closed),
            },
        }

        handle
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.close();
    }
}

fn refuse(envelope: Envelope, err: DispatchError) {
    tracing::warn!(request_id = %envelope.id, error = %err, "Request refused");
    metrics::record_rejected(err.kind());
    envelope.reject(err);
}

/// The single consumer of the dispatch queue.
async fn run_loop(
    mut queue: mpsc::Receiver<Envelope>,
    mut shutdown: broadcast::Receiver<()>,
    pool: Arc<TransportPool>,
    tracker: InFlightTracker,
    state: watch::Sender<LoopState>,
) {
    tracing::debug!("Dispatcher loop started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::debug!("Dispatcher loop received shutdown signal");
                break;
            }
            next = queue.recv() => match next {
                Some(envelope) => {
                    let guard = tracker.track();
                    tokio::spawn(execute(Arc::clone(&pool), tracker.clone(), guard, envelope));
                }
                None => {
                    tracing::debug!("All submitters gone");
                    break;
                }
            }
        }
    }

    // No further pushes; whatever is still queued is dropped unexecuted.
    queue.close();
    let mut abandoned = 0;
    while let Ok(envelope) = queue.try_recv() {
        tracing::debug!(request_id = %envelope.id, "Abandoning queued request");
        abandoned += 1;
    }
    if abandoned > 0 {
        tracing::warn!(abandoned, "Queued requests dropped at close");
        metrics::record_abandoned(abandoned);
    }

    pool.close_idle_connections();
    state.send_replace(LoopState::Closed);
    tracing::info!("Dispatcher loop stopped");
}

//! Shared HTTP transport with per-host connection limits.
//!
//! # Responsibilities
//! - Own the `reqwest::Client` used by every execution task
//! - Enforce max concurrent connections per host
//! - Apply the per-request deadline (connect, send and body read)
//! - Release idle connections on demand

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use reqwest::{Client, Request};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::config::{PoolConfig, TimeoutConfig};
use crate::dispatch::types::{DispatchError, DispatchResult, Response};

/// Connection-limited HTTP client shared by all execution tasks.
#[derive(Debug)]
pub struct TransportPool {
    /// Current client. Swapped for a fresh one to drop idle connections.
    client: ArcSwap<Client>,
    /// Map of `host:port` -> connection slots.
    hosts: DashMap<String, Arc<Semaphore>>,
    max_connections_per_host: usize,
    max_idle_per_host: usize,
    request_timeout: Duration,
    idle_timeout: Duration,
}

impl TransportPool {
    /// Create a new pool from configuration.
    pub fn new(pool: &PoolConfig, timeouts: &TimeoutConfig) -> Result<Self, DispatchError> {
        let request_timeout = timeouts.request_timeout();
        let idle_timeout = timeouts.idle_timeout();
        let client = build_client(pool.max_idle_connections_per_host, idle_timeout, request_timeout)
            .map_err(DispatchError::Build)?;

        tracing::debug!(
            max_connections_per_host = pool.max_connections_per_host,
            max_idle_per_host = pool.max_idle_connections_per_host,
            request_timeout = ?request_timeout,
            idle_timeout = ?idle_timeout,
            "Transport pool created"
        );

        Ok(Self {
            client: ArcSwap::from_pointee(client),
            hosts: DashMap::new(),
            max_connections_per_host: pool.max_connections_per_host,
            max_idle_per_host: pool.max_idle_connections_per_host,
            request_timeout,
            idle_timeout,
        })
    }

    /// Perform one call and drain its body.
    ///
    /// The host's connection slot is held until the body has been read, so at
    /// most `max_connections_per_host` calls touch a host at once. Waiting
    /// for a slot counts against the request deadline.
    ///
    /// Besides the client's own timer, the deadline is checked after each
    /// stage: timers have millisecond granularity, and a sub-millisecond
    /// deadline must still fail every call.
    pub async fn fetch(&self, request: Request) -> DispatchResult {
        let started = Instant::now();
        let _permit = self.acquire_slot(request.url()).await?;
        self.check_deadline(started)?;

        let client = self.client.load_full();
        let response = client
            .execute(request)
            .await
            .map_err(DispatchError::from_transport)?;
        self.check_deadline(started)?;

        let status = response.status();
        let headers = response.headers().clone();
        // A body read failure wins over the status.
        let body = response.bytes().await.map_err(DispatchError::from_read)?;
        self.check_deadline(started)?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }

    /// Drop every idle pooled connection.
    ///
    /// Calls already running keep the old client alive until they finish;
    /// its idle connections go away with it.
    pub fn close_idle_connections(&self) {
        match build_client(self.max_idle_per_host, self.idle_timeout, self.request_timeout) {
            Ok(client) => {
                self.client.store(Arc::new(client));
                tracing::debug!("Idle connections released");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to rebuild HTTP client, idle connections kept");
            }
        }
    }

    /// Number of connection slots currently taken for a host.
    pub fn active_connections(&self, url: &Url) -> usize {
        self.hosts
            .get(&host_key(url))
            .map(|slots| self.max_connections_per_host - slots.available_permits())
            .unwrap_or(0)
    }

    fn check_deadline(&self, started: Instant) -> Result<(), DispatchError> {
        if started.elapsed() >= self.request_timeout {
            Err(DispatchError::Timeout)
        } else {
            Ok(())
        }
    }

    async fn acquire_slot(&self, url: &Url) -> Result<OwnedSemaphorePermit, DispatchError> {
        let slots = self
            .hosts
            .entry(host_key(url))
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_connections_per_host)))
            .value()
            .clone();

        match tokio::time::timeout(self.request_timeout, slots.acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            // Slots are never closed; treat it like a shut-down pool.
            Ok(Err(_)) => Err(DispatchError::Closed),
            Err(_) => Err(DispatchError::Timeout),
        }
    }
}

fn build_client(
    max_idle_per_host: usize,
    idle_timeout: Duration,
    request_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .pool_max_idle_per_host(max_idle_per_host)
        .pool_idle_timeout(idle_timeout)
        .timeout(request_timeout)
        .no_proxy()
        .build()
}

/// Key connection slots by `host:port`.
fn host_key(url: &Url) -> String {
    format!(
        "{}:{}",
        url.host_str().unwrap_or_default(),
        url.port_or_known_default().unwrap_or_default()
    )
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dispatcher.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-host connection cap when nothing else is configured.
pub const DEFAULT_CONNECTIONS_PER_HOST: usize = 20;

/// Root configuration for the request dispatcher.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Transport pool limits.
    pub pool: PoolConfig,

    /// Dispatch queue sizing and overflow behavior.
    pub queue: QueueConfig,

    /// Execution task settings.
    pub dispatch: DispatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request deadline in seconds. `0` forces an immediate timeout.
    pub request_secs: u64,

    /// How long an idle pooled connection is kept, in seconds.
    pub idle_secs: u64,
}

impl TimeoutConfig {
    /// Resolve the per-call deadline.
    ///
    /// Zero does not mean "no timeout": it maps to a one nanosecond deadline
    /// so every call fails with a timeout.
    pub fn request_timeout(&self) -> Duration {
        if self.request_secs == 0 {
            Duration::from_nanos(1)
        } else {
            Duration::from_secs(self.request_secs)
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            idle_secs: 30,
        }
    }
}

/// Connection pool limits for the shared transport.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum concurrent connections to a single host.
    pub max_connections_per_host: usize,

    /// Maximum idle connections kept per host.
    pub max_idle_connections_per_host: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections_per_host: DEFAULT_CONNECTIONS_PER_HOST,
            max_idle_connections_per_host: DEFAULT_CONNECTIONS_PER_HOST,
        }
    }
}

/// What a submitter experiences when the queue is full.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Wait for capacity (backpressure).
    #[default]
    Block,
    /// Fail the submission with a queue-full error.
    Reject,
}

/// Dispatch queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of envelopes the queue buffers before applying the overflow policy.
    pub capacity: usize,

    /// Behavior when the queue is full.
    pub overflow: OverflowPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            overflow: OverflowPolicy::Block,
        }
    }
}

/// Execution task configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound on concurrently running execution tasks (0 = unbounded,
    /// concurrency is then limited only by the per-host connection cap).
    pub max_in_flight: usize,

    /// Response statuses reported as errors when a result is read.
    pub error_status_codes: Vec<u16>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 0,
            error_status_codes: vec![400, 403, 409, 502],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

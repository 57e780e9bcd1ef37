//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! dispatcher, loop, execution tasks produce:
//!     → logging.rs (structured log events with request_id)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

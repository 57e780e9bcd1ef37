//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Construction:
//!     Config → TransportPool → spawn dispatcher loop → Running
//!
//! Shutdown (shutdown.rs):
//!     close() → signal loop once → loop drops queued envelopes
//!     → idle connections released → Closed
//!
//! Signals (signals.rs):
//!     SIGINT → close()
//! ```
//!
//! # Design Decisions
//! - Close is idempotent and safe to race
//! - Shutdown does not cancel requests already executing

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;

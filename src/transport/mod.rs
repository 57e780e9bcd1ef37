//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! Execution task
//!     → pool.rs (per-host slot, shared reqwest client, deadline)
//!     → backend server
//!     → pool.rs (drain body)
//!     → Response or DispatchError
//! ```
//!
//! # Design Decisions
//! - One pool per dispatcher, created at construction
//! - Per-host connection caps are explicit semaphores, not left to the client
//! - Idle connections are released once, when the dispatcher closes

pub mod pool;

pub use pool::TransportPool;

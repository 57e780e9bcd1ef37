//! Asynchronous HTTP request dispatcher.
//!
//! Callers submit GET/POST requests, a single background loop fans them out
//! to concurrent execution tasks over a shared connection-limited pool, and
//! each caller collects exactly one result through its handle.

pub mod config;
pub mod dispatch;
pub mod lifecycle;
pub mod observability;
pub mod transport;

pub use config::DispatcherConfig;
pub use dispatch::{DispatchError, DispatchResult, Dispatcher, Handle, Headers, Response};
pub use lifecycle::Shutdown;

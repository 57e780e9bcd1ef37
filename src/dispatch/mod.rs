//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! caller
//!     → dispatcher.rs (get/post: build envelope, or resolve handle early)
//!     → bounded queue (FIFO)
//!     → dispatcher.rs run_loop (single consumer, select with shutdown)
//!     → execute.rs (one task per envelope)
//!     → transport pool
//!     → envelope reply slot (exactly one result)
//!     → caller: Dispatcher::get_result(handle)
//! ```
//!
//! # Design Decisions
//! - Submission never waits on network I/O
//! - Completion order is independent of submission order
//! - Close stops dispatch but never cancels running tasks

pub mod dispatcher;
pub mod envelope;
pub mod execute;
pub mod tracker;
pub mod types;

pub use dispatcher::{Dispatcher, LoopState};
pub use envelope::{Envelope, Handle, JSON_CONTENT_TYPE};
pub use tracker::InFlightTracker;
pub use types::{DispatchError, DispatchResult, Headers, Method, RequestId, Response};

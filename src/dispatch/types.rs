//! Request, response and error types shared across the dispatch pipeline.

use std::collections::HashMap;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;

/// Caller-supplied headers, merged onto the outgoing request.
pub type Headers = HashMap<String, String>;

/// Unique identifier for a submitted request, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two request kinds the dispatcher issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Response body, drained before the result is delivered.
    pub body: Bytes,
}

impl Response {
    /// Body as UTF-8 text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Errors that can occur while dispatching a request.
///
/// Request-level failures are delivered through the request's handle, never
/// raised from the submitting call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The POST body could not be serialized.
    #[error("Encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// Method, URL or headers could not form a request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Network failure or connection refusal.
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The per-request deadline elapsed.
    #[error("Request timed out")]
    Timeout,

    /// The response body could not be drained.
    #[error("Response read error: {0}")]
    Read(#[source] reqwest::Error),

    /// The response carried a status configured as an error.
    #[error("Error status {0}")]
    Status(StatusCode),

    /// The request was dropped without a result, e.g. queued when the
    /// dispatcher closed.
    #[error("Request abandoned before a result was produced")]
    Abandoned,

    /// The dispatcher was closed before the request could be queued.
    #[error("Dispatcher is closed")]
    Closed,

    /// The queue was full and the overflow policy rejects.
    #[error("Dispatch queue is full")]
    QueueFull,

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Construction happened outside a Tokio runtime.
    #[error("No Tokio runtime: {0}")]
    Runtime(#[source] tokio::runtime::TryCurrentError),
}

impl DispatchError {
    /// Classify a transport failure.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DispatchError::Timeout
        } else {
            DispatchError::Transport(err)
        }
    }

    /// Classify a failure while draining the body. A deadline hit mid-body
    /// is still a timeout.
    pub(crate) fn from_read(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DispatchError::Timeout
        } else {
            DispatchError::Read(err)
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Encode(_) => "encode",
            DispatchError::InvalidRequest(_) => "invalid_request",
            DispatchError::Transport(_) => "transport",
            DispatchError::Timeout => "timeout",
            DispatchError::Read(_) => "read",
            DispatchError::Status(_) => "status",
            DispatchError::Abandoned => "abandoned",
            DispatchError::Closed => "closed",
            DispatchError::QueueFull => "queue_full",
            DispatchError::Build(_) => "build",
            DispatchError::Config(_) => "config",
            DispatchError::Runtime(_) => "runtime",
        }
    }
}

/// The single value delivered for every submitted request.
pub type DispatchResult = Result<Response, DispatchError>;

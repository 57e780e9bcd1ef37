//! Request envelopes and result handles.
//!
//! # Responsibilities
//! - Turn a caller's method, URL, headers and body into a ready request
//! - Pair each request with a one-shot reply slot
//! - Give the caller a handle that yields exactly one result
//!
//! # Design Decisions
//! - Requests are fully built before they are queued, so a bad URL or an
//!   unencodable body never reaches the queue
//! - `Content-Type: application/json` always wins over caller headers
//! - A handle whose reply slot is dropped resolves to `Abandoned`

use std::time::Instant;

use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Request;
use serde::Serialize;
use tokio::sync::oneshot;
use url::Url;

use crate::dispatch::types::{DispatchError, DispatchResult, Headers, Method, RequestId};

/// Content type forced onto every outgoing request.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// One pending call and its private reply slot.
#[derive(Debug)]
pub struct Envelope {
    pub id: RequestId,
    pub method: Method,
    pub request: Request,
    pub submitted_at: Instant,
    reply: oneshot::Sender<DispatchResult>,
}

impl Envelope {
    /// Wrap a built request, returning the envelope and the caller's handle.
    pub fn new(method: Method, request: Request) -> (Self, Handle) {
        let id = RequestId::new();
        let (reply, rx) = oneshot::channel();
        let envelope = Self {
            id,
            method,
            request,
            submitted_at: Instant::now(),
            reply,
        };
        (envelope, Handle { id, rx })
    }

    /// Split into the request and its reply slot.
    pub fn into_parts(self) -> (Request, Reply) {
        (
            self.request,
            Reply {
                id: self.id,
                tx: self.reply,
            },
        )
    }

    /// Resolve the envelope without executing it.
    pub fn reject(self, err: DispatchError) {
        let (_, reply) = self.into_parts();
        reply.send(Err(err));
    }
}

/// Write end of an envelope's reply slot. Consumed by the single send.
#[derive(Debug)]
pub struct Reply {
    id: RequestId,
    tx: oneshot::Sender<DispatchResult>,
}

impl Reply {
    /// Deliver the result. A caller that dropped its handle is not an error.
    pub fn send(self, result: DispatchResult) {
        if self.tx.send(result).is_err() {
            tracing::trace!(request_id = %self.id, "Handle dropped before result delivery");
        }
    }
}

/// Caller-held reference to a request's eventual result.
#[derive(Debug)]
pub struct Handle {
    id: RequestId,
    rx: oneshot::Receiver<DispatchResult>,
}

impl Handle {
    /// A handle that already holds its result.
    pub fn ready(result: DispatchResult) -> Self {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            id: RequestId::new(),
            rx,
        };
        let _ = tx.send(result);
        handle
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the raw result, with no status classification.
    pub async fn recv(self) -> DispatchResult {
        self.rx.await.unwrap_or(Err(DispatchError::Abandoned))
    }

    /// Take the result if it has already been delivered.
    pub fn try_recv(&mut self) -> Option<DispatchResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(DispatchError::Abandoned)),
        }
    }
}

/// Build a GET request.
pub fn build_get(url: &str, headers: Option<&Headers>) -> Result<Request, DispatchError> {
    build_request(Method::Get, url, headers, None)
}

/// Encode `body` as JSON and build a POST request.
pub fn build_post<T>(url: &str, headers: Option<&Headers>, body: &T) -> Result<Request, DispatchError>
where
    T: Serialize + ?Sized,
{
    let encoded = serde_json::to_vec(body).map_err(DispatchError::Encode)?;
    build_request(Method::Post, url, headers, Some(encoded))
}

fn build_request(
    method: Method,
    url: &str,
    headers: Option<&Headers>,
    body: Option<Vec<u8>>,
) -> Result<Request, DispatchError> {
    let parsed = Url::parse(url)
        .map_err(|e| DispatchError::InvalidRequest(format!("invalid URL '{url}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(DispatchError::InvalidRequest(format!(
            "unsupported scheme '{}'",
            parsed.scheme()
        )));
    }

    let mut request = Request::new(method.into(), parsed);
    let header_map = request.headers_mut();
    for (name, value) in headers.into_iter().flatten() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| DispatchError::InvalidRequest(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| DispatchError::InvalidRequest(format!("invalid value for header '{name}': {e}")))?;
        header_map.insert(name, value);
    }
    header_map.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

    if let Some(body) = body {
        *request.body_mut() = Some(body.into());
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to encode"))
        }
    }

    #[test]
    fn test_content_type_forced() {
        let mut headers = Headers::new();
        headers.insert("Content-Type".into(), "text/plain".into());
        headers.insert("X-Custom".into(), "yes".into());

        let request = build_get("http://localhost:4000/api/info", Some(&headers)).unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.headers()[CONTENT_TYPE], JSON_CONTENT_TYPE);
        assert_eq!(request.headers()["x-custom"], "yes");
        assert!(request.body().is_none());
    }

    #[test]
    fn test_post_body_matches_direct_encoding() {
        let body = serde_json::json!({"a": 1});
        let request = build_post("http://localhost:4000/", None, &body).unwrap();

        let sent = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(sent, serde_json::to_vec(&body).unwrap().as_slice());
        assert_eq!(sent, br#"{"a":1}"#);
    }

    #[test]
    fn test_encode_failure() {
        let err = build_post("http://localhost:4000/", None, &Unencodable).unwrap_err();
        assert!(matches!(err, DispatchError::Encode(_)));
    }

    #[test]
    fn test_malformed_requests() {
        assert!(matches!(
            build_get("", None),
            Err(DispatchError::InvalidRequest(_))
        ));
        assert!(matches!(
            build_get("not a url", None),
            Err(DispatchError::InvalidRequest(_))
        ));
        assert!(matches!(
            build_get("ftp://localhost/file", None),
            Err(DispatchError::InvalidRequest(_))
        ));

        let mut headers = Headers::new();
        headers.insert("bad header".into(), "v".into());
        assert!(matches!(
            build_get("http://localhost/", Some(&headers)),
            Err(DispatchError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_envelope_delivers_once() {
        let request = build_get("http://localhost/", None).unwrap();
        let (envelope, handle) = Envelope::new(Method::Get, request);
        assert_eq!(envelope.id, handle.id());

        envelope.reject(DispatchError::Closed);
        assert!(matches!(handle.recv().await, Err(DispatchError::Closed)));
    }

    #[tokio::test]
    async fn test_dropped_envelope_abandons_handle() {
        let request = build_get("http://localhost/", None).unwrap();
        let (envelope, mut handle) = Envelope::new(Method::Get, request);
        assert!(handle.try_recv().is_none());

        drop(envelope);
        assert!(matches!(handle.try_recv(), Some(Err(DispatchError::Abandoned))));
    }

    #[tokio::test]
    async fn test_ready_handle() {
        let handle = Handle::ready(Err(DispatchError::QueueFull));
        assert!(matches!(handle.recv().await, Err(DispatchError::QueueFull)));
    }
}

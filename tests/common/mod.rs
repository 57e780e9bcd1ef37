//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{any, get, post},
    Router,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Counts requests that reached the backend.
#[derive(Clone, Default)]
pub struct HitCounter(Arc<AtomicU32>);

impl HitCounter {
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Start a mock backend on an ephemeral port.
///
/// Routes:
/// - `GET /ok` → 200 with a fixed body
/// - `POST /echo` → 200 echoing the request body, `content-type` and `x-custom`
/// - `ANY /status/{code}` → that status
/// - `GET /slow/{ms}` → 200 after sleeping `ms` milliseconds
pub async fn start_mock_backend(response: &'static str) -> (SocketAddr, HitCounter) {
    let hits = HitCounter::default();
    let app = Router::new()
        .route("/ok", get(move || async move { response }))
        .route("/echo", post(echo))
        .route("/status/{code}", any(status))
        .route("/slow/{ms}", get(slow))
        .with_state(hits.clone());

    let addr = serve(app).await;
    (addr, hits)
}

/// Start a programmable mock backend answering every path with `f()`.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let handler = move || {
        let f = f.clone();
        async move {
            let (status, body) = f().await;
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
            (status, body)
        }
    };
    let app = Router::new()
        .route("/", any(handler.clone()))
        .route("/{*path}", any(handler));
    serve(app).await
}

/// Start a raw backend that answers `200 OK` with a body shorter than its
/// `Content-Length`, then closes the connection.
#[allow(dead_code)]
pub async fn start_truncated_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                // Consume the request head so closing does not reset the socket.
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nshort")
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(State(hits): State<HitCounter>, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    hits.hit();
    let mut reply = HeaderMap::new();
    for name in ["content-type", "x-custom"] {
        if let Some(value) = headers.get(name) {
            reply.insert(format!("x-echo-{name}").parse::<axum::http::HeaderName>().unwrap(), value.clone());
        }
    }
    (StatusCode::OK, reply, body)
}

async fn status(State(hits): State<HitCounter>, Path(code): Path<u16>) -> impl IntoResponse {
    hits.hit();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, status.to_string())
}

async fn slow(State(hits): State<HitCounter>, Path(ms): Path<u64>) -> impl IntoResponse {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    hits.hit();
    "slow"
}

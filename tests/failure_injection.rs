//! Failure injection tests for the dispatcher.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use request_dispatcher::{DispatchError, Dispatcher};
use serde::ser::Error as _;
use serde::Serialize;

mod common;

struct Unencodable;

impl Serialize for Unencodable {
    fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
        Err(S::Error::custom("cannot encode"))
    }
}

#[tokio::test]
async fn test_error_statuses_become_errors() {
    let (addr, _) = common::start_mock_backend("unused").await;
    let dispatcher = Dispatcher::new(5, 20, 20, 30).unwrap();

    for code in [400u16, 403, 409, 502] {
        let handle = dispatcher.get(&format!("http://{addr}/status/{code}"), None).await;
        match dispatcher.get_result(handle).await {
            Err(DispatchError::Status(status)) => assert_eq!(status.as_u16(), code),
            other => panic!("expected status error for {code}, got {other:?}"),
        }
    }

    for code in [200u16, 404, 500] {
        let handle = dispatcher.get(&format!("http://{addr}/status/{code}"), None).await;
        let response = dispatcher.get_result(handle).await.unwrap();
        assert_eq!(response.status.as_u16(), code);
    }
}

#[tokio::test]
async fn test_status_error_message() {
    let (addr, _) = common::start_mock_backend("unused").await;
    let dispatcher = Dispatcher::new(5, 20, 20, 30).unwrap();

    let handle = dispatcher.get(&format!("http://{addr}/status/409"), None).await;
    let err = dispatcher.get_result(handle).await.unwrap_err();
    assert_eq!(err.to_string(), "Error status 409 Conflict");
}

#[tokio::test]
async fn test_zero_timeout_fails_fast() {
    let (addr, hits) = common::start_mock_backend("ok").await;
    let dispatcher = Dispatcher::new(0, 20, 20, 30).unwrap();

    let started = Instant::now();
    let get = dispatcher.get(&format!("http://{addr}/ok"), None).await;
    let post = dispatcher
        .post(&format!("http://{addr}/echo"), None, &serde_json::json!({"a": 1}))
        .await;

    assert!(matches!(dispatcher.get_result(get).await, Err(DispatchError::Timeout)));
    assert!(matches!(dispatcher.get_result(post).await, Err(DispatchError::Timeout)));
    assert!(started.elapsed() < Duration::from_millis(50));
    assert_eq!(hits.get(), 0);
}

#[tokio::test]
async fn test_timeout_on_slow_backend() {
    let (addr, _) = common::start_mock_backend("ok").await;
    let dispatcher = Dispatcher::new(1, 20, 20, 30).unwrap();

    let handle = dispatcher.get(&format!("http://{addr}/slow/3000"), None).await;
    let started = Instant::now();
    let result = dispatcher.get_result(handle).await;

    assert!(matches!(result, Err(DispatchError::Timeout)), "got {result:?}");
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_truncated_body_is_read_error() {
    let addr = common::start_truncated_backend().await;
    let dispatcher = Dispatcher::new(5, 20, 20, 30).unwrap();

    let handle = dispatcher.get(&format!("http://{addr}/"), None).await;
    let result = dispatcher.get_result(handle).await;
    assert!(matches!(result, Err(DispatchError::Read(_))), "got {result:?}");
}

#[tokio::test]
async fn test_connection_refused() {
    let addr = common::unused_addr().await;
    let dispatcher = Dispatcher::new(5, 20, 20, 30).unwrap();

    let handle = dispatcher.get(&format!("http://{addr}/"), None).await;
    let result = dispatcher.get_result(handle).await;
    assert!(matches!(result, Err(DispatchError::Transport(_))), "got {result:?}");
}

#[tokio::test]
async fn test_malformed_url_resolves_immediately() {
    let dispatcher = Dispatcher::new(5, 20, 20, 30).unwrap();

    for url in ["", "no scheme here", "ftp://127.0.0.1/file"] {
        let handle = dispatcher.get(url, None).await;
        let result = tokio::time::timeout(Duration::from_millis(100), dispatcher.get_result(handle))
            .await
            .unwrap();
        assert!(matches!(result, Err(DispatchError::InvalidRequest(_))), "{url}: {result:?}");
    }
    assert_eq!(dispatcher.in_flight(), 0);
}

#[tokio::test]
async fn test_encode_failure_never_sent() {
    let (addr, hits) = common::start_mock_backend("unused").await;
    let dispatcher = Dispatcher::new(5, 20, 20, 30).unwrap();

    let handle = dispatcher
        .post(&format!("http://{addr}/echo"), None, &Unencodable)
        .await;
    assert!(matches!(
        dispatcher.get_result(handle).await,
        Err(DispatchError::Encode(_))
    ));
    assert_eq!(hits.get(), 0);
}

#[tokio::test]
async fn test_per_host_cap_serializes_calls() {
    let concurrent = Arc::new(AtomicU32::new(0));
    let peak = Arc::new(AtomicU32::new(0));
    let (c, p) = (concurrent.clone(), peak.clone());
    let addr = common::start_programmable_backend(move || {
        let (c, p) = (c.clone(), p.clone());
        async move {
            let now = c.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            c.fetch_sub(1, Ordering::SeqCst);
            (200, "ok".into())
        }
    })
    .await;

    let dispatcher = Dispatcher::new(5, 2, 2, 30).unwrap();
    let mut handles = Vec::new();
    for _ in 0..8 {
        handles.push(dispatcher.get(&format!("http://{addr}/"), None).await);
    }
    for handle in handles {
        assert!(dispatcher.get_result(handle).await.is_ok());
    }

    assert!(peak.load(Ordering::SeqCst) <= 2);
}

//! Execution task: one network call, one result.

use std::sync::Arc;

use crate::dispatch::envelope::Envelope;
use crate::dispatch::tracker::{InFlightGuard, InFlightTracker};
use crate::observability::metrics;
use crate::transport::TransportPool;

/// Run a dequeued envelope to completion.
///
/// Writes exactly one result into the envelope's reply slot. Never cancelled
/// by dispatcher shutdown.
pub async fn execute(
    pool: Arc<TransportPool>,
    tracker: InFlightTracker,
    _guard: InFlightGuard,
    envelope: Envelope,
) {
    let _slot = tracker.slot().await;

    let request_id = envelope.id;
    let method = envelope.method;
    let submitted_at = envelope.submitted_at;
    let url = envelope.request.url().clone();
    let (request, reply) = envelope.into_parts();

    tracing::debug!(request_id = %request_id, method = %method, url = %url, "Executing request");

    let result = pool.fetch(request).await;
    match &result {
        Ok(response) => {
            tracing::debug!(
                request_id = %request_id,
                status = %response.status,
                bytes = response.body.len(),
                "Request completed"
            );
            metrics::record_request(method.as_str(), "ok", submitted_at);
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, url = %url, error = %e, "Request failed");
            metrics::record_request(method.as_str(), e.kind(), submitted_at);
        }
    }

    reply.send(result);
}

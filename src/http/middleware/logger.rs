//! Request span and access log.
//!
//! Wraps the inner stack in a span carrying the request ID so every event a
//! handler emits is tagged with it, then logs and records the outcome.

use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::Instrument;

use crate::http::request::RequestIdExt;
use crate::observability::metrics;

pub async fn trace_request(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .request_id()
        .map(ToString::to_string)
        .unwrap_or_default();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let response = next.run(request).await;
        let status = response.status();

        metrics::record_request(method.as_str(), status.as_u16(), start);
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), elapsed = ?start.elapsed(), "Request completed");
        } else {
            tracing::debug!(status = status.as_u16(), elapsed = ?start.elapsed(), "Request completed");
        }
        response
    }
    .instrument(span)
    .await
}

//! Request tracing middleware

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use super::rate_limiter::client_ip;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Log each request with timing, tagging it with a request ID
///
/// An inbound `x-request-id` is kept; otherwise one is generated. The ID is
/// echoed on the response and attached to every event the handler logs.
pub async fn request_tracing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client_ip = client_ip(request.headers());

    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        id = %request_id,
        method = %method,
        path = %path,
        client_ip = %client_ip,
    );

    let start = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status();

    span.in_scope(|| {
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), duration_ms, "Request completed with error");
        } else if status.is_client_error() {
            tracing::warn!(
                status = status.as_u16(),
                duration_ms,
                "Request completed with client error"
            );
        } else {
            tracing::info!(status = status.as_u16(), duration_ms, "Request completed");
        }
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

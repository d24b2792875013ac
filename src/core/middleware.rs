//! HTTP middleware: request IDs and request metrics.

use crate::core::logging::{accept_request_id, generate_request_id, REQUEST_ID_HEADER};
use crate::core::metrics::get_metrics;
use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Request ID chosen for this request, stored in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Assign a request ID (honouring a well-formed incoming `x-request-id`),
/// expose it to handlers through extensions and echo it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(accept_request_id)
        .unwrap_or_else(generate_request_id);

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}

/// Middleware for tracking request metrics.
pub struct MetricsMiddleware;

impl MetricsMiddleware {
    /// Record request count and header latency per endpoint.
    ///
    /// For streaming responses the duration is time-to-headers, since
    /// `next.run()` returns as soon as the body starts.
    pub async fn track_metrics(request: Request, next: Next) -> Response {
        let endpoint = request.uri().path().to_string();
        let method = request.method().to_string();

        // Skip metrics endpoint itself to avoid recursion
        if endpoint == "/metrics" {
            return next.run(request).await;
        }

        let start = Instant::now();
        let response = next.run(request).await;
        let duration = start.elapsed().as_secs_f64();
        let status_code = response.status().as_u16().to_string();

        let metrics = get_metrics();
        metrics
            .request_count
            .with_label_values(&[&method, &endpoint, &status_code])
            .inc();
        metrics
            .request_duration
            .with_label_values(&[&method, &endpoint])
            .observe(duration);

        tracing::debug!(
            method = %method,
            endpoint = %endpoint,
            status = %status_code,
            duration_ms = format!("{:.1}", duration * 1000.0),
            "Request handled"
        );

        response
    }
}

//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use crate::error::{ApiError, ApiResult};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> ApiResult<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ApiError::internal(format!("Failed to install Prometheus recorder: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "ytmp3_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "ytmp3_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "ytmp3_http_requests_in_flight";

    // Conversion metrics
    pub const CONVERSIONS_STARTED_TOTAL: &str = "ytmp3_conversions_started_total";
    pub const URL_REJECTIONS_TOTAL: &str = "ytmp3_url_rejections_total";

    // Event stream metrics
    pub const EVENT_STREAMS_ACTIVE: &str = "ytmp3_event_streams_active";
    pub const EVENTS_SENT_TOTAL: &str = "ytmp3_events_sent_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "ytmp3_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path).to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a conversion job being started.
pub fn record_conversion_started() {
    counter!(names::CONVERSIONS_STARTED_TOTAL).increment(1);
}

/// Record a URL rejected by the validator.
pub fn record_url_rejection(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::URL_REJECTIONS_TOTAL, &labels).increment(1);
}

/// Record an event delivered to a client stream.
pub fn record_event_sent(status: &str) {
    let labels = [("status", status.to_string())];
    counter!(names::EVENTS_SENT_TOTAL, &labels).increment(1);
}

/// Track an event stream opening (+1) or closing (-1).
pub fn adjust_active_streams(delta: f64) {
    gauge!(names::EVENT_STREAMS_ACTIVE).increment(delta);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse paths into a bounded label set.
fn sanitize_path(path: &str) -> &'static str {
    match path {
        "/download" => "/download",
        "/health" => "/health",
        "/healthz" => "/healthz",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/schema/events" => "/schema/events",
        p if p.starts_with("/downloads/") => "/downloads/:file",
        _ => "/static",
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    // Increment in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    // Decrement in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

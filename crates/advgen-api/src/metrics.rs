//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "advgen_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "advgen_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "advgen_http_requests_in_flight";

    // WebSocket metrics (ProgressStream)
    pub const WS_CONNECTIONS_TOTAL: &str = "advgen_ws_connections_total";
    pub const WS_CONNECTIONS_ACTIVE: &str = "advgen_ws_connections_active";
    pub const WS_MESSAGES_SENT: &str = "advgen_ws_messages_sent_total";
    pub const WS_MESSAGES_RECEIVED: &str = "advgen_ws_messages_received_total";

    // Queue metrics
    pub const QUEUE_LENGTH: &str = "advgen_queue_length";
    pub const QUEUE_DLQ_LENGTH: &str = "advgen_queue_dlq_length";
    pub const JOBS_ENQUEUED_TOTAL: &str = "advgen_jobs_enqueued_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "advgen_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "advgen_jobs_failed_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "advgen_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record WebSocket connection.
pub fn record_ws_connection(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_CONNECTIONS_TOTAL, &labels).increment(1);
}

/// Update active WebSocket connections gauge.
pub fn set_ws_active_connections(count: i64) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).set(count as f64);
}

/// Record WebSocket message sent.
pub fn record_ws_message_sent(endpoint: &str, message_type: &str) {
    let labels = [
        ("endpoint", endpoint.to_string()),
        ("type", message_type.to_string()),
    ];
    counter!(names::WS_MESSAGES_SENT, &labels).increment(1);
}

/// Record WebSocket message received.
pub fn record_ws_message_received(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_MESSAGES_RECEIVED, &labels).increment(1);
}

/// Update queue length gauge.
pub fn set_queue_length(length: u64) {
    gauge!(names::QUEUE_LENGTH).set(length as f64);
}

/// Update DLQ length gauge.
pub fn set_dlq_length(length: u64) {
    gauge!(names::QUEUE_DLQ_LENGTH).set(length as f64);
}

/// Record job enqueued.
pub fn record_job_enqueued(job_type: &str) {
    let labels = [("type", job_type.to_string())];
    counter!(names::JOBS_ENQUEUED_TOTAL, &labels).increment(1);
}

/// Record job completed.
pub fn record_job_completed(job_type: &str) {
    let labels = [("type", job_type.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

/// Record job failed.
pub fn record_job_failed(job_type: &str) {
    let labels = [("type", job_type.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse path segments that vary per-request (job IDs, scene indices) so
/// that label cardinality stays bounded. Avoids pulling in a regex crate for
/// what is just a handful of fixed route shapes.
fn sanitize_path(path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .map(|segment| {
            if segment.is_empty() {
                segment.to_string()
            } else if segment.chars().all(|c| c.is_ascii_digit()) {
                ":n".to_string()
            } else if looks_like_job_id(segment) {
                ":job_id".to_string()
            } else {
                segment.to_string()
            }
        })
        .collect();
    segments.join("/")
}

/// Job IDs are UUIDs; treat anything hyphenated and long enough as one
/// without hardcoding the exact UUID grammar.
fn looks_like_job_id(segment: &str) -> bool {
    segment.len() >= 8
        && segment.contains('-')
        && segment
            .chars()
            .all(|c| c.is_ascii_hexdigit() || c == '-')
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/jobs/a1b2c3d4-e5f6-47a8-9abc-1234567890ab"),
            "/jobs/:job_id"
        );
        assert_eq!(
            sanitize_path("/jobs/a1b2c3d4-e5f6-47a8-9abc-1234567890ab/scenes/3/regenerate"),
            "/jobs/:job_id/scenes/:n/regenerate"
        );
        assert_eq!(sanitize_path("/health"), "/health");
    }
}

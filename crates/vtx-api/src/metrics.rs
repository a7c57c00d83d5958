//! Prometheus metrics for the API server.

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use regex::Regex;

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
    pub const HTTP_REQUESTS_TOTAL: &str = "vtx_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vtx_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vtx_http_requests_in_flight";

    // WebSocket metrics
    pub const WS_CONNECTIONS_TOTAL: &str = "vtx_ws_connections_total";
    pub const WS_CONNECTIONS_ACTIVE: &str = "vtx_ws_connections_active";
    pub const WS_MESSAGES_SENT: &str = "vtx_ws_messages_sent_total";
    pub const WS_MESSAGES_RECEIVED: &str = "vtx_ws_messages_received_total";

    // Job metrics
    pub const JOBS_CREATED_TOTAL: &str = "vtx_jobs_created_total";
    pub const JOBS_CANCELED_TOTAL: &str = "vtx_jobs_canceled_total";
    pub const JOBS_DELETED_TOTAL: &str = "vtx_jobs_deleted_total";

    // Event relay metrics
    pub const RELAY_EVENTS_TOTAL: &str = "vtx_relay_events_total";
    pub const RELAY_RECONNECTS_TOTAL: &str = "vtx_relay_reconnects_total";
    pub const RELAY_STORE_FAILURES_TOTAL: &str = "vtx_relay_store_failures_total";

    // Storage webhook metrics
    pub const STORAGE_EVENTS_TOTAL: &str = "vtx_storage_events_total";
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
pub fn record_ws_connection() {
    counter!(names::WS_CONNECTIONS_TOTAL).increment(1);
}

/// Adjust the active WebSocket connections gauge.
pub fn adjust_ws_active_connections(delta: f64) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).increment(delta);
}

/// Record WebSocket message sent.
pub fn record_ws_message_sent(message_type: &str) {
    let labels = [("type", message_type.to_string())];
    counter!(names::WS_MESSAGES_SENT, &labels).increment(1);
}

/// Record WebSocket message received.
pub fn record_ws_message_received() {
    counter!(names::WS_MESSAGES_RECEIVED).increment(1);
}

/// Record job created.
pub fn record_job_created() {
    counter!(names::JOBS_CREATED_TOTAL).increment(1);
}

/// Record job canceled.
pub fn record_job_canceled() {
    counter!(names::JOBS_CANCELED_TOTAL).increment(1);
}

/// Record job deleted.
pub fn record_job_deleted() {
    counter!(names::JOBS_DELETED_TOTAL).increment(1);
}

/// Record a relay event consumed, labeled by log level.
pub fn record_relay_event(level: &str) {
    let labels = [("level", level.to_string())];
    counter!(names::RELAY_EVENTS_TOTAL, &labels).increment(1);
}

/// Record a relay stream reconnect.
pub fn record_relay_reconnect() {
    counter!(names::RELAY_RECONNECTS_TOTAL).increment(1);
}

/// Record a store write failure inside the relay subscriber.
pub fn record_relay_store_failure() {
    counter!(names::RELAY_STORE_FAILURES_TOTAL).increment(1);
}

/// Record a storage notification accepted, labeled by outcome.
pub fn record_storage_event(outcome: &'static str) {
    let labels = [("outcome", outcome)];
    counter!(names::STORAGE_EVENTS_TOTAL, &labels).increment(1);
}

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    static UUID_RE: OnceLock<Regex> = OnceLock::new();
    let uuid_re = UUID_RE.get_or_init(|| {
        Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
            .expect("valid uuid regex")
    });
    uuid_re.replace_all(path, ":id").to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

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
            sanitize_path("/api/jobs/550e8400-e29b-41d4-a716-446655440000"),
            "/api/jobs/:id"
        );
        assert_eq!(
            sanitize_path("/api/jobs/550e8400-e29b-41d4-a716-446655440000/cancel"),
            "/api/jobs/:id/cancel"
        );
        assert_eq!(sanitize_path("/api/jobs"), "/api/jobs");
    }
}

//! API integration tests.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

/// Test health endpoint.
#[tokio::test]
async fn test_health_endpoint() {
    dotenvy::dotenv().ok();

    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

/// Test metrics endpoint (when enabled).
#[tokio::test]
async fn test_metrics_endpoint() {
    dotenvy::dotenv().ok();

    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Metrics should return OK if enabled
    assert!(response.status() == StatusCode::OK || response.status() == StatusCode::NOT_FOUND);
}

/// Test request id header is attached to every response.
#[tokio::test]
async fn test_request_id_header() {
    dotenvy::dotenv().ok();

    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.headers().contains_key("X-Request-ID"));
}

/// Test a caller-supplied request id is echoed back.
#[tokio::test]
async fn test_request_id_passthrough() {
    dotenvy::dotenv().ok();

    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Request-ID", "test-trace-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("X-Request-ID").unwrap(),
        "test-trace-42"
    );
}

/// Test CORS preflight.
#[tokio::test]
#[ignore = "requires full app setup"]
async fn test_cors_preflight() {
    dotenvy::dotenv().ok();

    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/jobs")
                .header("Origin", "http://localhost:3000")
                .header("Access-Control-Request-Method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status() == StatusCode::OK || response.status() == StatusCode::NO_CONTENT);
}

/// Test job routes reject requests without a gateway identity.
#[tokio::test]
#[ignore = "requires full app setup"]
async fn test_jobs_require_identity() {
    dotenvy::dotenv().ok();

    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/jobs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Test the storage webhook rejects non-JSON bodies.
#[tokio::test]
#[ignore = "requires full app setup"]
async fn test_storage_webhook_rejects_non_json() {
    dotenvy::dotenv().ok();

    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/events/storage")
                .header("Content-Type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Helper to create a test router.
///
/// Falls back to a minimal router carrying the same middleware when the
/// backing services are unreachable, so the header and health tests run
/// without credentials.
async fn create_test_router() -> axum::Router {
    use std::sync::OnceLock;

    use metrics_exporter_prometheus::PrometheusHandle;
    use vtx_api::{create_router, metrics, ApiConfig, AppState};

    // The recorder is process-global; install it once for the whole binary.
    static METRICS: OnceLock<PrometheusHandle> = OnceLock::new();

    let config = ApiConfig::from_env();

    match AppState::new(config).await {
        Ok(state) => {
            let metrics_handle = Some(METRICS.get_or_init(metrics::init_metrics).clone());
            create_router(state, metrics_handle)
        }
        Err(_) => {
            use axum::routing::get;
            use axum::Json;
            use serde_json::json;

            axum::Router::new()
                .route(
                    "/health",
                    get(|| async {
                        Json(json!({
                            "status": "healthy",
                            "version": env!("CARGO_PKG_VERSION")
                        }))
                    }),
                )
                .route("/metrics", get(|| async { "# No metrics" }))
                .layer(axum::middleware::from_fn(vtx_api::middleware::request_id))
        }
    }
}

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

/// Test readiness endpoint.
#[tokio::test]
async fn test_ready_endpoint() {
    dotenvy::dotenv().ok();

    let app = create_test_router().await;

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    // Ready depends on live backend connectivity, so either OK or
    // SERVICE_UNAVAILABLE is an acceptable outcome without real credentials.
    assert!(
        response.status() == StatusCode::OK
            || response.status() == StatusCode::SERVICE_UNAVAILABLE
            || response.status() == StatusCode::NOT_FOUND
    );
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
    assert!(
        response.status() == StatusCode::OK || response.status() == StatusCode::NOT_FOUND
    );
}

/// Test per-owner Admission rate limiting on the submit endpoint.
#[tokio::test]
#[ignore = "requires full app setup"]
async fn test_rate_limiting() {
    dotenvy::dotenv().ok();

    let app = create_test_router().await;

    // Make many requests quickly without an identity token; Admission sits
    // behind auth, so these are expected to 401 well before a 429, but the
    // edge-level IP rate limiter in front of /api should still trip first.
    for i in 0..20 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/jobs")
                    .header("X-Forwarded-For", "192.168.1.100")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            println!("Rate limited after {} requests", i + 1);
            return;
        }
    }

    // If we get here, rate limiting might not be working as expected
    // (or the limit is higher than 20 req/s)
}

/// Test CORS headers.
#[tokio::test]
async fn test_cors_headers() {
    dotenvy::dotenv().ok();

    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/jobs")
                .header("Origin", "http://localhost:3000")
                .header("Access-Control-Request-Method", "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // CORS preflight should return OK or NO_CONTENT
    assert!(
        response.status() == StatusCode::OK || response.status() == StatusCode::NO_CONTENT
    );
}

/// Test security headers.
#[tokio::test]
async fn test_security_headers() {
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

    let headers = response.headers();

    // Check security headers are present
    assert!(headers.contains_key("X-Content-Type-Options"));
    assert!(headers.contains_key("X-Frame-Options"));
    assert!(headers.contains_key("X-Request-ID"));
}

/// Test that an unauthenticated job submission is rejected before it ever
/// reaches Admission or the queue.
#[tokio::test]
async fn test_generate_requires_auth() {
    dotenvy::dotenv().ok();

    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "prompt": "A 15 second ad for a cold brew can",
                        "duration_s": 15,
                        "aspect_ratio": "9:16",
                        "voice": "narrator_a"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Test that a malformed job id is rejected by the path validator rather
/// than reaching the job store.
#[tokio::test]
async fn test_get_job_rejects_invalid_id() {
    dotenvy::dotenv().ok();

    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/jobs/../../etc/passwd")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Missing auth is checked first, so an unauthenticated request to a
    // malformed id still comes back 401, not 400; either is acceptable
    // evidence that the traversal attempt never reached job lookup.
    assert!(
        response.status() == StatusCode::UNAUTHORIZED
            || response.status() == StatusCode::BAD_REQUEST
    );
}

/// Helper to create a test router.
/// In a real setup, this would use test fixtures or mocks.
async fn create_test_router() -> axum::Router {
    use advgen_api::{create_router, metrics, ApiConfig, AppState};

    // Try to create real state, fall back to a minimal router so the tests
    // that only exercise routing/middleware still run without live backends.
    let config = ApiConfig::from_env();

    match AppState::new(config).await {
        Ok(state) => {
            let metrics_handle = Some(metrics::init_metrics());
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
        }
    }
}

/// Test the job submission endpoint against a running server.
#[tokio::test]
#[ignore = "requires a running server and a valid identity token"]
async fn test_submit_job_endpoint() {
    dotenvy::dotenv().ok();

    let base_url = std::env::var("ADVGEN_TEST_API_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:8000".to_string());
    let token = std::env::var("ADVGEN_TEST_ID_TOKEN").unwrap_or_default();

    let client = reqwest::Client::new();
    let mut request = client.post(format!("{}/api/generate", base_url)).json(&serde_json::json!({
        "prompt": "A 15 second ad for a cold brew can, upbeat and sunny",
        "duration_s": 15,
        "aspect_ratio": "9:16",
        "voice": "narrator_a"
    }));

    if !token.is_empty() {
        request = request.bearer_auth(token);
    }

    match request.send().await {
        Ok(resp) => {
            println!("generate endpoint responded with status {}", resp.status());
            assert_ne!(resp.status(), StatusCode::NOT_FOUND);
        }
        Err(e) => {
            println!("request failed (expected if server not running): {}", e);
        }
    }
}

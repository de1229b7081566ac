//! Unauthenticated health checks and routing.

use axum::http::StatusCode;
use befit_integration_tests::{get, json_body};

#[tokio::test]
async fn test_root_reports_online() {
    let (status, body) = json_body(get("/").await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_liveness() {
    let (status, body) = json_body(get("/health").await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_readiness_without_database() {
    let (status, body) = json_body(get("/health/ready").await).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"], "disconnected");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = get("/api/v1/does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

//! The middleware layered around the router in the server binary.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::middleware::from_fn;
use befit_api::middleware::{REQUEST_ID_HEADER, request_id_middleware, security_headers_middleware};
use befit_integration_tests::test_app;
use tower::ServiceExt;

fn layered() -> axum::Router {
    test_app()
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let response = layered()
        .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(headers[header::REFERRER_POLICY], "no-referrer");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store, max-age=0");
}

#[tokio::test]
async fn test_upstream_request_id_is_echoed() {
    let request = Request::get("/health")
        .header(REQUEST_ID_HEADER, "req-abc-123")
        .body(Body::empty())
        .expect("request");
    let response = layered().oneshot(request).await.expect("response");
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-abc-123");
}

#[tokio::test]
async fn test_request_id_is_generated() {
    let response = layered()
        .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let id = response.headers()[REQUEST_ID_HEADER].to_str().expect("ascii");
    assert_eq!(id.len(), 36);
}

#[tokio::test]
async fn test_error_responses_carry_headers() {
    let response = layered()
        .oneshot(Request::get("/api/v1/cart").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}

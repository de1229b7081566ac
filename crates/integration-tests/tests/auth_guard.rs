//! Protected routes reject requests without a usable bearer token.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use befit_integration_tests::{get, json_body, send};

const PROTECTED: &[&str] = &[
    "/api/v1/users/me",
    "/api/v1/users/me/fitness-profile",
    "/api/v1/addresses",
    "/api/v1/payment-methods",
    "/api/v1/notifications",
    "/api/v1/cart",
    "/api/v1/orders",
    "/api/v1/subscriptions/my-subscription",
    "/api/v1/loyalty/status",
    "/api/v1/auth/me",
    "/api/v1/admin/analytics/dashboard",
    "/api/v1/admin/users",
    "/api/v1/admin/orders",
];

#[tokio::test]
async fn test_protected_routes_require_token() {
    for uri in PROTECTED {
        let (status, body) = json_body(get(uri).await).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["detail"], "Not authenticated", "{uri}");
    }
}

#[tokio::test]
async fn test_non_bearer_scheme_is_rejected() {
    let request = Request::get("/api/v1/users/me")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .expect("request");
    let response = send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_empty_bearer_is_rejected() {
    let request = Request::post("/api/v1/cart/items")
        .header(header::AUTHORIZATION, "Bearer   ")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"product_id":1}"#))
        .expect("request");
    let response = send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_csv_export_requires_token() {
    let response = get("/api/v1/admin/analytics/export/sales.csv").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

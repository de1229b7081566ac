//! Public endpoints validate input before touching the database or providers.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use befit_integration_tests::{get, json_body, send};

#[tokio::test]
async fn test_product_list_rejects_bad_pagination() {
    for uri in [
        "/api/v1/products?page=0",
        "/api/v1/products?limit=0",
        "/api/v1/products?limit=101",
    ] {
        let response = get(uri).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
    }
}

#[tokio::test]
async fn test_search_rejects_inverted_price_range() {
    let response = get("/api/v1/search/products?min_price=500&max_price=100").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_search_rejects_negative_skip() {
    let response = get("/api/v1/search/products?skip=-1").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_login_rejects_malformed_email() {
    let request = Request::post("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"email":"not-an-email","password":"Secret123"}"#))
        .expect("request");
    let (status, body) = json_body(send(request).await).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().is_some_and(|d| d.contains("email")));
}

//! Stripe webhook signature handling.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use befit_integration_tests::{WEBHOOK_SECRET, json_body, send};
use hmac::{Hmac, Mac};
use sha2::Sha256;

const WEBHOOK_URI: &str = "/api/v1/payments/stripe/webhook";

fn signature_header(payload: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).expect("key");
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

fn webhook(payload: &'static str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::post(WEBHOOK_URI).header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder.body(Body::from(payload)).expect("request")
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

const IGNORED_EVENT: &str =
    r#"{"id":"evt_1","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let response = send(webhook(IGNORED_EVENT, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_signature_is_rejected() {
    let forged = format!("t={},v1={}", now(), "00".repeat(32));
    let response = send(webhook(IGNORED_EVENT, Some(forged))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stale_signature_is_rejected() {
    let stale = signature_header(IGNORED_EVENT, now() - 3600);
    let response = send(webhook(IGNORED_EVENT, Some(stale))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signed_unhandled_event_is_acknowledged() {
    let signature = signature_header(IGNORED_EVENT, now());
    let (status, body) = json_body(send(webhook(IGNORED_EVENT, Some(signature))).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn test_signed_garbage_payload_is_bad_request() {
    const GARBAGE: &str = "not json";
    let signature = signature_header(GARBAGE, now());
    let (status, body) = json_body(send(webhook(GARBAGE, Some(signature))).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["detail"]
            .as_str()
            .is_some_and(|d| d.starts_with("Invalid webhook payload"))
    );
}

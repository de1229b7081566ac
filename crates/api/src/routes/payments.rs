//! Payment gateway callbacks.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{instrument, warn};

use crate::error::AppError;
use crate::payments::{PaymentError, WebhookEvent};
use crate::routes::orders::service;
use crate::state::AppState;

/// Header carrying the Stripe signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Build the payments router.
pub fn router() -> Router<AppState> {
    Router::new().route("/payments/stripe/webhook", post(stripe_webhook))
}

/// Receive a Stripe event. The signature is checked against the raw body before
/// it is parsed; events the store does not act on are acknowledged.
#[instrument(skip_all)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(PaymentError::InvalidSignature)?;

    state
        .payments()
        .stripe()
        .verify_webhook(&body, signature, Utc::now().timestamp())
        .inspect_err(|_| warn!("Rejected webhook with a bad signature"))?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {e}")))?;
    service(&state).handle_webhook(&event).await?;

    Ok(Json(json!({ "received": true })))
}

//! Monthly subscription routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
};

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{
    PaymentMethodChange, Subscription, SubscriptionCreate, SubscriptionHistory,
    SubscriptionSummary,
};
use crate::services::SubscriptionService;
use crate::services::subscriptions::today;
use crate::state::AppState;

/// Build the subscriptions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", post(create))
        .route("/subscriptions/my-subscription", get(mine))
        .route("/subscriptions/summary", get(summary))
        .route("/subscriptions/pause", patch(pause))
        .route("/subscriptions/resume", patch(resume))
        .route("/subscriptions/cancel", patch(cancel))
        .route("/subscriptions/payment-method", patch(change_payment_method))
        .route("/subscriptions/history", get(history))
}

/// Subscribe to the plan recommended by the caller's fitness profile.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<SubscriptionCreate>,
) -> Result<(StatusCode, Json<Subscription>), AppError> {
    let subscription = service(&state)
        .create(user.id, body.payment_method_id, today())
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Subscription>, AppError> {
    Ok(Json(service(&state).mine(user.id).await?))
}

pub async fn summary(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<SubscriptionSummary>, AppError> {
    Ok(Json(service(&state).summary(user.id).await?))
}

pub async fn pause(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Subscription>, AppError> {
    Ok(Json(service(&state).pause(user.id).await?))
}

pub async fn resume(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Subscription>, AppError> {
    Ok(Json(service(&state).resume(user.id, today()).await?))
}

/// Cancel for good. A cancelled subscription cannot be resumed.
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Subscription>, AppError> {
    Ok(Json(service(&state).cancel(user.id, today()).await?))
}

pub async fn change_payment_method(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<PaymentMethodChange>,
) -> Result<Json<Subscription>, AppError> {
    let subscription = service(&state)
        .change_payment_method(user.id, body.payment_method_id)
        .await?;
    Ok(Json(subscription))
}

pub async fn history(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<SubscriptionHistory>, AppError> {
    Ok(Json(service(&state).history(user.id).await?))
}

pub(crate) fn service(state: &AppState) -> SubscriptionService<'_> {
    SubscriptionService::new(state.pool(), state.payments())
}

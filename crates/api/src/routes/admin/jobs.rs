//! On-demand runs of the scheduled jobs. The CLI runs the same services.

use axum::{Json, Router, extract::State, routing::post};
use tracing::info;

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{BatchExpireReport, RenewalReport};
use crate::routes::subscriptions::service;
use crate::services::LoyaltyService;
use crate::services::subscriptions::today;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/loyalty/expire-all", post(expire_all))
        .route("/subscriptions/renew", post(renew))
}

pub async fn expire_all(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<BatchExpireReport>, AppError> {
    let report = LoyaltyService::new(state.pool()).expire_all(today()).await?;
    info!(admin_id = %admin.id, users = report.users_affected, "Loyalty expiry run");
    Ok(Json(report))
}

pub async fn renew(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<RenewalReport>, AppError> {
    let report = service(&state).renew_due(today()).await?;
    info!(admin_id = %admin.id, processed = report.processed, "Subscription renewal run");
    Ok(Json(report))
}

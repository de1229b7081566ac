//! Loyalty program routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;

use befit_core::LoyaltyTierId;

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{ExpireOutcome, LoyaltyStatus, LoyaltyTier, PointHistoryEntry};
use crate::services::LoyaltyService;
use crate::services::loyalty::DEFAULT_HISTORY_LIMIT;
use crate::services::subscriptions::today;
use crate::state::AppState;
use crate::validation::{MAX_PAGE_LIMIT, ValidationError};

/// Build the loyalty router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/loyalty/status", get(status))
        .route("/loyalty/tiers", get(tiers))
        .route("/loyalty/tiers/{id}", get(tier))
        .route("/loyalty/history", get(history))
        .route("/loyalty/expire", post(expire))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

impl HistoryQuery {
    fn limit(&self) -> Result<i64, ValidationError> {
        let limit = self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if (1..=MAX_PAGE_LIMIT).contains(&limit) {
            Ok(limit)
        } else {
            Err(ValidationError::new(
                "limit",
                format!("must be between 1 and {MAX_PAGE_LIMIT}"),
            ))
        }
    }
}

/// The caller's points, tier and benefits. Enrolls the caller on first use.
pub async fn status(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<LoyaltyStatus>, AppError> {
    Ok(Json(LoyaltyService::new(state.pool()).status(user.id).await?))
}

pub async fn tiers(State(state): State<AppState>) -> Result<Json<Vec<LoyaltyTier>>, AppError> {
    Ok(Json(LoyaltyService::new(state.pool()).tiers().await?))
}

pub async fn tier(
    State(state): State<AppState>,
    Path(id): Path<LoyaltyTierId>,
) -> Result<Json<LoyaltyTier>, AppError> {
    Ok(Json(LoyaltyService::new(state.pool()).tier(id).await?))
}

pub async fn history(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PointHistoryEntry>>, AppError> {
    let limit = query.limit()?;
    let entries = LoyaltyService::new(state.pool())
        .history(user.id, limit)
        .await?;
    Ok(Json(entries))
}

/// Expire the caller's points when their window has closed.
pub async fn expire(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ExpireOutcome>, AppError> {
    let outcome = LoyaltyService::new(state.pool())
        .expire(user.id, today())
        .await?;
    Ok(Json(outcome))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_history_limit() {
        assert_eq!(HistoryQuery::default().limit().unwrap(), 50);
        assert_eq!(HistoryQuery { limit: Some(5) }.limit().unwrap(), 5);
        assert!(HistoryQuery { limit: Some(0) }.limit().is_err());
        assert!(HistoryQuery { limit: Some(500) }.limit().is_err());
    }
}

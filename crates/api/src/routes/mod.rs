//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Welcome
//! GET  /health                    - Liveness
//! GET  /health/ready              - Readiness (database)
//!
//! # Under /api/v1
//! /auth/*                         - Sign-up, login, tokens, passwords
//! /users/me/*                     - Profile, picture, fitness profile
//! /addresses, /payment-methods    - Saved checkout details
//! /products, /categories, /search - Catalog
//! /products/{id}/reviews, /reviews/{id}
//! /cart, /orders, /subscriptions, /loyalty, /notifications
//! /payments/stripe/webhook        - Gateway callbacks
//! /admin/*                        - Dashboard, catalog and order management
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod form;
pub mod loyalty;
pub mod orders;
pub mod payments;
pub mod reviews;
pub mod subscriptions;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Prefix of every versioned route.
pub const API_PREFIX: &str = "/api/v1";

/// The complete application router without rate limits. Used by tests.
pub fn app(state: AppState) -> Router {
    build(state, false)
}

/// The application router with per-IP rate limits: strict on `/auth`, relaxed
/// elsewhere. Gateway callbacks are not limited.
pub fn rate_limited_app(state: AppState) -> Router {
    build(state, true)
}

fn build(state: AppState, rate_limited: bool) -> Router {
    let mut credentials = auth::router();
    let mut api = api_routes();
    if rate_limited {
        credentials = credentials.layer(auth_rate_limiter());
        api = api.layer(api_rate_limiter());
    }

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest(
            API_PREFIX,
            credentials.merge(api).merge(payments::router()),
        )
        .with_state(state)
}

/// Versioned routes other than `/auth` and the gateway callbacks.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(account::router())
        .merge(catalog::router())
        .merge(reviews::router())
        .merge(cart::router())
        .merge(orders::router())
        .merge(subscriptions::router())
        .merge(loyalty::router())
        .nest("/admin", admin::router())
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Welcome to the BeFit API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "online",
    }))
}

/// Liveness check.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// Readiness check against the database connection.
pub async fn readiness(State(state): State<AppState>) -> Response {
    match sqlx::query("SELECT 1").execute(state.pool()).await {
        Ok(_) => Json(json!({ "status": "ready", "database": "connected" })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "not_ready", "database": "disconnected" })),
            )
                .into_response()
        }
    }
}

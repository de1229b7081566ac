//! Shopping cart routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;

use befit_core::ProductId;

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::Cart;
use crate::services::CartService;
use crate::state::AppState;

/// Build the cart router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route(
            "/cart/items/{product_id}",
            put(update_item).delete(remove_item),
        )
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: i32,
}

const fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

pub async fn get_cart(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Cart>, AppError> {
    Ok(Json(CartService::new(state.pool()).get(user.id).await?))
}

pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<Cart>, AppError> {
    let cart = CartService::new(state.pool())
        .add_item(user.id, body.product_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

pub async fn update_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<Cart>, AppError> {
    let cart = CartService::new(state.pool())
        .update_item(user.id, product_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

pub async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Cart>, AppError> {
    let cart = CartService::new(state.pool())
        .remove_item(user.id, product_id)
        .await?;
    Ok(Json(cart))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<StatusCode, AppError> {
    CartService::new(state.pool()).clear(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

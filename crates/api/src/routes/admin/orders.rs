//! Admin order management.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use serde::{Deserialize, Serialize};

use befit_core::{OrderId, OrderStatus};

use crate::db::OrderRepository;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{Order, OrderDetail, OrderStatusUpdate};
use crate::routes::orders::service;
use crate::state::AppState;
use crate::validation::Pagination;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/{id}/status", patch(update_status))
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

pub async fn list_orders(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrderPage>, AppError> {
    let pagination = Pagination::from_query(query.page, query.limit).validate()?;
    let (orders, total) = OrderRepository::new(state.pool())
        .list_all(query.status, pagination.limit, pagination.offset())
        .await?;

    Ok(Json(OrderPage {
        orders,
        total,
        page: pagination.page,
        limit: pagination.limit,
        total_pages: pagination.total_pages(total),
    }))
}

/// Move an order to a new status. Delivery earns loyalty points; cancelling or
/// refunding goes through the gateway.
pub async fn update_status(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<OrderStatusUpdate>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(service(&state).update_status(id, &body).await?))
}

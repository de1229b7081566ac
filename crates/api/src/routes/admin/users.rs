//! Admin user management.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use befit_core::{UserId, UserRole};

use crate::db::{RepositoryError, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::User;
use crate::state::AppState;
use crate::validation::Pagination;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}/status", patch(set_status))
        .route("/users/{id}/role", patch(set_role))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub account_status: bool,
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: UserRole,
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<UserListQuery>,
) -> Result<Json<UserPage>, AppError> {
    let pagination = Pagination::from_query(query.page, query.limit).validate()?;
    let (users, total) = UserRepository::new(state.pool())
        .list(pagination.limit, pagination.offset())
        .await?;

    Ok(Json(UserPage {
        users,
        total,
        page: pagination.page,
        limit: pagination.limit,
        total_pages: pagination.total_pages(total),
    }))
}

/// Activate or deactivate an account. Admins cannot deactivate themselves.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn set_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(body): Json<StatusChange>,
) -> Result<Json<User>, AppError> {
    reject_self(&admin, id, "You cannot change your own account status")?;
    let user = UserRepository::new(state.pool())
        .set_account_status(id, body.account_status)
        .await
        .map_err(|e| user_error(id, e))?;
    info!(user_id = %id, active = body.account_status, "Account status changed");
    Ok(Json(user))
}

/// Change a user's role. Admins cannot demote themselves.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(body): Json<RoleChange>,
) -> Result<Json<User>, AppError> {
    reject_self(&admin, id, "You cannot change your own role")?;
    let user = UserRepository::new(state.pool())
        .set_role(id, body.role)
        .await
        .map_err(|e| user_error(id, e))?;
    info!(user_id = %id, role = %body.role, "Role changed");
    Ok(Json(user))
}

fn reject_self(admin: &User, target: UserId, message: &str) -> Result<(), AppError> {
    if admin.id == target {
        return Err(AppError::BadRequest(message.to_string()));
    }
    Ok(())
}

fn user_error(id: UserId, err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound(format!("User with ID {id} not found")),
        other => AppError::Database(other),
    }
}

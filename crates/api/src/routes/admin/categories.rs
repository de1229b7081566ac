//! Admin category management.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
};

use befit_core::CategoryId;

use crate::db::{CategoryRepository, RepositoryError};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{Category, CategoryInput};
use crate::state::AppState;
use crate::validation::validate_category_name;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", post(create_category))
        .route(
            "/categories/{id}",
            put(update_category).delete(delete_category),
        )
}

pub async fn create_category(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(body): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    validate_category_name(&body.name)?;
    let category = CategoryRepository::new(state.pool()).create(&body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(body): Json<CategoryInput>,
) -> Result<Json<Category>, AppError> {
    validate_category_name(&body.name)?;
    let category = CategoryRepository::new(state.pool())
        .update(id, &body)
        .await
        .map_err(|e| category_error(id, e))?;
    Ok(Json(category))
}

/// Products of a deleted category become uncategorized.
pub async fn delete_category(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, AppError> {
    CategoryRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(|e| category_error(id, e))?;
    Ok(StatusCode::NO_CONTENT)
}

fn category_error(id: CategoryId, err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound(format!("Category with ID {id} not found")),
        other => AppError::Database(other),
    }
}

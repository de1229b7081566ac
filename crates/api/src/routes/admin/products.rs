//! Admin catalog management: products and their images.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{delete, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use befit_core::{CategoryId, ProductBulkAction, ProductId, ProductImageId};

use crate::db::{CategoryRepository, ProductRepository, RepositoryError};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{Product, ProductImage, ProductInput, ProductUpdate};
use crate::routes::form::{MultipartForm, UPLOAD_BODY_LIMIT};
use crate::state::AppState;
use crate::storage::{ImageOwner, validate_image};
use crate::validation::{ValidationError, validate_product};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/bulk-action", post(bulk_action))
        .route("/products/{id}", put(update_product).delete(delete_product))
        .route(
            "/products/{id}/images",
            post(upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/products/{id}/images/{image_id}", delete(delete_image))
}

#[derive(Debug, Deserialize)]
pub struct BulkActionRequest {
    pub product_ids: Vec<ProductId>,
    pub action: ProductBulkAction,
}

#[derive(Debug, Serialize)]
pub struct BulkFailure {
    pub product_id: ProductId,
    pub detail: String,
}

#[derive(Debug, Default, Serialize)]
pub struct BulkActionResponse {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<BulkFailure>,
}

#[instrument(skip(state, body), fields(name = %body.name))]
pub async fn create_product(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(body): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    validate_product(&body)?;
    check_category(&state, body.category_id).await?;

    let product = ProductRepository::new(state.pool()).create(&body).await?;
    info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Partial update; absent fields keep their value.
#[instrument(skip(state, body))]
pub async fn update_product(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductUpdate>,
) -> Result<Json<Product>, AppError> {
    let repo = ProductRepository::new(state.pool());
    let current = repo.get(id).await?.ok_or_else(|| product_not_found(id))?;

    let input = body.apply_to(&current);
    validate_product(&input)?;
    check_category(&state, input.category_id).await?;

    let product = repo
        .update(id, &input)
        .await
        .map_err(|e| product_error(id, e))?;
    Ok(Json(product))
}

/// Delete a product. Products that appear in orders are refused with 409.
#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    remove_product(&state, id).await?;
    info!(product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Apply one action to many products. Failures are reported per product and do
/// not stop the batch.
#[instrument(skip(state, body), fields(action = %body.action, count = body.product_ids.len()))]
pub async fn bulk_action(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(body): Json<BulkActionRequest>,
) -> Result<Json<BulkActionResponse>, AppError> {
    if body.product_ids.is_empty() {
        return Err(ValidationError::new("product_ids", "must not be empty").into());
    }

    let repo = ProductRepository::new(state.pool());
    let mut response = BulkActionResponse::default();
    for id in body.product_ids {
        let result = match body.action {
            ProductBulkAction::Activate => repo
                .set_active(id, true)
                .await
                .map_err(|e| product_error(id, e)),
            ProductBulkAction::Deactivate => repo
                .set_active(id, false)
                .await
                .map_err(|e| product_error(id, e)),
            ProductBulkAction::Delete => remove_product(&state, id).await,
        };
        match result {
            Ok(()) => response.success += 1,
            Err(e) => {
                warn!(product_id = %id, error = %e, "Bulk action failed for product");
                response.failed += 1;
                response.errors.push(BulkFailure {
                    product_id: id,
                    detail: e.to_string(),
                });
            }
        }
    }

    info!(success = response.success, failed = response.failed, "Bulk action finished");
    Ok(Json(response))
}

/// Multipart fields: `image` (file), `is_primary`, `display_order`.
#[instrument(skip(state, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ProductImage>), AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let bytes = form
        .take_file("image")
        .ok_or_else(|| ValidationError::new("image", "field required"))?;
    validate_image(&bytes)?;
    let is_primary = form.flag("is_primary");
    let display_order = form
        .text("display_order")
        .map(str::parse::<i32>)
        .transpose()
        .map_err(|_| ValidationError::new("display_order", "must be an integer"))?
        .unwrap_or(0);

    let repo = ProductRepository::new(state.pool());
    if repo.get(id).await?.is_none() {
        return Err(product_not_found(id));
    }

    let url = state
        .storage()
        .upload_image(ImageOwner::Product(id), bytes)
        .await?;
    let image = match repo.add_image(id, &url, is_primary, display_order).await {
        Ok(image) => image,
        Err(e) => {
            state.storage().delete_by_url(&url).await;
            return Err(product_error(id, e));
        }
    };

    info!(product_id = %id, image_id = %image.id, "Product image added");
    Ok((StatusCode::CREATED, Json(image)))
}

#[instrument(skip(state))]
pub async fn delete_image(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path((id, image_id)): Path<(ProductId, ProductImageId)>,
) -> Result<StatusCode, AppError> {
    let path = ProductRepository::new(state.pool())
        .delete_image(id, image_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Image not found".to_string()),
            other => AppError::Database(other),
        })?;
    state.storage().delete_by_url(&path).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_product(state: &AppState, id: ProductId) -> Result<(), AppError> {
    let paths = ProductRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(|e| product_error(id, e))?;
    for path in paths {
        state.storage().delete_by_url(&path).await;
    }
    Ok(())
}

async fn check_category(state: &AppState, id: Option<CategoryId>) -> Result<(), AppError> {
    match id {
        Some(id) if !CategoryRepository::new(state.pool()).exists(id).await? => Err(
            AppError::NotFound(format!("Category with ID {id} not found")),
        ),
        _ => Ok(()),
    }
}

fn product_not_found(id: ProductId) -> AppError {
    AppError::NotFound(format!("Product with ID {id} not found"))
}

fn product_error(id: ProductId, err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => product_not_found(id),
        other => AppError::Database(other),
    }
}

//! Product reviews.
//!
//! A review must point at a delivered order of the reviewer that contains the
//! product. Only the author may edit or delete it.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use tracing::{info, instrument};

use befit_core::{ProductId, ReviewId};

use crate::db::{OrderRepository, ProductRepository, ReviewRepository};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{Review, ReviewInput, ReviewUpdate, User};
use crate::state::AppState;
use crate::validation::validate_rating;

/// Build the reviews router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/products/{id}/reviews",
            get(list_reviews).post(create_review),
        )
        .route("/reviews/{id}", put(update_review).delete(delete_review))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Vec<Review>>, AppError> {
    if ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .is_none()
    {
        return Err(product_not_found(product_id));
    }
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(product_id)
        .await?;
    Ok(Json(reviews))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
    Json(body): Json<ReviewInput>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    validate_rating(body.rating)?;
    if ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .is_none()
    {
        return Err(product_not_found(product_id));
    }

    let eligible = OrderRepository::new(state.pool())
        .delivered_order_contains(user.id, body.order_id, product_id)
        .await?;
    if !eligible {
        return Err(AppError::BadRequest(
            "You can only review products from your delivered orders".to_string(),
        ));
    }

    let review = ReviewRepository::new(state.pool())
        .create(
            user.id,
            product_id,
            body.order_id,
            body.rating,
            text_of(body.review_text.as_deref()),
        )
        .await?;

    info!(review_id = %review.id, product_id = %product_id, "Review created");
    Ok((StatusCode::CREATED, Json(review)))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ReviewId>,
    Json(body): Json<ReviewUpdate>,
) -> Result<Json<Review>, AppError> {
    if let Some(rating) = body.rating {
        validate_rating(rating)?;
    }
    owned_review(&state, &user, id).await?;

    let review = ReviewRepository::new(state.pool())
        .update(id, body.rating, text_change(body.review_text.as_deref()))
        .await?;
    Ok(Json(review))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode, AppError> {
    owned_review(&state, &user, id).await?;
    ReviewRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn owned_review(state: &AppState, user: &User, id: ReviewId) -> Result<Review, AppError> {
    let review = ReviewRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Review with ID {id} not found")))?;
    if review.user_id != user.id {
        return Err(AppError::Forbidden(
            "You can only modify your own reviews".to_string(),
        ));
    }
    Ok(review)
}

fn text_of(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|text| !text.is_empty())
}

/// A blank text clears the review's text; an absent one keeps it.
fn text_change(text: Option<&str>) -> Option<Option<&str>> {
    text.map(|text| text_of(Some(text)))
}

fn product_not_found(id: ProductId) -> AppError {
    AppError::NotFound(format!("Product with ID {id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_text_is_trimmed() {
        assert_eq!(text_of(Some("  Great taste ")), Some("Great taste"));
        assert_eq!(text_of(Some("   ")), None);
        assert_eq!(text_of(None), None);
    }

    #[test]
    fn test_blank_update_text_clears_the_review() {
        assert_eq!(text_change(None), None);
        assert_eq!(text_change(Some("")), Some(None));
        assert_eq!(text_change(Some("  ")), Some(None));
        assert_eq!(text_change(Some(" Mixes well ")), Some(Some("Mixes well")));
    }
}

//! Review repository.
//!
//! Every write recomputes `products.average_rating` in the same transaction.

use sqlx::{PgConnection, PgPool};

use befit_core::{OrderId, ProductId, ReviewId, UserId};

use super::RepositoryError;
use crate::models::Review;

const REVIEW_QUERY: &str = r"
    SELECT r.id, r.user_id, r.product_id, r.order_id, r.rating, r.review_text,
           u.first_name || ' ' || u.last_name AS user_name, r.created_at, r.updated_at
    FROM befit.reviews r
    JOIN befit.users u ON u.id = r.user_id
";

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, Review>(&format!(
            "{REVIEW_QUERY} WHERE r.product_id = $1 ORDER BY r.created_at DESC, r.id DESC"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Get a review by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, Review>(&format!("{REVIEW_QUERY} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Create a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the product.
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        product_id: ProductId,
        order_id: OrderId,
        rating: i32,
        review_text: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: ReviewId = sqlx::query_scalar(
            r"
            INSERT INTO befit.reviews (user_id, product_id, order_id, rating, review_text)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(order_id)
        .bind(rating)
        .bind(review_text)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "You have already reviewed this product"))?;

        recompute_rating(&mut tx, product_id).await?;
        let review = fetch(&mut tx, id).await?;

        tx.commit().await?;
        Ok(review)
    }

    /// Update a review's rating and text.
    ///
    /// `review_text` is `None` to keep the text and `Some(None)` to clear it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        id: ReviewId,
        rating: Option<i32>,
        review_text: Option<Option<&str>>,
    ) -> Result<Review, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product_id: ProductId = sqlx::query_scalar(
            r"
            UPDATE befit.reviews SET
                rating = COALESCE($2, rating),
                review_text = CASE WHEN $4 THEN $3 ELSE review_text END
            WHERE id = $1
            RETURNING product_id
            ",
        )
        .bind(id)
        .bind(rating)
        .bind(review_text.flatten())
        .bind(review_text.is_some())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        recompute_rating(&mut tx, product_id).await?;
        let review = fetch(&mut tx, id).await?;

        tx.commit().await?;
        Ok(review)
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product_id: ProductId =
            sqlx::query_scalar("DELETE FROM befit.reviews WHERE id = $1 RETURNING product_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        recompute_rating(&mut tx, product_id).await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn fetch(conn: &mut PgConnection, id: ReviewId) -> Result<Review, RepositoryError> {
    let review = sqlx::query_as::<_, Review>(&format!("{REVIEW_QUERY} WHERE r.id = $1"))
        .bind(id)
        .fetch_one(conn)
        .await?;
    Ok(review)
}

/// Set `average_rating` to the mean of all ratings, 0 without reviews.
async fn recompute_rating(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE befit.products SET average_rating = COALESCE(
            (SELECT ROUND(AVG(rating)::NUMERIC, 2) FROM befit.reviews WHERE product_id = $1),
            0
        )
        WHERE id = $1
        ",
    )
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(())
}

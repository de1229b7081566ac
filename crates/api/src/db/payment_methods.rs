//! Payment method repository. Same single-default rule as addresses.

use sqlx::PgPool;

use befit_core::{PaymentMethodId, UserId};

use super::RepositoryError;
use crate::models::{PaymentMethod, PaymentMethodInput};

const PAYMENT_METHOD_COLUMNS: &str = "id, user_id, payment_type, provider_ref, card_brand, \
     last_four, expiration_date, is_default, created_at";

/// Repository for payment method database operations.
pub struct PaymentMethodRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentMethodRepository<'a> {
    /// Create a new payment method repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's payment methods, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PaymentMethod>, RepositoryError> {
        let rows = sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {PAYMENT_METHOD_COLUMNS} FROM befit.payment_methods WHERE user_id = $1 \
             ORDER BY is_default DESC, created_at"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Get one of the user's payment methods.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: PaymentMethodId,
    ) -> Result<Option<PaymentMethod>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentMethod>(&format!(
            "SELECT {PAYMENT_METHOD_COLUMNS} FROM befit.payment_methods WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Save a payment method. The first one becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        input: &PaymentMethodInput,
    ) -> Result<PaymentMethod, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let has_any: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM befit.payment_methods WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        let is_default = input.is_default || !has_any;

        if is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let method = sqlx::query_as::<_, PaymentMethod>(&format!(
            r"
            INSERT INTO befit.payment_methods
                (user_id, payment_type, provider_ref, card_brand, last_four, expiration_date, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PAYMENT_METHOD_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(input.payment_type)
        .bind(input.provider_ref.trim())
        .bind(input.card_brand.as_deref())
        .bind(input.last_four.as_deref())
        .bind(input.expiration_date.as_deref())
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(method)
    }

    /// Make a payment method the user's default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such method.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_default(
        &self,
        user_id: UserId,
        id: PaymentMethodId,
    ) -> Result<PaymentMethod, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        clear_default(&mut tx, user_id).await?;

        let method = sqlx::query_as::<_, PaymentMethod>(&format!(
            "UPDATE befit.payment_methods SET is_default = TRUE WHERE id = $1 AND user_id = $2 \
             RETURNING {PAYMENT_METHOD_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(method)
    }

    /// Delete a payment method.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a live subscription bills this method.
    /// Returns `RepositoryError::NotFound` if the user has no such method.
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, user_id: UserId, id: PaymentMethodId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let in_use: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS(
                SELECT 1 FROM befit.subscriptions
                WHERE payment_method_id = $1 AND subscription_status IN ('active', 'paused')
            )
            ",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if in_use {
            return Err(RepositoryError::Conflict(
                "Payment method is used by an active subscription".to_string(),
            ));
        }

        let was_default: bool = sqlx::query_scalar(
            "DELETE FROM befit.payment_methods WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if was_default {
            sqlx::query(
                r"
                UPDATE befit.payment_methods SET is_default = TRUE
                WHERE id = (
                    SELECT id FROM befit.payment_methods WHERE user_id = $1
                    ORDER BY created_at LIMIT 1
                )
                ",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn clear_default(
    conn: &mut sqlx::PgConnection,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE befit.payment_methods SET is_default = FALSE WHERE user_id = $1 AND is_default",
    )
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Load a payment method inside a transaction, checking ownership.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_owned(
    conn: &mut sqlx::PgConnection,
    user_id: UserId,
    id: PaymentMethodId,
) -> Result<Option<PaymentMethod>, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentMethod>(&format!(
        "SELECT {PAYMENT_METHOD_COLUMNS} FROM befit.payment_methods WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

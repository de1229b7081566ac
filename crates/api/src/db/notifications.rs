//! Notification repository.

use sqlx::PgPool;

use befit_core::{NotificationId, UserId};

use super::RepositoryError;
use crate::models::Notification;

/// Repository for notification database operations.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query_as::<_, Notification>(
            r"
            SELECT id, user_id, title, message, is_read, created_at
            FROM befit.notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Mark one notification read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such notification.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<Notification, RepositoryError> {
        sqlx::query_as::<_, Notification>(
            r"
            UPDATE befit.notifications SET is_read = TRUE
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, title, message, is_read, created_at
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Mark every notification of a user read, returning how many changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE befit.notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Write a notification, inside the caller's transaction when there is one.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn notify<'e, E>(
    executor: E,
    user_id: UserId,
    title: &str,
    message: &str,
) -> Result<(), RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query("INSERT INTO befit.notifications (user_id, title, message) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(title)
        .bind(message)
        .execute(executor)
        .await?;
    Ok(())
}

//! Subscription and plan repository.
//!
//! A user has at most one live (active or paused) subscription; the partial
//! unique index `subscriptions_one_live_idx` backs this up.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use befit_core::{
    FitnessProfileId, PaymentMethodId, SubscriptionId, SubscriptionPlanId, SubscriptionStatus,
    UserId,
};

use super::RepositoryError;
use crate::models::{Subscription, SubscriptionPlan};

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, profile_id, plan_id, payment_method_id, \
     subscription_status, start_date, end_date, next_delivery_date, auto_renew, price, \
     last_payment_date, failed_payment_attempts, created_at, updated_at";

/// Repository for subscription database operations.
pub struct SubscriptionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new subscription repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All plans by price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_plans(&self) -> Result<Vec<SubscriptionPlan>, RepositoryError> {
        let rows = sqlx::query_as::<_, SubscriptionPlan>(
            "SELECT id, name, description, price, created_at FROM befit.subscription_plans \
             ORDER BY price, name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Plan by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn plan_by_name(&self, name: &str) -> Result<Option<SubscriptionPlan>, RepositoryError> {
        let row = sqlx::query_as::<_, SubscriptionPlan>(
            "SELECT id, name, description, price, created_at FROM befit.subscription_plans \
             WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Plan by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn plan(
        &self,
        id: SubscriptionPlanId,
    ) -> Result<Option<SubscriptionPlan>, RepositoryError> {
        let row = sqlx::query_as::<_, SubscriptionPlan>(
            "SELECT id, name, description, price, created_at FROM befit.subscription_plans \
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a plan unless its name exists. Returns whether a row was added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn ensure_plan(
        &self,
        name: &str,
        description: &str,
        price: Decimal,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO befit.subscription_plans (name, description, price) VALUES ($1, $2, $3) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(description)
        .bind(price)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The user's live subscription.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn live_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let row = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM befit.subscriptions \
             WHERE user_id = $1 AND subscription_status IN ('active', 'paused')"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// The user's live subscription, or the latest cancelled one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn current_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let row = sqlx::query_as::<_, Subscription>(&format!(
            r"
            SELECT {SUBSCRIPTION_COLUMNS} FROM befit.subscriptions
            WHERE user_id = $1
            ORDER BY (subscription_status <> 'cancelled') DESC, created_at DESC, id DESC
            LIMIT 1
            "
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Pause an active subscription.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no active subscription.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn pause(&self, user_id: UserId) -> Result<Subscription, RepositoryError> {
        sqlx::query_as::<_, Subscription>(&format!(
            r"
            UPDATE befit.subscriptions SET subscription_status = 'paused'
            WHERE user_id = $1 AND subscription_status = 'active'
            RETURNING {SUBSCRIPTION_COLUMNS}
            "
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Resume a paused subscription.
    ///
    /// Clears failed attempts; a delivery date in the past moves to `today`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no paused subscription.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn resume(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Subscription, RepositoryError> {
        sqlx::query_as::<_, Subscription>(&format!(
            r"
            UPDATE befit.subscriptions SET
                subscription_status = 'active',
                failed_payment_attempts = 0,
                next_delivery_date = GREATEST(next_delivery_date, $2)
            WHERE user_id = $1 AND subscription_status = 'paused'
            RETURNING {SUBSCRIPTION_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(today)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Cancel the live subscription for good.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no live subscription.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn cancel(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Subscription, RepositoryError> {
        sqlx::query_as::<_, Subscription>(&format!(
            r"
            UPDATE befit.subscriptions SET
                subscription_status = 'cancelled', end_date = $2, auto_renew = FALSE
            WHERE user_id = $1 AND subscription_status IN ('active', 'paused')
            RETURNING {SUBSCRIPTION_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(today)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Bill the live subscription to another method.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no live subscription.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn change_payment_method(
        &self,
        user_id: UserId,
        payment_method_id: PaymentMethodId,
    ) -> Result<Subscription, RepositoryError> {
        sqlx::query_as::<_, Subscription>(&format!(
            r"
            UPDATE befit.subscriptions SET payment_method_id = $2
            WHERE user_id = $1 AND subscription_status IN ('active', 'paused')
            RETURNING {SUBSCRIPTION_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(payment_method_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// IDs of active, auto-renewing subscriptions due on or before `today`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn due_for_renewal(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<SubscriptionId>, RepositoryError> {
        let ids = sqlx::query_scalar(
            r"
            SELECT id FROM befit.subscriptions
            WHERE subscription_status = 'active' AND auto_renew AND next_delivery_date <= $1
            ORDER BY next_delivery_date, id
            ",
        )
        .bind(today)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }
}

/// Fields of a new subscription row.
#[derive(Debug, Clone, Copy)]
pub struct NewSubscription {
    pub user_id: UserId,
    pub profile_id: FitnessProfileId,
    pub plan_id: SubscriptionPlanId,
    pub payment_method_id: PaymentMethodId,
    pub start_date: NaiveDate,
    pub next_delivery_date: NaiveDate,
    pub price: Decimal,
}

/// Insert an active subscription that was just paid.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the user already has a live subscription.
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert(
    conn: &mut PgConnection,
    new: &NewSubscription,
) -> Result<Subscription, RepositoryError> {
    sqlx::query_as::<_, Subscription>(&format!(
        r"
        INSERT INTO befit.subscriptions (
            user_id, profile_id, plan_id, payment_method_id, subscription_status, start_date,
            next_delivery_date, price, last_payment_date
        )
        VALUES ($1, $2, $3, $4, 'active', $5, $6, $7, $5)
        RETURNING {SUBSCRIPTION_COLUMNS}
        "
    ))
    .bind(new.user_id)
    .bind(new.profile_id)
    .bind(new.plan_id)
    .bind(new.payment_method_id)
    .bind(new.start_date)
    .bind(new.next_delivery_date)
    .bind(new.price)
    .fetch_one(conn)
    .await
    .map_err(|e| RepositoryError::unique(e, "You already have an active subscription"))
}

/// Lock a subscription still due for renewal, skipping rows another run holds.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_due(
    conn: &mut PgConnection,
    id: SubscriptionId,
    today: NaiveDate,
) -> Result<Option<Subscription>, RepositoryError> {
    let row = sqlx::query_as::<_, Subscription>(&format!(
        r"
        SELECT {SUBSCRIPTION_COLUMNS} FROM befit.subscriptions
        WHERE id = $1 AND subscription_status = 'active' AND auto_renew
          AND next_delivery_date <= $2
        FOR UPDATE SKIP LOCKED
        "
    ))
    .bind(id)
    .bind(today)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Record a successful renewal charge.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn record_renewal(
    conn: &mut PgConnection,
    id: SubscriptionId,
    paid_on: NaiveDate,
    next_delivery_date: NaiveDate,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE befit.subscriptions SET
            last_payment_date = $2, next_delivery_date = $3, failed_payment_attempts = 0
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(paid_on)
    .bind(next_delivery_date)
    .execute(conn)
    .await?;
    Ok(())
}

/// Record a failed renewal charge, pausing at `pause_after` failures.
///
/// Returns the new status.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn record_failure(
    conn: &mut PgConnection,
    id: SubscriptionId,
    pause_after: i32,
) -> Result<SubscriptionStatus, RepositoryError> {
    let status = sqlx::query_scalar(
        r"
        UPDATE befit.subscriptions SET
            failed_payment_attempts = failed_payment_attempts + 1,
            subscription_status = CASE
                WHEN failed_payment_attempts + 1 >= $2 THEN 'paused'::befit.subscription_status
                ELSE subscription_status
            END
        WHERE id = $1
        RETURNING subscription_status
        ",
    )
    .bind(id)
    .bind(pause_after)
    .fetch_one(conn)
    .await?;
    Ok(status)
}

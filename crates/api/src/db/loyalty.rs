//! Loyalty repository: tiers, member balances, and the point ledger.

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use befit_core::loyalty::TierRule;
use befit_core::{LoyaltyId, LoyaltyTierId, OrderId, UserId};

use super::RepositoryError;
use crate::models::{LoyaltyTier, PointHistoryEntry, UserLoyalty};

const TIER_COLUMNS: &str = "id, tier_level, tier_name, min_points_required, points_multiplier, \
     free_shipping_threshold, monthly_coupons_count, coupon_discount_percentage";

const MEMBER_QUERY: &str = r"
    SELECT ul.id, ul.user_id, ul.tier_id, t.tier_level, t.tier_name, ul.total_points,
           ul.tier_achieved_date, ul.last_points_update, ul.points_expiration_date
    FROM befit.user_loyalty ul
    JOIN befit.loyalty_tiers t ON t.id = ul.tier_id
";

/// Repository for loyalty database operations.
pub struct LoyaltyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LoyaltyRepository<'a> {
    /// Create a new loyalty repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All tiers by level.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn tiers(&self) -> Result<Vec<LoyaltyTier>, RepositoryError> {
        list_tiers(&mut *self.pool.acquire().await?).await
    }

    /// Tier by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn tier(&self, id: LoyaltyTierId) -> Result<Option<LoyaltyTier>, RepositoryError> {
        let row = sqlx::query_as::<_, LoyaltyTier>(&format!(
            "SELECT {TIER_COLUMNS} FROM befit.loyalty_tiers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Insert or update a tier by level. Returns whether a row was added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert_tier(&self, name: &str, rule: &TierRule) -> Result<bool, RepositoryError> {
        let inserted: bool = sqlx::query_scalar(
            r"
            INSERT INTO befit.loyalty_tiers (
                tier_level, tier_name, min_points_required, points_multiplier,
                free_shipping_threshold, monthly_coupons_count, coupon_discount_percentage
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (tier_level) DO UPDATE SET
                tier_name = EXCLUDED.tier_name,
                min_points_required = EXCLUDED.min_points_required,
                points_multiplier = EXCLUDED.points_multiplier,
                free_shipping_threshold = EXCLUDED.free_shipping_threshold,
                monthly_coupons_count = EXCLUDED.monthly_coupons_count,
                coupon_discount_percentage = EXCLUDED.coupon_discount_percentage
            RETURNING (xmax = 0)
            ",
        )
        .bind(rule.level)
        .bind(name)
        .bind(rule.min_points)
        .bind(rule.points_multiplier)
        .bind(rule.free_shipping_threshold)
        .bind(rule.monthly_coupons)
        .bind(rule.coupon_discount_percentage)
        .fetch_one(self.pool)
        .await?;
        Ok(inserted)
    }

    /// The member's ledger, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(
        &self,
        loyalty_id: LoyaltyId,
        limit: i64,
    ) -> Result<Vec<PointHistoryEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, PointHistoryEntry>(
            r"
            SELECT id, loyalty_id, order_id, points_change, event_type, event_date
            FROM befit.point_history
            WHERE loyalty_id = $1
            ORDER BY event_date DESC, id DESC
            LIMIT $2
            ",
        )
        .bind(loyalty_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Users whose points expire on or before `today`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn due_for_expiry(&self, today: NaiveDate) -> Result<Vec<UserId>, RepositoryError> {
        let ids = sqlx::query_scalar(
            "SELECT user_id FROM befit.user_loyalty \
             WHERE points_expiration_date IS NOT NULL AND points_expiration_date <= $1 \
             ORDER BY user_id",
        )
        .bind(today)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }
}

/// All tiers by level.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_tiers(conn: &mut PgConnection) -> Result<Vec<LoyaltyTier>, RepositoryError> {
    let rows = sqlx::query_as::<_, LoyaltyTier>(&format!(
        "SELECT {TIER_COLUMNS} FROM befit.loyalty_tiers ORDER BY tier_level"
    ))
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Load the member record, creating it at the lowest tier.
///
/// # Errors
///
/// Returns `RepositoryError::DataCorruption` if no tiers are seeded.
/// Returns `RepositoryError::Database` if a query fails.
pub async fn get_or_create_member(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<UserLoyalty, RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO befit.user_loyalty (user_id, tier_id)
        SELECT $1, id FROM befit.loyalty_tiers ORDER BY tier_level LIMIT 1
        ON CONFLICT (user_id) DO NOTHING
        ",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query_as::<_, UserLoyalty>(&format!("{MEMBER_QUERY} WHERE ul.user_id = $1"))
        .bind(user_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| RepositoryError::DataCorruption("no loyalty tiers configured".to_string()))
}

/// Lock the member row for a balance change.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_member(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Option<UserLoyalty>, RepositoryError> {
    let row = sqlx::query_as::<_, UserLoyalty>(&format!(
        "{MEMBER_QUERY} WHERE ul.user_id = $1 FOR UPDATE OF ul"
    ))
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Append an `earned` ledger row. Returns `false` if the order already earned.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_earned(
    conn: &mut PgConnection,
    loyalty_id: LoyaltyId,
    order_id: OrderId,
    points: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        INSERT INTO befit.point_history (loyalty_id, order_id, points_change, event_type)
        VALUES ($1, $2, $3, 'earned')
        ON CONFLICT (order_id) WHERE event_type = 'earned' DO NOTHING
        ",
    )
    .bind(loyalty_id)
    .bind(order_id)
    .bind(points)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Append an `expired` ledger row of `-points`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_expired(
    conn: &mut PgConnection,
    loyalty_id: LoyaltyId,
    points: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO befit.point_history (loyalty_id, points_change, event_type) \
         VALUES ($1, $2, 'expired')",
    )
    .bind(loyalty_id)
    .bind(-points)
    .execute(conn)
    .await?;
    Ok(())
}

/// New balance values for a member.
#[derive(Debug, Clone, Copy)]
pub struct Balance {
    pub total_points: i32,
    pub tier_id: LoyaltyTierId,
    pub tier_changed: bool,
    pub points_expiration_date: Option<NaiveDate>,
    pub today: NaiveDate,
}

/// Write a member's balance. `tier_achieved_date` moves only when the tier changed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn update_balance(
    conn: &mut PgConnection,
    loyalty_id: LoyaltyId,
    balance: &Balance,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE befit.user_loyalty SET
            total_points = $2,
            tier_id = $3,
            tier_achieved_date = CASE WHEN $4 THEN $6 ELSE tier_achieved_date END,
            points_expiration_date = $5,
            last_points_update = $6
        WHERE id = $1
        ",
    )
    .bind(loyalty_id)
    .bind(balance.total_points)
    .bind(balance.tier_id)
    .bind(balance.tier_changed)
    .bind(balance.points_expiration_date)
    .bind(balance.today)
    .execute(conn)
    .await?;
    Ok(())
}

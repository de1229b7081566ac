//! Loyalty program: status, earning on delivery, and point expiration.

use chrono::{NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{error, info, instrument};

use befit_core::loyalty::{
    self as rules, BASE_TIER_LEVEL, TierRule, next_tier, points_for_purchase, upgrade_target,
};
use befit_core::{LoyaltyTierId, UserId};

use crate::db::loyalty::{self, Balance};
use crate::db::{LoyaltyRepository, RepositoryError, notifications};
use crate::error::AppError;
use crate::models::{
    BatchExpireReport, ExpireOutcome, LoyaltyStatus, LoyaltyTier, Order, PointHistoryEntry,
    TierBenefits, UserLoyalty,
};

/// Default page size of the point history.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Points credited for one delivered order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarnedPoints {
    pub points: i32,
    pub new_total: i32,
    /// Level reached when the order crossed a tier threshold.
    pub upgraded_to: Option<i32>,
}

/// Loyalty service.
pub struct LoyaltyService<'a> {
    pool: &'a PgPool,
}

impl<'a> LoyaltyService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Current balance, tier, and the distance to the next tier.
    ///
    /// Creates the member record at the lowest tier on first access.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails or no tiers are seeded.
    #[instrument(skip(self))]
    pub async fn status(&self, user_id: UserId) -> Result<LoyaltyStatus, AppError> {
        let mut conn = self.pool.acquire().await?;
        let member = loyalty::get_or_create_member(&mut conn, user_id).await?;
        let tiers = loyalty::list_tiers(&mut conn).await?;
        let current = tier_of(&tiers, member.tier_id)?;
        Ok(build_status(&member, current, &rules_of(&tiers)))
    }

    /// All tiers by level.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn tiers(&self) -> Result<Vec<LoyaltyTier>, AppError> {
        Ok(LoyaltyRepository::new(self.pool).tiers().await?)
    }

    /// One tier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown IDs.
    pub async fn tier(&self, id: LoyaltyTierId) -> Result<LoyaltyTier, AppError> {
        LoyaltyRepository::new(self.pool)
            .tier(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loyalty tier with ID {id} not found")))
    }

    /// Ledger entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<PointHistoryEntry>, AppError> {
        let member = {
            let mut conn = self.pool.acquire().await?;
            loyalty::get_or_create_member(&mut conn, user_id).await?
        };
        Ok(LoyaltyRepository::new(self.pool)
            .history(member.id, limit)
            .await?)
    }

    /// Expire the user's points if their expiration date has passed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn expire(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<ExpireOutcome, AppError> {
        let mut tx = self.pool.begin().await?;
        loyalty::get_or_create_member(&mut tx, user_id).await?;
        let member = loyalty::lock_member(&mut tx, user_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let Some(expiration) = member.points_expiration_date else {
            return Ok(ExpireOutcome::NotDue {
                message: "No points or no expiration date set".to_string(),
            });
        };
        if !rules::is_expired(Some(expiration), today) {
            return Ok(ExpireOutcome::NotDue {
                message: format!("Points have not expired yet. They expire on {expiration}"),
            });
        }

        let tiers = loyalty::list_tiers(&mut tx).await?;
        let base = tiers
            .first()
            .ok_or_else(|| RepositoryError::DataCorruption("no loyalty tiers configured".into()))?;

        let points_expired = member.total_points;
        if points_expired > 0 {
            loyalty::insert_expired(&mut tx, member.id, points_expired).await?;
        }
        let tier_reset = member.tier_id != base.id;
        loyalty::update_balance(
            &mut tx,
            member.id,
            &Balance {
                total_points: 0,
                tier_id: base.id,
                tier_changed: tier_reset,
                points_expiration_date: None,
                today,
            },
        )
        .await?;
        tx.commit().await?;

        info!(%user_id, points_expired, tier_reset, "Loyalty points expired");
        Ok(ExpireOutcome::Expired {
            points_expired,
            new_total: 0,
            tier_reset,
            new_tier_level: base.tier_level,
        })
    }

    /// Expire every member whose date has passed. Failures are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the due members cannot be listed.
    #[instrument(skip(self))]
    pub async fn expire_all(&self, today: NaiveDate) -> Result<BatchExpireReport, AppError> {
        let due = LoyaltyRepository::new(self.pool).due_for_expiry(today).await?;
        let mut report = BatchExpireReport::default();

        for user_id in due {
            match self.expire(user_id, today).await {
                Ok(outcome) => report.record(&outcome),
                Err(e) => error!(error = %e, %user_id, "Failed to expire loyalty points"),
            }
        }

        info!(
            users_affected = report.users_affected,
            total_expired_points = report.total_expired_points,
            "Loyalty expiry run finished"
        );
        Ok(report)
    }
}

/// Credit points for a delivered order inside the caller's transaction.
///
/// Returns `None` when the order earns nothing or already earned.
///
/// # Errors
///
/// Returns `AppError::Database` if a query fails or no tiers are seeded.
pub async fn earn_for_order(
    conn: &mut PgConnection,
    order: &Order,
) -> Result<Option<EarnedPoints>, AppError> {
    loyalty::get_or_create_member(conn, order.user_id).await?;
    let member = loyalty::lock_member(conn, order.user_id)
        .await?
        .ok_or(RepositoryError::NotFound)?;
    let tiers = loyalty::list_tiers(conn).await?;
    let current = tier_of(&tiers, member.tier_id)?;

    let points = points_for_purchase(order.total_amount, current.points_multiplier);
    if points == 0 || !loyalty::insert_earned(conn, member.id, order.id, points).await? {
        return Ok(None);
    }

    let today = Utc::now().date_naive();
    let new_total = member.total_points.saturating_add(points);
    let rule_set = rules_of(&tiers);
    let target = upgrade_target(&rule_set, member.tier_level, new_total)
        .and_then(|rule| tiers.iter().find(|tier| tier.tier_level == rule.level));
    let new_tier = target.unwrap_or(current);

    let points_expiration_date = match member.points_expiration_date {
        None if member.tier_level == BASE_TIER_LEVEL => Some(rules::expiration_from(today)),
        existing => existing,
    };

    loyalty::update_balance(
        conn,
        member.id,
        &Balance {
            total_points: new_total,
            tier_id: new_tier.id,
            tier_changed: target.is_some(),
            points_expiration_date,
            today,
        },
    )
    .await?;

    if let Some(tier) = target {
        notifications::notify(
            &mut *conn,
            order.user_id,
            "Loyalty tier upgraded",
            &format!(
                "Congratulations! You reached {} (level {}).",
                tier.tier_name, tier.tier_level
            ),
        )
        .await?;
        info!(user_id = %order.user_id, tier_level = tier.tier_level, "Loyalty tier upgraded");
    }

    Ok(Some(EarnedPoints {
        points,
        new_total,
        upgraded_to: target.map(|tier| tier.tier_level),
    }))
}

/// Free-shipping rule of the user's tier, creating the member record if needed.
///
/// # Errors
///
/// Returns `AppError::Database` if a query fails or no tiers are seeded.
pub async fn member_rule(conn: &mut PgConnection, user_id: UserId) -> Result<TierRule, AppError> {
    let member = loyalty::get_or_create_member(conn, user_id).await?;
    let tiers = loyalty::list_tiers(conn).await?;
    Ok(tier_of(&tiers, member.tier_id)?.rule())
}

fn rules_of(tiers: &[LoyaltyTier]) -> Vec<TierRule> {
    tiers.iter().map(LoyaltyTier::rule).collect()
}

fn tier_of(tiers: &[LoyaltyTier], id: LoyaltyTierId) -> Result<&LoyaltyTier, RepositoryError> {
    tiers
        .iter()
        .find(|tier| tier.id == id)
        .ok_or_else(|| RepositoryError::DataCorruption(format!("member references tier {id}")))
}

fn build_status(member: &UserLoyalty, current: &LoyaltyTier, rules: &[TierRule]) -> LoyaltyStatus {
    let next = next_tier(rules, member.tier_level, member.total_points);
    LoyaltyStatus {
        user_id: member.user_id,
        tier_level: member.tier_level,
        tier_name: member.tier_name.clone(),
        total_points: member.total_points,
        points_expiration_date: member.points_expiration_date,
        tier_achieved_date: member.tier_achieved_date,
        next_tier_level: next.map(|(level, _)| level),
        points_to_next_tier: next.map(|(_, missing)| missing),
        current_benefits: TierBenefits {
            monthly_coupons: current.monthly_coupons_count,
            coupon_discount: current.coupon_discount_percentage,
            free_shipping: current.rule().free_shipping().to_string(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use befit_core::LoyaltyId;
    use befit_core::loyalty::default_tiers;

    use super::*;

    fn tiers() -> Vec<LoyaltyTier> {
        default_tiers()
            .into_iter()
            .zip(["Bronze", "Silver", "Gold"])
            .map(|(rule, name)| LoyaltyTier {
                id: LoyaltyTierId::new(rule.level * 10),
                tier_level: rule.level,
                tier_name: name.to_string(),
                min_points_required: rule.min_points,
                points_multiplier: rule.points_multiplier,
                free_shipping_threshold: rule.free_shipping_threshold,
                monthly_coupons_count: rule.monthly_coupons,
                coupon_discount_percentage: rule.coupon_discount_percentage,
            })
            .collect()
    }

    fn member(level: i32, points: i32) -> UserLoyalty {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        UserLoyalty {
            id: LoyaltyId::new(1),
            user_id: UserId::new(7),
            tier_id: LoyaltyTierId::new(level * 10),
            tier_level: level,
            tier_name: "Bronze".to_string(),
            total_points: points,
            tier_achieved_date: today,
            last_points_update: today,
            points_expiration_date: None,
        }
    }

    #[test]
    fn test_status_reports_next_tier() {
        let tiers = tiers();
        let member = member(1, 120);
        let current = tier_of(&tiers, member.tier_id).unwrap();
        let status = build_status(&member, current, &rules_of(&tiers));

        assert_eq!(status.next_tier_level, Some(2));
        assert_eq!(status.points_to_next_tier, Some(380));
        assert_eq!(status.current_benefits.monthly_coupons, 1);
        assert_eq!(
            status.current_benefits.free_shipping,
            "Free shipping on orders over $1000"
        );
    }

    #[test]
    fn test_status_at_top_tier_has_no_next() {
        let tiers = tiers();
        let member = member(3, 2500);
        let current = tier_of(&tiers, member.tier_id).unwrap();
        let status = build_status(&member, current, &rules_of(&tiers));

        assert_eq!(status.next_tier_level, None);
        assert_eq!(status.points_to_next_tier, None);
        assert_eq!(status.current_benefits.free_shipping, "Free shipping on all orders");
    }

    #[test]
    fn test_unknown_tier_is_data_corruption() {
        let err = tier_of(&tiers(), LoyaltyTierId::new(99)).unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(_)));
    }
}

//! Loyalty tiers, balances, and the point ledger.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use befit_core::loyalty::TierRule;
use befit_core::{LoyaltyId, LoyaltyTierId, OrderId, PointEventType, PointHistoryId, UserId};

/// A tier row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LoyaltyTier {
    pub id: LoyaltyTierId,
    pub tier_level: i32,
    pub tier_name: String,
    pub min_points_required: i32,
    pub points_multiplier: Decimal,
    pub free_shipping_threshold: Decimal,
    pub monthly_coupons_count: i32,
    pub coupon_discount_percentage: i32,
}

impl LoyaltyTier {
    /// The numeric rules used by the tier calculations.
    #[must_use]
    pub const fn rule(&self) -> TierRule {
        TierRule {
            level: self.tier_level,
            min_points: self.min_points_required,
            points_multiplier: self.points_multiplier,
            free_shipping_threshold: self.free_shipping_threshold,
            monthly_coupons: self.monthly_coupons_count,
            coupon_discount_percentage: self.coupon_discount_percentage,
        }
    }
}

/// A member's balance joined with their tier.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserLoyalty {
    pub id: LoyaltyId,
    pub user_id: UserId,
    pub tier_id: LoyaltyTierId,
    pub tier_level: i32,
    pub tier_name: String,
    pub total_points: i32,
    pub tier_achieved_date: NaiveDate,
    pub last_points_update: NaiveDate,
    pub points_expiration_date: Option<NaiveDate>,
}

/// A ledger entry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PointHistoryEntry {
    pub id: PointHistoryId,
    pub loyalty_id: LoyaltyId,
    pub order_id: Option<OrderId>,
    pub points_change: i32,
    pub event_type: PointEventType,
    pub event_date: DateTime<Utc>,
}

/// Benefits of the member's current tier.
#[derive(Debug, Clone, Serialize)]
pub struct TierBenefits {
    pub monthly_coupons: i32,
    pub coupon_discount: i32,
    pub free_shipping: String,
}

/// Response of `GET /loyalty/status`.
#[derive(Debug, Clone, Serialize)]
pub struct LoyaltyStatus {
    pub user_id: UserId,
    pub tier_level: i32,
    pub tier_name: String,
    pub total_points: i32,
    pub points_expiration_date: Option<NaiveDate>,
    pub tier_achieved_date: NaiveDate,
    pub next_tier_level: Option<i32>,
    pub points_to_next_tier: Option<i32>,
    pub current_benefits: TierBenefits,
}

/// Outcome of expiring one member's points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExpireOutcome {
    /// Points are not yet due.
    NotDue { message: String },
    /// Points were expired and the member reset to the base tier.
    Expired {
        points_expired: i32,
        new_total: i32,
        tier_reset: bool,
        new_tier_level: i32,
    },
}

/// Result of a batch expiry run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchExpireReport {
    pub users_affected: u32,
    pub total_expired_points: i64,
}

impl BatchExpireReport {
    /// Count one member's expiry. Members reset with no points are not affected.
    pub fn record(&mut self, outcome: &ExpireOutcome) {
        if let ExpireOutcome::Expired { points_expired, .. } = *outcome
            && points_expired > 0
        {
            self.users_affected += 1;
            self.total_expired_points += i64::from(points_expired);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expired(points_expired: i32) -> ExpireOutcome {
        ExpireOutcome::Expired {
            points_expired,
            new_total: 0,
            tier_reset: points_expired > 0,
            new_tier_level: 1,
        }
    }

    #[test]
    fn test_batch_report_counts_only_members_who_lost_points() {
        let mut report = BatchExpireReport::default();
        report.record(&expired(120));
        report.record(&expired(0));
        report.record(&ExpireOutcome::NotDue {
            message: "Points not yet due for expiration".to_string(),
        });
        report.record(&expired(30));

        assert_eq!(
            report,
            BatchExpireReport {
                users_affected: 2,
                total_expired_points: 150,
            }
        );
    }
}

//! Loyalty program rules.
//!
//! Points are earned on delivered orders at the tier's multiplier. Tiers only go up
//! when points are earned; the only way down is expiration, which resets the
//! member to the first tier.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Days between the first earn at tier 1 and point expiration.
pub const POINTS_EXPIRATION_DAYS: u64 = 180;

/// Tier level every new member starts at.
pub const BASE_TIER_LEVEL: i32 = 1;

/// The numeric rules of a loyalty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRule {
    pub level: i32,
    pub min_points: i32,
    pub points_multiplier: Decimal,
    pub free_shipping_threshold: Decimal,
    pub monthly_coupons: i32,
    pub coupon_discount_percentage: i32,
}

impl TierRule {
    /// Shipping benefit granted by this tier.
    #[must_use]
    pub fn free_shipping(&self) -> FreeShipping {
        FreeShipping::from_threshold(self.free_shipping_threshold)
    }
}

/// Tiers the program ships with: (level, min points, multiplier, free shipping
/// threshold, monthly coupons, coupon discount %).
#[must_use]
pub fn default_tiers() -> Vec<TierRule> {
    [
        (1, 0, Decimal::new(10, 1), Decimal::new(1000, 0), 1, 5),
        (2, 500, Decimal::new(15, 1), Decimal::new(500, 0), 2, 10),
        (3, 1500, Decimal::new(20, 1), Decimal::ZERO, 3, 15),
    ]
    .into_iter()
    .map(
        |(level, min_points, points_multiplier, free_shipping_threshold, coupons, discount)| {
            TierRule {
                level,
                min_points,
                points_multiplier,
                free_shipping_threshold,
                monthly_coupons: coupons,
                coupon_discount_percentage: discount,
            }
        },
    )
    .collect()
}

/// Highest tier whose minimum is met by `points`.
#[must_use]
pub fn tier_for_points(tiers: &[TierRule], points: i32) -> Option<&TierRule> {
    tiers
        .iter()
        .filter(|tier| tier.min_points <= points)
        .max_by_key(|tier| tier.level)
}

/// Tier to upgrade to after earning, if the new total crosses a higher threshold.
///
/// Returns `None` when the member stays where they are. Never downgrades.
#[must_use]
pub fn upgrade_target(tiers: &[TierRule], current_level: i32, points: i32) -> Option<&TierRule> {
    tier_for_points(tiers, points).filter(|tier| tier.level > current_level)
}

/// The next tier above `current_level` and how many points are missing to reach it.
///
/// `None` at the top tier.
#[must_use]
pub fn next_tier(tiers: &[TierRule], current_level: i32, points: i32) -> Option<(i32, i32)> {
    tiers
        .iter()
        .filter(|tier| tier.level > current_level)
        .min_by_key(|tier| tier.level)
        .map(|tier| (tier.level, (tier.min_points - points).max(0)))
}

/// Points earned for a purchase: `floor(total × multiplier)`.
#[must_use]
pub fn points_for_purchase(total: Decimal, multiplier: Decimal) -> i32 {
    (total * multiplier)
        .floor()
        .max(Decimal::ZERO)
        .to_i32()
        .unwrap_or(i32::MAX)
}

/// Expiration date for points first earned on `today` at the base tier.
#[must_use]
pub fn expiration_from(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_days(Days::new(POINTS_EXPIRATION_DAYS))
        .unwrap_or(NaiveDate::MAX)
}

/// Whether points with the given expiration date are due on `today`.
#[must_use]
pub fn is_expired(expiration: Option<NaiveDate>, today: NaiveDate) -> bool {
    expiration.is_some_and(|date| date <= today)
}

/// Free-shipping benefit of a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeShipping {
    /// Every order ships free.
    Always,
    /// Orders with a subtotal strictly above the amount ship free.
    Over(Decimal),
    /// The tier has no shipping benefit.
    NotIncluded,
}

impl FreeShipping {
    /// A zero threshold means every order; a negative one disables the benefit.
    #[must_use]
    pub fn from_threshold(threshold: Decimal) -> Self {
        if threshold.is_zero() {
            Self::Always
        } else if threshold > Decimal::ZERO {
            Self::Over(threshold)
        } else {
            Self::NotIncluded
        }
    }

    /// Whether an order with this subtotal ships free.
    #[must_use]
    pub fn applies_to(&self, subtotal: Decimal) -> bool {
        match self {
            Self::Always => true,
            Self::Over(threshold) => subtotal > *threshold,
            Self::NotIncluded => false,
        }
    }
}

impl std::fmt::Display for FreeShipping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Always => f.write_str("Free shipping on all orders"),
            Self::Over(threshold) => write!(f, "Free shipping on orders over ${threshold}"),
            Self::NotIncluded => f.write_str("Not included"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_tier_for_points_picks_highest_reached() {
        let tiers = default_tiers();
        assert_eq!(tier_for_points(&tiers, 0).unwrap().level, 1);
        assert_eq!(tier_for_points(&tiers, 499).unwrap().level, 1);
        assert_eq!(tier_for_points(&tiers, 500).unwrap().level, 2);
        assert_eq!(tier_for_points(&tiers, 10_000).unwrap().level, 3);
    }

    #[test]
    fn test_upgrade_only_moves_up() {
        let tiers = default_tiers();
        assert_eq!(upgrade_target(&tiers, 1, 700).unwrap().level, 2);
        assert_eq!(upgrade_target(&tiers, 1, 1600).unwrap().level, 3);
        assert!(upgrade_target(&tiers, 2, 700).is_none());
        // A tier 3 member below the tier 3 minimum is not downgraded.
        assert!(upgrade_target(&tiers, 3, 100).is_none());
    }

    #[test]
    fn test_next_tier_reports_missing_points() {
        let tiers = default_tiers();
        assert_eq!(next_tier(&tiers, 1, 120), Some((2, 380)));
        assert_eq!(next_tier(&tiers, 2, 900), Some((3, 600)));
        assert_eq!(next_tier(&tiers, 3, 2000), None);
    }

    #[test]
    fn test_points_for_purchase_floors() {
        assert_eq!(points_for_purchase(Decimal::new(59_999, 2), Decimal::new(15, 1)), 899);
        assert_eq!(points_for_purchase(Decimal::new(99, 2), Decimal::ONE), 0);
        assert_eq!(points_for_purchase(Decimal::new(-500, 0), Decimal::ONE), 0);
    }

    #[test]
    fn test_expiration_window() {
        assert_eq!(expiration_from(date(2025, 1, 1)), date(2025, 6, 30));
        assert!(is_expired(Some(date(2025, 6, 30)), date(2025, 6, 30)));
        assert!(!is_expired(Some(date(2025, 7, 1)), date(2025, 6, 30)));
        assert!(!is_expired(None, date(2025, 6, 30)));
    }

    #[test]
    fn test_free_shipping_thresholds() {
        let tiers = default_tiers();
        let base = tiers.first().unwrap().free_shipping();
        assert_eq!(base, FreeShipping::Over(Decimal::new(1000, 0)));
        assert!(!base.applies_to(Decimal::new(1000, 0)));
        assert!(base.applies_to(Decimal::new(100_001, 2)));

        let top = tiers.last().unwrap().free_shipping();
        assert_eq!(top, FreeShipping::Always);
        assert!(top.applies_to(Decimal::ZERO));

        assert_eq!(
            FreeShipping::from_threshold(Decimal::NEGATIVE_ONE),
            FreeShipping::NotIncluded
        );
    }

    #[test]
    fn test_free_shipping_display() {
        assert_eq!(FreeShipping::Always.to_string(), "Free shipping on all orders");
        assert_eq!(
            FreeShipping::Over(Decimal::new(500, 0)).to_string(),
            "Free shipping on orders over $500"
        );
        assert_eq!(FreeShipping::NotIncluded.to_string(), "Not included");
    }
}

//! Subscription plans and subscriptions.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use befit_core::{
    FitnessProfileId, PaymentMethodId, SubscriptionId, SubscriptionPlanId, SubscriptionStatus,
    UserId,
};

use super::Order;

/// A plan a fitness profile can be matched to.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SubscriptionPlan {
    pub id: SubscriptionPlanId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A recurring delivery agreement.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub profile_id: FitnessProfileId,
    pub plan_id: SubscriptionPlanId,
    pub payment_method_id: Option<PaymentMethodId>,
    pub subscription_status: SubscriptionStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub next_delivery_date: NaiveDate,
    pub auto_renew: bool,
    pub price: Decimal,
    pub last_payment_date: Option<NaiveDate>,
    pub failed_payment_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /subscriptions`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionCreate {
    pub payment_method_id: PaymentMethodId,
}

/// Body of `PATCH /subscriptions/payment-method`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentMethodChange {
    pub payment_method_id: PaymentMethodId,
}

/// Short view for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionSummary {
    pub is_active: bool,
    pub status: Option<SubscriptionStatus>,
    pub plan_name: Option<String>,
    pub price: Option<Decimal>,
    pub next_delivery_date: Option<NaiveDate>,
    pub auto_renew: Option<bool>,
}

impl SubscriptionSummary {
    /// Summary for a user with no live subscription.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            is_active: false,
            status: None,
            plan_name: None,
            price: None,
            next_delivery_date: None,
            auto_renew: None,
        }
    }
}

/// Orders billed to a user's subscriptions.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionHistory {
    pub orders: Vec<Order>,
    pub total_orders: usize,
    pub total_spent: Decimal,
}

/// Result of one renewal run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenewalReport {
    pub processed: u32,
    pub renewed: u32,
    pub failed: u32,
    pub paused: u32,
}

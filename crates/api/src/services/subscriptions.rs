//! Monthly supplement subscriptions.
//!
//! A subscription is bought for the plan recommended by the user's fitness
//! profile and charged to a saved card. Each successful charge, the first one
//! included, writes an order tagged with the subscription. Renewals that fail
//! three times in a row pause the subscription until the user resumes it.

use chrono::{Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use befit_core::fitness::plan_from_attributes;
use befit_core::order::OrderTotals;
use befit_core::{
    OrderStatus, PaymentMethodId, PaymentStatus, SubscriptionId, SubscriptionPlanId,
    SubscriptionStatus, UserId,
};

use crate::db::orders::{self, NewOrder};
use crate::db::subscriptions::{self, NewSubscription};
use crate::db::{
    FitnessProfileRepository, OrderRepository, RepositoryError, SubscriptionRepository,
    notifications, payment_methods,
};
use crate::error::AppError;
use crate::models::{
    PaymentMethod, RenewalReport, Subscription, SubscriptionHistory, SubscriptionSummary,
};
use crate::payments::{ChargeOutcome, PaymentGateways};

/// Consecutive failed renewals after which a subscription is paused.
pub const PAUSE_AFTER_FAILURES: i32 = 3;

/// Subscription service.
pub struct SubscriptionService<'a> {
    pool: &'a PgPool,
    payments: &'a PaymentGateways,
}

impl<'a> SubscriptionService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, payments: &'a PaymentGateways) -> Self {
        Self { pool, payments }
    }

    /// Subscribe to the recommended plan and pay the first month.
    ///
    /// # Errors
    ///
    /// - `AppError::BadRequest` without a fitness profile or recommended plan, or
    ///   for a non-card payment method
    /// - `AppError::NotFound` for an unknown payment method or plan
    /// - `AppError::Conflict` when a live subscription exists
    /// - `AppError::PaymentRequired` when the card is declined
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        user_id: UserId,
        payment_method_id: PaymentMethodId,
        today: NaiveDate,
    ) -> Result<Subscription, AppError> {
        let repo = SubscriptionRepository::new(self.pool);
        if repo.live_for_user(user_id).await?.is_some() {
            return Err(AppError::Conflict(
                "You already have an active subscription".to_string(),
            ));
        }

        let profile = FitnessProfileRepository::new(self.pool)
            .get_for_user(user_id)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(
                    "Complete your fitness profile before subscribing".to_string(),
                )
            })?;
        let plan_name = plan_from_attributes(&profile.attributes).ok_or_else(|| {
            AppError::BadRequest("Your fitness profile has no recommended plan".to_string())
        })?;
        let plan = repo
            .plan_by_name(plan_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Subscription plan {plan_name} not found")))?;

        let mut tx = self.pool.begin().await?;
        let method = owned_card(&mut tx, user_id, payment_method_id).await?;

        let key = create_key(user_id, plan.id);
        let description = format!("BeFit {} subscription", plan.name);
        let (order_status, payment_status, reference) =
            match self.payments.charge(&method, plan.price, &description, &key).await? {
                ChargeOutcome::Paid { reference } => {
                    (OrderStatus::Paid, PaymentStatus::Paid, reference)
                }
                ChargeOutcome::Pending { reference } => {
                    (OrderStatus::Pending, PaymentStatus::Pending, reference)
                }
                ChargeOutcome::Declined { reason } => {
                    info!(%user_id, %reason, "Subscription payment declined");
                    return Err(AppError::PaymentRequired(format!(
                        "Payment declined: {reason}"
                    )));
                }
            };

        let stored_reference = reference.to_string();
        let new_subscription = NewSubscription {
            user_id,
            profile_id: profile.id,
            plan_id: plan.id,
            payment_method_id: method.id,
            start_date: today,
            next_delivery_date: next_month(today),
            price: plan.price,
        };
        let payment = RecordedPayment {
            order_status,
            payment_status,
            payment_method_id: Some(method.id),
            reference: &stored_reference,
        };
        let written =
            match record_subscription(&mut tx, &new_subscription, &plan.name, &payment).await {
                Ok(subscription) => tx
                    .commit()
                    .await
                    .map(|()| subscription)
                    .map_err(AppError::from),
                Err(e) => Err(e),
            };
        let subscription = match written {
            Ok(subscription) => subscription,
            Err(e) => {
                self.refund_after_failure(&stored_reference).await;
                return Err(e);
            }
        };

        info!(subscription_id = %subscription.id, plan = %plan.name, "Subscription created");
        Ok(subscription)
    }

    /// The caller's active or paused subscription.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when there is none.
    pub async fn mine(&self, user_id: UserId) -> Result<Subscription, AppError> {
        SubscriptionRepository::new(self.pool)
            .live_for_user(user_id)
            .await?
            .ok_or_else(no_subscription)
    }

    /// Short status for dashboards; `is_active` is false without a live subscription.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    pub async fn summary(&self, user_id: UserId) -> Result<SubscriptionSummary, AppError> {
        let repo = SubscriptionRepository::new(self.pool);
        let Some(subscription) = repo.live_for_user(user_id).await? else {
            return Ok(SubscriptionSummary::none());
        };
        let plan = repo.plan(subscription.plan_id).await?;

        Ok(SubscriptionSummary {
            is_active: subscription.subscription_status == SubscriptionStatus::Active,
            status: Some(subscription.subscription_status),
            plan_name: plan.map(|plan| plan.name),
            price: Some(subscription.price),
            next_delivery_date: Some(subscription.next_delivery_date),
            auto_renew: Some(subscription.auto_renew),
        })
    }

    /// Pause an active subscription.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` without a subscription and
    /// `AppError::BadRequest` if it is not active.
    #[instrument(skip(self))]
    pub async fn pause(&self, user_id: UserId) -> Result<Subscription, AppError> {
        self.require_status(
            user_id,
            SubscriptionStatus::Active,
            "Only active subscriptions can be paused",
        )
        .await?;
        let subscription = SubscriptionRepository::new(self.pool).pause(user_id).await?;
        info!(subscription_id = %subscription.id, "Subscription paused");
        Ok(subscription)
    }

    /// Resume a paused subscription, clearing failed attempts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` without a subscription and
    /// `AppError::BadRequest` if it is not paused.
    #[instrument(skip(self))]
    pub async fn resume(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Subscription, AppError> {
        self.require_status(
            user_id,
            SubscriptionStatus::Paused,
            "Only paused subscriptions can be resumed",
        )
        .await?;
        let subscription = SubscriptionRepository::new(self.pool)
            .resume(user_id, today)
            .await?;
        info!(subscription_id = %subscription.id, "Subscription resumed");
        Ok(subscription)
    }

    /// Cancel for good.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` without a live subscription.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Subscription, AppError> {
        let subscription = SubscriptionRepository::new(self.pool)
            .cancel(user_id, today)
            .await
            .map_err(not_found_as_no_subscription)?;
        info!(subscription_id = %subscription.id, "Subscription cancelled");
        Ok(subscription)
    }

    /// Bill future renewals to another of the caller's cards.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown methods or without a live
    /// subscription, `AppError::BadRequest` for non-card methods.
    #[instrument(skip(self))]
    pub async fn change_payment_method(
        &self,
        user_id: UserId,
        payment_method_id: PaymentMethodId,
    ) -> Result<Subscription, AppError> {
        let mut conn = self.pool.acquire().await?;
        owned_card(&mut conn, user_id, payment_method_id).await?;
        drop(conn);

        Ok(SubscriptionRepository::new(self.pool)
            .change_payment_method(user_id, payment_method_id)
            .await
            .map_err(not_found_as_no_subscription)?)
    }

    /// Orders billed to the caller's subscriptions.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn history(&self, user_id: UserId) -> Result<SubscriptionHistory, AppError> {
        let orders = OrderRepository::new(self.pool)
            .list_subscription_orders(user_id)
            .await?;
        let total_spent = orders
            .iter()
            .filter(|order| order.payment_status == PaymentStatus::Paid)
            .map(|order| order.total_amount)
            .sum();

        Ok(SubscriptionHistory {
            total_orders: orders.len(),
            total_spent,
            orders,
        })
    }

    /// Charge every subscription due on or before `today`.
    ///
    /// Each subscription is handled in its own transaction; rows another worker
    /// holds are skipped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the due list cannot be read.
    #[instrument(skip(self))]
    pub async fn renew_due(&self, today: NaiveDate) -> Result<RenewalReport, AppError> {
        let due = SubscriptionRepository::new(self.pool)
            .due_for_renewal(today)
            .await?;
        let mut report = RenewalReport::default();

        for id in due {
            match self.renew_one(id, today).await {
                Ok(Some(Renewal::Renewed)) => {
                    report.processed += 1;
                    report.renewed += 1;
                }
                Ok(Some(Renewal::Failed { paused })) => {
                    report.processed += 1;
                    report.failed += 1;
                    if paused {
                        report.paused += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => error!(error = %e, subscription_id = %id, "Subscription renewal failed"),
            }
        }

        info!(
            processed = report.processed,
            renewed = report.renewed,
            failed = report.failed,
            paused = report.paused,
            "Subscription renewal run finished"
        );
        Ok(report)
    }

    async fn renew_one(
        &self,
        id: SubscriptionId,
        today: NaiveDate,
    ) -> Result<Option<Renewal>, AppError> {
        let mut tx = self.pool.begin().await?;
        let Some(subscription) = subscriptions::lock_due(&mut tx, id, today).await? else {
            return Ok(None);
        };

        let method = match subscription.payment_method_id {
            Some(method_id) => {
                payment_methods::get_owned(&mut tx, subscription.user_id, method_id).await?
            }
            None => None,
        };
        let outcome = match &method {
            Some(method) => {
                let key = renewal_key(&subscription);
                self.payments
                    .charge(method, subscription.price, "BeFit subscription renewal", &key)
                    .await?
            }
            None => ChargeOutcome::Declined {
                reason: "No payment method on file".to_string(),
            },
        };

        let (order_status, payment_status, reference) = match outcome {
            ChargeOutcome::Paid { reference } => {
                (OrderStatus::Paid, PaymentStatus::Paid, reference)
            }
            ChargeOutcome::Pending { reference } => {
                (OrderStatus::Pending, PaymentStatus::Pending, reference)
            }
            ChargeOutcome::Declined { reason } => {
                let status =
                    subscriptions::record_failure(&mut tx, id, PAUSE_AFTER_FAILURES).await?;
                let paused = status == SubscriptionStatus::Paused;
                let message = if paused {
                    format!(
                        "The renewal payment failed ({reason}). Your subscription was paused; \
                         update your payment method and resume it."
                    )
                } else {
                    format!("The renewal payment failed ({reason}). We will retry soon.")
                };
                notifications::notify(&mut *tx, subscription.user_id, "Payment failed", &message)
                    .await?;
                tx.commit().await?;
                warn!(subscription_id = %id, %reason, paused, "Subscription renewal declined");
                return Ok(Some(Renewal::Failed { paused }));
            }
        };

        let stored_reference = reference.to_string();
        let payment = RecordedPayment {
            order_status,
            payment_status,
            payment_method_id: method.as_ref().map(|m| m.id),
            reference: &stored_reference,
        };
        let written = match record_renewal(&mut tx, &subscription, today, &payment).await {
            Ok(()) => tx.commit().await.map_err(AppError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            self.refund_after_failure(&stored_reference).await;
            return Err(e);
        }
        Ok(Some(Renewal::Renewed))
    }

    async fn refund_after_failure(&self, stored_reference: &str) {
        match self.payments.refund(stored_reference).await {
            Ok(()) => warn!(
                reference = stored_reference,
                "Subscription write failed, charge refunded"
            ),
            Err(e) => error!(
                error = %e,
                reference = stored_reference,
                "Subscription write failed and the refund did not go through"
            ),
        }
    }

    async fn require_status(
        &self,
        user_id: UserId,
        expected: SubscriptionStatus,
        message: &str,
    ) -> Result<(), AppError> {
        let subscription = self.mine(user_id).await?;
        if subscription.subscription_status != expected {
            return Err(AppError::BadRequest(message.to_string()));
        }
        Ok(())
    }
}

enum Renewal {
    Renewed,
    Failed { paused: bool },
}

/// The charge an order row is written for.
struct RecordedPayment<'r> {
    order_status: OrderStatus,
    payment_status: PaymentStatus,
    payment_method_id: Option<PaymentMethodId>,
    reference: &'r str,
}

impl RecordedPayment<'_> {
    fn order(
        &self,
        user_id: UserId,
        price: Decimal,
        subscription_id: SubscriptionId,
    ) -> NewOrder<'_> {
        NewOrder {
            user_id,
            order_status: self.order_status,
            totals: subscription_totals(price),
            shipping_address: None,
            payment_method_id: self.payment_method_id,
            payment_status: self.payment_status,
            payment_reference: Some(self.reference),
            subscription_id: Some(subscription_id),
        }
    }
}

async fn record_subscription(
    conn: &mut sqlx::PgConnection,
    new_subscription: &NewSubscription,
    plan_name: &str,
    payment: &RecordedPayment<'_>,
) -> Result<Subscription, AppError> {
    let subscription = subscriptions::insert(conn, new_subscription).await?;
    orders::insert(
        conn,
        &payment.order(subscription.user_id, subscription.price, subscription.id),
    )
    .await?;
    notifications::notify(
        &mut *conn,
        subscription.user_id,
        "Subscription started",
        &format!(
            "Your {plan_name} subscription is active. Next delivery on {}.",
            subscription.next_delivery_date
        ),
    )
    .await?;
    Ok(subscription)
}

async fn record_renewal(
    conn: &mut sqlx::PgConnection,
    subscription: &Subscription,
    today: NaiveDate,
    payment: &RecordedPayment<'_>,
) -> Result<(), AppError> {
    orders::insert(
        conn,
        &payment.order(subscription.user_id, subscription.price, subscription.id),
    )
    .await?;
    let next = next_month(subscription.next_delivery_date);
    subscriptions::record_renewal(conn, subscription.id, today, next).await?;
    notifications::notify(
        &mut *conn,
        subscription.user_id,
        "Subscription renewed",
        &format!("Your subscription was renewed. Next delivery on {next}."),
    )
    .await?;
    Ok(())
}

/// Idempotency key for a first payment. Every purchase attempt gets its own.
fn create_key(user_id: UserId, plan_id: SubscriptionPlanId) -> String {
    format!("subscription-{user_id}-{plan_id}-{}", Uuid::new_v4())
}

/// Idempotency key for one renewal attempt. A recorded failure moves the
/// subscription to the next key, so a retry is a new charge.
fn renewal_key(subscription: &Subscription) -> String {
    format!(
        "renewal-{}-{}-{}",
        subscription.id, subscription.next_delivery_date, subscription.failed_payment_attempts
    )
}

async fn owned_card(
    conn: &mut sqlx::PgConnection,
    user_id: UserId,
    payment_method_id: PaymentMethodId,
) -> Result<PaymentMethod, AppError> {
    let method = payment_methods::get_owned(conn, user_id, payment_method_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment method not found".to_string()))?;
    if !method.payment_type.is_card() {
        return Err(AppError::BadRequest(
            "Subscriptions must be paid with a card".to_string(),
        ));
    }
    Ok(method)
}

/// Plan prices include tax and shipping.
fn subscription_totals(price: Decimal) -> OrderTotals {
    OrderTotals::compute(price, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
}

/// Same day next month, clamped to the month's last day.
#[must_use]
pub fn next_month(date: NaiveDate) -> NaiveDate {
    date.checked_add_months(Months::new(1)).unwrap_or(date)
}

/// Today's date in UTC, the calendar every subscription job uses.
#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn no_subscription() -> AppError {
    AppError::NotFound("You don't have an active subscription".to_string())
}

fn not_found_as_no_subscription(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => no_subscription(),
        other => AppError::Database(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use befit_core::FitnessProfileId;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_next_month_clamps_to_month_end() {
        assert_eq!(next_month(date(2026, 1, 15)), date(2026, 2, 15));
        assert_eq!(next_month(date(2026, 1, 31)), date(2026, 2, 28));
        assert_eq!(next_month(date(2026, 12, 5)), date(2027, 1, 5));
    }

    #[test]
    fn test_subscription_totals_are_the_plan_price() {
        let totals = subscription_totals(Decimal::new(79_900, 2));
        assert_eq!(totals.total_amount, Decimal::new(79_900, 2));
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.shipping_cost, Decimal::ZERO);
    }

    fn subscription(next_delivery_date: NaiveDate, failed_payment_attempts: i32) -> Subscription {
        Subscription {
            id: SubscriptionId::new(7),
            user_id: UserId::new(3),
            profile_id: FitnessProfileId::new(1),
            plan_id: SubscriptionPlanId::new(2),
            payment_method_id: Some(PaymentMethodId::new(5)),
            subscription_status: SubscriptionStatus::Active,
            start_date: date(2026, 1, 15),
            end_date: None,
            next_delivery_date,
            auto_renew: true,
            price: Decimal::new(79_900, 2),
            last_payment_date: None,
            failed_payment_attempts,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_each_purchase_attempt_has_its_own_key() {
        let first = create_key(UserId::new(3), SubscriptionPlanId::new(2));
        let second = create_key(UserId::new(3), SubscriptionPlanId::new(2));
        assert!(first.starts_with("subscription-3-2-"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_renewal_key_moves_after_a_failure() {
        let due = date(2026, 2, 15);
        assert_eq!(renewal_key(&subscription(due, 0)), "renewal-7-2026-02-15-0");
        assert_eq!(renewal_key(&subscription(due, 0)), renewal_key(&subscription(due, 0)));
        assert_ne!(renewal_key(&subscription(due, 0)), renewal_key(&subscription(due, 1)));
        assert_ne!(
            renewal_key(&subscription(due, 0)),
            renewal_key(&subscription(date(2026, 3, 15), 0))
        );
    }

    #[test]
    fn test_recorded_payment_builds_a_subscription_order() {
        let payment = RecordedPayment {
            order_status: OrderStatus::Paid,
            payment_status: PaymentStatus::Paid,
            payment_method_id: Some(PaymentMethodId::new(5)),
            reference: "pi_123",
        };
        let order = payment.order(UserId::new(3), Decimal::new(79_900, 2), SubscriptionId::new(7));
        assert_eq!(order.subscription_id, Some(SubscriptionId::new(7)));
        assert_eq!(order.payment_reference, Some("pi_123"));
        assert_eq!(order.totals.total_amount, Decimal::new(79_900, 2));
        assert!(order.shipping_address.is_none());
    }

    #[test]
    fn test_missing_subscription_maps_to_not_found() {
        let err = not_found_as_no_subscription(RepositoryError::NotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "You don't have an active subscription");
    }
}

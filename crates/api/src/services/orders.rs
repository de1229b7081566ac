//! Checkout and the order lifecycle.
//!
//! Checkout runs in one transaction holding `FOR UPDATE` locks on the cart
//! lines and their products. The gateway is charged before anything is
//! written, so a declined charge leaves no trace. Reversals (customer cancel,
//! admin cancel or refund) refund paid orders through the gateway that took the
//! money and return stock for goods that never left the warehouse.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use befit_core::loyalty::TierRule;
use befit_core::order::OrderTotals;
use befit_core::{CartId, OrderId, OrderStatus, PaymentStatus, UserId};

use crate::config::CommerceConfig;
use crate::db::orders::{self, NewOrder};
use crate::db::{
    AddressRepository, CartRepository, OrderRepository, carts, notifications, payment_methods,
};
use crate::error::{AppError, add_breadcrumb};
use crate::models::{CartLine, CheckoutRequest, Order, OrderDetail, OrderStatusUpdate};
use crate::payments::{ChargeOutcome, PaymentGateways, PaymentReference, WebhookEvent};
use crate::services::loyalty;

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    payments: &'a PaymentGateways,
    commerce: &'a CommerceConfig,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        payments: &'a PaymentGateways,
        commerce: &'a CommerceConfig,
    ) -> Self {
        Self {
            pool,
            payments,
            commerce,
        }
    }

    /// Turn the caller's cart into a paid (or pending) order.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` for an unknown address or payment method
    /// - `AppError::BadRequest` for an empty cart, inactive products or short stock
    /// - `AppError::PaymentRequired` when the gateway declines the charge
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        request: CheckoutRequest,
    ) -> Result<OrderDetail, AppError> {
        let address = AddressRepository::new(self.pool)
            .get(user_id, request.address_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Address not found".to_string()))?;
        let cart_id = CartRepository::new(self.pool)
            .find_cart(user_id)
            .await?
            .ok_or_else(empty_cart)?;

        let mut tx = self.pool.begin().await?;
        let lines = carts::lines_for_update(&mut tx, cart_id).await?;
        if lines.is_empty() {
            return Err(empty_cart());
        }
        for line in &lines {
            check_line(line)?;
        }

        let method = payment_methods::get_owned(&mut tx, user_id, request.payment_method_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment method not found".to_string()))?;
        let rule = loyalty::member_rule(&mut tx, user_id).await?;
        let totals = self.totals_for(&lines, &rule);

        let key = format!("checkout-{cart_id}-{}", Uuid::new_v4());
        let description = format!("BeFit order for user {user_id}");
        let (order_status, payment_status, reference) = match self
            .payments
            .charge(&method, totals.total_amount, &description, &key)
            .await?
        {
            ChargeOutcome::Paid { reference } => (OrderStatus::Paid, PaymentStatus::Paid, reference),
            ChargeOutcome::Pending { reference } => {
                (OrderStatus::Pending, PaymentStatus::Pending, reference)
            }
            ChargeOutcome::Declined { reason } => {
                info!(%user_id, %reason, "Checkout payment declined");
                return Err(AppError::PaymentRequired(format!("Payment declined: {reason}")));
            }
        };
        let stored_reference = reference.to_string();
        add_breadcrumb(
            "checkout",
            "Charged payment method",
            Some(&[("reference", stored_reference.as_str())]),
        );

        let shipping_address = address.one_line();
        let new_order = NewOrder {
            user_id,
            order_status,
            totals,
            shipping_address: Some(&shipping_address),
            payment_method_id: Some(method.id),
            payment_status,
            payment_reference: Some(&stored_reference),
            subscription_id: None,
        };

        let written = match record_checkout(&mut tx, cart_id, &new_order, &lines).await {
            Ok(order) => tx.commit().await.map(|()| order).map_err(AppError::from),
            Err(e) => Err(e),
        };
        let order = match written {
            Ok(order) => order,
            Err(e) => {
                self.refund_after_failure(&stored_reference).await;
                return Err(e);
            }
        };

        info!(
            order_id = %order.id,
            total = %order.total_amount,
            status = %order.order_status,
            "Order placed"
        );
        self.detail(order.id).await
    }

    /// Cancel one of the caller's orders before fulfilment starts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for orders the caller does not own and
    /// `AppError::BadRequest` once the order is past `paid`.
    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: UserId, order_id: OrderId) -> Result<Order, AppError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock(&mut tx, order_id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or_else(|| order_not_found(order_id))?;

        if !order.order_status.is_cancellable_by_customer() {
            return Err(AppError::BadRequest(format!(
                "Order cannot be cancelled in status {}",
                order.order_status
            )));
        }

        let order = self.reverse(&mut tx, &order, OrderStatus::Cancelled).await?;
        tx.commit().await?;
        info!(%order_id, "Order cancelled by customer");
        Ok(order)
    }

    /// Admin status change along the allowed transitions.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown orders and `AppError::BadRequest`
    /// for transitions the state machine forbids.
    #[instrument(skip(self, update), fields(status = %update.status))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        update: &OrderStatusUpdate,
    ) -> Result<OrderDetail, AppError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock(&mut tx, order_id)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;

        let target = update.status;
        if !order.order_status.can_transition_to(target) {
            return Err(AppError::BadRequest(format!(
                "Cannot change order status from {} to {target}",
                order.order_status
            )));
        }

        let tracking = update.tracking_number.as_deref().filter(|t| !t.trim().is_empty());
        match target {
            OrderStatus::Cancelled | OrderStatus::Refunded => {
                self.reverse(&mut tx, &order, target).await?;
            }
            OrderStatus::Paid => {
                orders::set_status(&mut tx, order_id, target, PaymentStatus::Paid, tracking).await?;
                notify_status(&mut tx, &order, target).await?;
            }
            OrderStatus::Delivered => {
                let delivered =
                    orders::set_status(&mut tx, order_id, target, order.payment_status, tracking)
                        .await?;
                notify_status(&mut tx, &order, target).await?;
                if let Some(earned) = loyalty::earn_for_order(&mut tx, &delivered).await? {
                    debug!(%order_id, points = earned.points, "Loyalty points earned");
                }
            }
            OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Shipped => {
                orders::set_status(&mut tx, order_id, target, order.payment_status, tracking)
                    .await?;
                notify_status(&mut tx, &order, target).await?;
            }
        }

        tx.commit().await?;
        info!(%order_id, from = %order.order_status, to = %target, "Order status changed");
        self.detail(order_id).await
    }

    /// Apply a verified Stripe webhook event.
    ///
    /// Unknown event types and unknown intents are acknowledged and ignored.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the order update fails.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn handle_webhook(&self, event: &WebhookEvent) -> Result<(), AppError> {
        let succeeded = match event.event_type.as_str() {
            "payment_intent.succeeded" => true,
            "payment_intent.payment_failed" => false,
            other => {
                debug!(event_type = other, "Ignoring webhook event");
                return Ok(());
            }
        };
        let Some(intent_id) = event.object_id() else {
            warn!("Webhook event without an object id");
            return Ok(());
        };

        let reference = PaymentReference::stripe_stored(intent_id);
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::lock_by_payment_reference(&mut tx, &reference).await? else {
            debug!(%reference, "No order for webhook intent");
            return Ok(());
        };
        if order.payment_status != PaymentStatus::Pending {
            debug!(order_id = %order.id, "Order payment already settled");
            return Ok(());
        }

        if succeeded {
            let status = if order.order_status == OrderStatus::Pending {
                OrderStatus::Paid
            } else {
                order.order_status
            };
            orders::set_status(&mut tx, order.id, status, PaymentStatus::Paid, None).await?;
            notify_status(&mut tx, &order, status).await?;
            info!(order_id = %order.id, "Pending payment confirmed");
        } else if !order.order_status.is_terminal() {
            if order.order_status.restocks_on_reversal() {
                orders::restore_stock(&mut tx, order.id).await?;
            }
            orders::set_status(
                &mut tx,
                order.id,
                OrderStatus::Cancelled,
                PaymentStatus::Failed,
                None,
            )
            .await?;
            notifications::notify(
                &mut *tx,
                order.user_id,
                "Payment failed",
                &format!(
                    "The payment for order #{} failed and the order was cancelled.",
                    order.id
                ),
            )
            .await?;
            warn!(order_id = %order.id, "Pending payment failed, order cancelled");
        }

        tx.commit().await?;
        Ok(())
    }

    /// Cancel or refund inside the caller's transaction.
    async fn reverse(
        &self,
        conn: &mut PgConnection,
        order: &Order,
        target: OrderStatus,
    ) -> Result<Order, AppError> {
        let payment_status = match (order.payment_status, order.payment_reference.as_deref()) {
            (PaymentStatus::Paid, Some(reference)) => {
                self.payments.refund(reference).await?;
                info!(order_id = %order.id, "Payment refunded");
                PaymentStatus::Refunded
            }
            (status, _) => status,
        };

        if order.order_status.restocks_on_reversal() {
            orders::restore_stock(conn, order.id).await?;
        }
        let updated = orders::set_status(conn, order.id, target, payment_status, None).await?;
        notify_status(conn, order, target).await?;
        Ok(updated)
    }

    async fn detail(&self, order_id: OrderId) -> Result<OrderDetail, AppError> {
        OrderRepository::new(self.pool)
            .get_detail(order_id)
            .await?
            .ok_or_else(|| order_not_found(order_id))
    }

    fn totals_for(&self, lines: &[CartLine], rule: &TierRule) -> OrderTotals {
        let subtotal: Decimal = lines.iter().map(CartLine::subtotal).sum();
        let shipping = shipping_cost(rule, subtotal, self.commerce.flat_shipping);
        OrderTotals::compute(subtotal, self.commerce.tax_rate, shipping, Decimal::ZERO)
    }

    async fn refund_after_failure(&self, stored_reference: &str) {
        match self.payments.refund(stored_reference).await {
            Ok(()) => warn!(reference = stored_reference, "Order write failed, charge refunded"),
            Err(e) => error!(
                error = %e,
                reference = stored_reference,
                "Order write failed and the refund did not go through"
            ),
        }
    }
}

async fn record_checkout(
    conn: &mut PgConnection,
    cart_id: CartId,
    new_order: &NewOrder<'_>,
    lines: &[CartLine],
) -> Result<Order, AppError> {
    let order = orders::insert(conn, new_order).await?;
    for line in lines {
        orders::insert_item(conn, order.id, line.product_id, line.quantity, line.unit_price).await?;
        orders::decrement_stock(conn, line.product_id, line.quantity).await?;
    }
    carts::clear(&mut *conn, cart_id).await?;
    notifications::notify(
        &mut *conn,
        order.user_id,
        "Order placed",
        &format!("Your order #{} for ${} was received.", order.id, order.total_amount),
    )
    .await?;
    Ok(order)
}

async fn notify_status(
    conn: &mut PgConnection,
    order: &Order,
    status: OrderStatus,
) -> Result<(), AppError> {
    notifications::notify(
        conn,
        order.user_id,
        "Order update",
        &format!("Your order #{} is now {status}.", order.id),
    )
    .await?;
    Ok(())
}

/// Flat shipping unless the member's tier waives it for this subtotal.
#[must_use]
pub fn shipping_cost(rule: &TierRule, subtotal: Decimal, flat: Decimal) -> Decimal {
    if rule.free_shipping().applies_to(subtotal) {
        Decimal::ZERO
    } else {
        flat
    }
}

/// A locked cart line must still be sellable in the requested quantity.
fn check_line(line: &CartLine) -> Result<(), AppError> {
    if !line.is_active {
        return Err(AppError::BadRequest(format!(
            "Product {} is not available",
            line.product_name
        )));
    }
    if line.stock < line.quantity {
        return Err(AppError::BadRequest(format!(
            "Insufficient stock for {}. Available: {}, requested: {}",
            line.product_name, line.stock, line.quantity
        )));
    }
    Ok(())
}

fn empty_cart() -> AppError {
    AppError::BadRequest("Cart is empty".to_string())
}

fn order_not_found(order_id: OrderId) -> AppError {
    AppError::NotFound(format!("Order with ID {order_id} not found"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use befit_core::ProductId;
    use befit_core::loyalty::default_tiers;
    use chrono::Utc;

    use super::*;

    fn line(quantity: i32, stock: i32, is_active: bool) -> CartLine {
        CartLine {
            product_id: ProductId::new(3),
            product_name: "Whey Protein".to_string(),
            unit_price: Decimal::new(89_900, 2),
            quantity,
            stock,
            is_active,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_shipping_waived_by_tier_threshold() {
        let tiers = default_tiers();
        let flat = Decimal::new(9_900, 2);
        let bronze = tiers.first().unwrap();
        let gold = tiers.last().unwrap();

        assert_eq!(shipping_cost(bronze, Decimal::new(1000, 0), flat), flat);
        assert_eq!(shipping_cost(bronze, Decimal::new(1001, 0), flat), Decimal::ZERO);
        assert_eq!(shipping_cost(gold, Decimal::ONE, flat), Decimal::ZERO);
    }

    #[test]
    fn test_locked_line_checks() {
        assert!(check_line(&line(2, 2, true)).is_ok());

        let err = check_line(&line(3, 2, true)).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("Insufficient stock for Whey Protein"));

        let err = check_line(&line(1, 5, false)).unwrap_err();
        assert_eq!(err.to_string(), "Product Whey Protein is not available");
    }

    #[test]
    fn test_empty_cart_is_bad_request() {
        assert_eq!(empty_cart().status(), StatusCode::BAD_REQUEST);
        assert_eq!(order_not_found(OrderId::new(5)).status(), StatusCode::NOT_FOUND);
    }
}

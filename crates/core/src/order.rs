//! Order state machine and totals.
//!
//! ```text
//! pending ──► paid ──► processing ──► shipped ──► delivered
//!    │          │           │                         │
//!    └─► cancelled ◄────────┤                         ▼
//!               └─► refunded ◄────────────────── refunded
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::OrderStatus;

impl OrderStatus {
    /// Whether an order in this status may move to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use OrderStatus::{Cancelled, Delivered, Paid, Pending, Processing, Refunded, Shipped};

        matches!(
            (self, next),
            (Pending, Paid | Cancelled)
                | (Paid, Processing | Cancelled | Refunded)
                | (Processing, Shipped | Cancelled | Refunded)
                | (Shipped, Delivered)
                | (Delivered, Refunded)
        )
    }

    /// Customers may cancel their own orders until fulfilment starts.
    #[must_use]
    pub const fn is_cancellable_by_customer(self) -> bool {
        matches!(self, Self::Pending | Self::Paid)
    }

    /// Only delivered orders count towards sales analytics and loyalty.
    #[must_use]
    pub const fn counts_as_sale(self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// No further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// Whether leaving this status for `cancelled` or `refunded` returns stock.
    ///
    /// Goods that already reached the customer are not restocked.
    #[must_use]
    pub const fn restocks_on_reversal(self) -> bool {
        matches!(self, Self::Pending | Self::Paid | Self::Processing)
    }
}

/// Monetary breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping_cost: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
}

impl OrderTotals {
    /// Compute totals from the line subtotal.
    ///
    /// Tax is charged on the subtotal only and rounded half-up to cents. The
    /// discount can never push the total below zero.
    #[must_use]
    pub fn compute(
        subtotal: Decimal,
        tax_rate: Decimal,
        shipping_cost: Decimal,
        discount: Decimal,
    ) -> Self {
        let tax = round_money(subtotal * tax_rate);
        let total_amount = (subtotal + tax + shipping_cost - discount).max(Decimal::ZERO);

        Self {
            subtotal,
            tax,
            shipping_cost,
            discount,
            total_amount: round_money(total_amount),
        }
    }
}

/// Round an amount to two decimal places, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap_or_default()
    }

    #[test]
    fn test_forward_path() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for next in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Delivered,
            OrderStatus::Refunded,
        ] {
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
            assert!(!OrderStatus::Refunded.can_transition_to(next));
        }
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_customer_cancellation_window() {
        assert!(OrderStatus::Pending.is_cancellable_by_customer());
        assert!(OrderStatus::Paid.is_cancellable_by_customer());
        assert!(!OrderStatus::Processing.is_cancellable_by_customer());
        assert!(!OrderStatus::Delivered.is_cancellable_by_customer());
    }

    #[test]
    fn test_only_delivered_counts_as_sale() {
        assert!(OrderStatus::Delivered.counts_as_sale());
        assert!(!OrderStatus::Paid.counts_as_sale());
        assert!(!OrderStatus::Shipped.counts_as_sale());
    }

    #[test]
    fn test_totals_with_tax_and_shipping() {
        let totals = OrderTotals::compute(dec("1250.00"), dec("0.16"), dec("99.00"), dec("0"));
        assert_eq!(totals.tax, dec("200.00"));
        assert_eq!(totals.total_amount, dec("1549.00"));
    }

    #[test]
    fn test_tax_rounds_to_cents() {
        let totals = OrderTotals::compute(dec("10.05"), dec("0.16"), dec("0"), dec("0"));
        // 10.05 * 0.16 = 1.608
        assert_eq!(totals.tax, dec("1.61"));
        assert_eq!(totals.total_amount, dec("11.66"));
    }

    #[test]
    fn test_discount_never_makes_total_negative() {
        let totals = OrderTotals::compute(dec("10"), dec("0"), dec("0"), dec("50"));
        assert_eq!(totals.total_amount, Decimal::ZERO);
    }
}

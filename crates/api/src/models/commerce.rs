//! Carts, orders, and reviews.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use befit_core::{
    AddressId, CartId, OrderId, OrderItemId, OrderStatus, PaymentMethodId, PaymentStatus,
    ProductId, ReviewId, SubscriptionId, UserId,
};

/// One cart line joined with the current product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    /// Stock at read time, for client-side warnings.
    pub stock: i32,
    pub is_active: bool,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A user's cart with computed totals.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub cart_id: Option<CartId>,
    pub items: Vec<CartLineView>,
    pub subtotal: Decimal,
    pub item_count: i32,
}

/// Serialized cart line.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
    pub in_stock: bool,
}

impl Cart {
    /// Build the cart view from its lines.
    #[must_use]
    pub fn from_lines(cart_id: Option<CartId>, lines: Vec<CartLine>) -> Self {
        let subtotal = lines.iter().map(CartLine::subtotal).sum();
        let item_count = lines.iter().map(|line| line.quantity).sum();
        let items = lines
            .into_iter()
            .map(|line| CartLineView {
                subtotal: line.subtotal(),
                in_stock: line.is_active && line.stock >= line.quantity,
                product_id: line.product_id,
                product_name: line.product_name,
                unit_price: line.unit_price,
                quantity: line.quantity,
            })
            .collect();

        Self {
            cart_id,
            items,
            subtotal,
            item_count,
        }
    }
}

/// A placed order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_status: OrderStatus,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping_cost: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
    pub shipping_address: Option<String>,
    pub tracking_number: Option<String>,
    pub payment_method_id: Option<PaymentMethodId>,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing)]
    pub payment_reference: Option<String>,
    pub subscription_id: Option<SubscriptionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// A line of a placed order with the price paid.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// An order with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CheckoutRequest {
    pub address_id: AddressId,
    pub payment_method_id: PaymentMethodId,
}

/// Body of `PATCH /admin/orders/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
}

/// A product review with the reviewer's display name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub rating: i32,
    pub review_text: Option<String>,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /products/{id}/reviews`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub order_id: OrderId,
    pub rating: i32,
    pub review_text: Option<String>,
}

/// Body of `PUT /reviews/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewUpdate {
    pub rating: Option<i32>,
    pub review_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: i32, price: i64, quantity: i32, stock: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(product),
            product_name: format!("Product {product}"),
            unit_price: Decimal::new(price, 2),
            quantity,
            stock,
            is_active: true,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart::from_lines(
            Some(CartId::new(1)),
            vec![line(1, 49_950, 2, 10), line(2, 19_900, 1, 0)],
        );
        assert_eq!(cart.subtotal, Decimal::new(119_800, 2));
        assert_eq!(cart.item_count, 3);
        assert!(cart.items.iter().any(|item| !item.in_stock));
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::from_lines(None, Vec::new());
        assert_eq!(cart.subtotal, Decimal::ZERO);
        assert_eq!(cart.item_count, 0);
        assert!(cart.items.is_empty());
    }
}

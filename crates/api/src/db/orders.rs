//! Order repository.
//!
//! Reads go through [`OrderRepository`]. Writes that must happen together with
//! stock and cart changes are free functions over a connection.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use befit_core::order::OrderTotals;
use befit_core::{
    OrderId, OrderStatus, PaymentMethodId, PaymentStatus, ProductId, SubscriptionId, UserId,
};

use super::RepositoryError;
use crate::models::{Order, OrderDetail, OrderItem};

const ORDER_COLUMNS: &str = "id, user_id, order_status, subtotal, tax, shipping_cost, discount, \
     total_amount, shipping_address, tracking_number, payment_method_id, payment_status, \
     payment_reference, subscription_id, created_at, updated_at, delivered_at, cancelled_at";

const ITEM_QUERY: &str = r"
    SELECT oi.id, oi.order_id, oi.product_id, p.name AS product_name, oi.quantity,
           oi.unit_price, oi.subtotal
    FROM befit.order_items oi
    JOIN befit.products p ON p.id = oi.product_id
    WHERE oi.order_id = $1
    ORDER BY oi.id
";

/// Repository for order reads.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM befit.orders WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Orders billed to any of the user's subscriptions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_subscription_orders(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM befit.orders \
             WHERE user_id = $1 AND subscription_id IS NOT NULL \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// One of the user's orders with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_detail_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<OrderDetail>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM befit.orders WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        let Some(order) = order else {
            return Ok(None);
        };
        let items = self.items(order.id).await?;
        Ok(Some(OrderDetail { order, items }))
    }

    /// Any order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_detail(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM befit.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(order) = order else {
            return Ok(None);
        };
        let items = self.items(order.id).await?;
        Ok(Some(OrderDetail { order, items }))
    }

    /// Lines of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItem>(ITEM_QUERY)
            .bind(id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Page through all orders, optionally by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM befit.orders
            WHERE ($1::befit.order_status IS NULL OR order_status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM befit.orders \
             WHERE ($1::befit.order_status IS NULL OR order_status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Whether the user has a delivered order containing the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delivered_order_contains(
        &self,
        user_id: UserId,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let found = sqlx::query_scalar(
            r"
            SELECT EXISTS(
                SELECT 1 FROM befit.orders o
                JOIN befit.order_items oi ON oi.order_id = o.id
                WHERE o.id = $1 AND o.user_id = $2 AND oi.product_id = $3
                  AND o.order_status = 'delivered'
            )
            ",
        )
        .bind(order_id)
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        Ok(found)
    }
}

/// Fields of a new order row.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub user_id: UserId,
    pub order_status: OrderStatus,
    pub totals: OrderTotals,
    pub shipping_address: Option<&'a str>,
    pub payment_method_id: Option<PaymentMethodId>,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<&'a str>,
    pub subscription_id: Option<SubscriptionId>,
}

/// Insert an order row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert(conn: &mut PgConnection, order: &NewOrder<'_>) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, Order>(&format!(
        r"
        INSERT INTO befit.orders (
            user_id, order_status, subtotal, tax, shipping_cost, discount, total_amount,
            shipping_address, payment_method_id, payment_status, payment_reference, subscription_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(order.user_id)
    .bind(order.order_status)
    .bind(order.totals.subtotal)
    .bind(order.totals.tax)
    .bind(order.totals.shipping_cost)
    .bind(order.totals.discount)
    .bind(order.totals.total_amount)
    .bind(order.shipping_address)
    .bind(order.payment_method_id)
    .bind(order.payment_status)
    .bind(order.payment_reference)
    .bind(order.subscription_id)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

/// Insert an order line with its price snapshot.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    product_id: ProductId,
    quantity: i32,
    unit_price: Decimal,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO befit.order_items (order_id, product_id, quantity, unit_price, subtotal)
        VALUES ($1, $2, $3, $4, $4 * $3)
        ",
    )
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .bind(unit_price)
    .execute(conn)
    .await?;
    Ok(())
}

/// Lock an order row for a status change.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM befit.orders WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Lock the order paid through a gateway reference.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_payment_reference(
    conn: &mut PgConnection,
    reference: &str,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM befit.orders WHERE payment_reference = $1 FOR UPDATE"
    ))
    .bind(reference)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Write a new status, stamping `delivered_at` / `cancelled_at` when relevant.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
    payment_status: PaymentStatus,
    tracking_number: Option<&str>,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, Order>(&format!(
        r"
        UPDATE befit.orders SET
            order_status = $2,
            payment_status = $3,
            tracking_number = COALESCE($4, tracking_number),
            delivered_at = CASE WHEN $2 = 'delivered' THEN NOW() ELSE delivered_at END,
            cancelled_at = CASE WHEN $2 IN ('cancelled', 'refunded') THEN NOW() ELSE cancelled_at END
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(status)
    .bind(payment_status)
    .bind(tracking_number)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

/// Take stock for a line. Fails when stock is short.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the product lacks stock.
/// Returns `RepositoryError::Database` if the update fails.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE befit.products SET stock = stock - $2 WHERE id = $1 AND stock >= $2",
    )
    .bind(product_id)
    .bind(quantity)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(format!(
            "Insufficient stock for product {product_id}"
        )));
    }
    Ok(())
}

/// Return an order's quantities to stock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn restore_stock(conn: &mut PgConnection, id: OrderId) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE befit.products p SET stock = p.stock + totals.quantity
        FROM (
            SELECT product_id, SUM(quantity)::INTEGER AS quantity
            FROM befit.order_items WHERE order_id = $1 GROUP BY product_id
        ) totals
        WHERE p.id = totals.product_id
        ",
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

//! Shopping cart repository.
//!
//! One cart per user, created on first add. Lines are unique per product.

use sqlx::{PgConnection, PgPool};

use befit_core::{CartId, ProductId, UserId};

use super::RepositoryError;
use crate::models::CartLine;

const LINE_SELECT: &str = r"
    SELECT ci.product_id, p.name AS product_name, p.price AS unit_price, ci.quantity,
           p.stock, p.is_active, ci.added_at
    FROM befit.cart_items ci
    JOIN befit.products p ON p.id = ci.product_id
    WHERE ci.cart_id = $1
";

/// Product rows are locked in product order, whatever the cart's order.
fn locked_lines_sql() -> String {
    format!("{LINE_SELECT} ORDER BY ci.product_id FOR UPDATE OF p, ci")
}

/// Repository for cart reads.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart ID, if they have one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_cart(&self, user_id: UserId) -> Result<Option<CartId>, RepositoryError> {
        let id = sqlx::query_scalar("SELECT id FROM befit.shopping_carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(id)
    }

    /// Lines of a cart joined with current product data.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let sql = format!("{LINE_SELECT} ORDER BY ci.added_at, ci.id");
        let rows = sqlx::query_as::<_, CartLine>(&sql)
            .bind(cart_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }
}

/// Find the user's cart or create it.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the upsert fails.
pub async fn get_or_create(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<CartId, RepositoryError> {
    // The no-op update makes RETURNING yield the existing row on conflict
    let id = sqlx::query_scalar(
        r"
        INSERT INTO befit.shopping_carts (user_id) VALUES ($1)
        ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING id
        ",
    )
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Lines of a cart, locked for checkout.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lines_for_update(
    conn: &mut PgConnection,
    cart_id: CartId,
) -> Result<Vec<CartLine>, RepositoryError> {
    let rows = sqlx::query_as::<_, CartLine>(&locked_lines_sql())
        .bind(cart_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// Quantity of a product already in the cart (0 when absent).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn line_quantity(
    conn: &mut PgConnection,
    cart_id: CartId,
    product_id: ProductId,
) -> Result<i32, RepositoryError> {
    let quantity: Option<i32> = sqlx::query_scalar(
        "SELECT quantity FROM befit.cart_items WHERE cart_id = $1 AND product_id = $2 FOR UPDATE",
    )
    .bind(cart_id)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    Ok(quantity.unwrap_or(0))
}

/// Set a line's quantity, creating the line if needed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the upsert fails.
pub async fn set_line(
    conn: &mut PgConnection,
    cart_id: CartId,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO befit.cart_items (cart_id, product_id, quantity) VALUES ($1, $2, $3)
        ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
        ",
    )
    .bind(cart_id)
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    sqlx::query("UPDATE befit.shopping_carts SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Remove a line. Returns whether it existed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn remove_line<'e, E>(
    executor: E,
    cart_id: CartId,
    product_id: ProductId,
) -> Result<bool, RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM befit.cart_items WHERE cart_id = $1 AND product_id = $2")
        .bind(cart_id)
        .bind(product_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove every line of a cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn clear<'e, E>(executor: E, cart_id: CartId) -> Result<(), RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query("DELETE FROM befit.cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(executor)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_locks_lines_in_product_order() {
        let sql = locked_lines_sql();
        let order_by = sql.find("ORDER BY ci.product_id").unwrap_or(usize::MAX);
        let lock = sql.find("FOR UPDATE").unwrap_or(0);
        assert!(order_by < lock);
        assert!(!sql.contains("added_at,"));
    }
}

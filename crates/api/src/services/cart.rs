//! Shopping cart operations.
//!
//! Stock is checked against the total quantity the cart would hold after the
//! change. Checkout checks again under row locks.

use sqlx::PgPool;
use tracing::{debug, instrument};

use befit_core::{ProductId, UserId};

use crate::db::{CartRepository, ProductRepository, RepositoryError, carts};
use crate::error::AppError;
use crate::models::{Cart, Product};
use crate::validation::validate_quantity;

/// Cart service.
pub struct CartService<'a> {
    pool: &'a PgPool,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart. Users without one get an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: UserId) -> Result<Cart, AppError> {
        let repo = CartRepository::new(self.pool);
        let Some(cart_id) = repo.find_cart(user_id).await? else {
            return Ok(Cart::from_lines(None, Vec::new()));
        };
        let lines = repo.lines(cart_id).await?;
        Ok(Cart::from_lines(Some(cart_id), lines))
    }

    /// Add `quantity` units of a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown products, `AppError::BadRequest`
    /// for inactive products or short stock.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Cart, AppError> {
        validate_quantity(quantity)?;
        let product = self.sellable_product(product_id).await?;

        let mut tx = self.pool.begin().await?;
        let cart_id = carts::get_or_create(&mut tx, user_id).await?;
        let existing = carts::line_quantity(&mut tx, cart_id, product_id).await?;
        let total = existing.saturating_add(quantity);
        check_stock(&product, total)?;
        carts::set_line(&mut tx, cart_id, product_id, total).await?;
        tx.commit().await?;

        debug!(%product_id, quantity = total, "Cart line added");
        self.get(user_id).await
    }

    /// Replace the quantity of a line already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product is not in the cart,
    /// `AppError::BadRequest` for short stock.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Cart, AppError> {
        validate_quantity(quantity)?;
        let product = self.sellable_product(product_id).await?;

        let mut tx = self.pool.begin().await?;
        let cart_id = carts::get_or_create(&mut tx, user_id).await?;
        if carts::line_quantity(&mut tx, cart_id, product_id).await? == 0 {
            return Err(not_in_cart());
        }
        check_stock(&product, quantity)?;
        carts::set_line(&mut tx, cart_id, product_id, quantity).await?;
        tx.commit().await?;

        self.get(user_id).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product is not in the cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Cart, AppError> {
        let repo = CartRepository::new(self.pool);
        let cart_id = repo.find_cart(user_id).await?.ok_or_else(not_in_cart)?;
        if !carts::remove_line(self.pool, cart_id, product_id).await? {
            return Err(not_in_cart());
        }
        self.get(user_id).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<(), AppError> {
        if let Some(cart_id) = CartRepository::new(self.pool).find_cart(user_id).await? {
            carts::clear(self.pool, cart_id).await?;
        }
        Ok(())
    }

    async fn sellable_product(&self, product_id: ProductId) -> Result<Product, AppError> {
        let product = ProductRepository::new(self.pool)
            .get(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product with ID {product_id} not found")))?;
        if !product.is_active {
            return Err(AppError::BadRequest(format!(
                "Product {} is not available",
                product.name
            )));
        }
        Ok(product)
    }
}

fn not_in_cart() -> AppError {
    AppError::Database(RepositoryError::NotFound)
}

/// Reject a cart line larger than the product's stock.
///
/// # Errors
///
/// Returns `AppError::BadRequest` naming the available quantity.
pub fn check_stock(product: &Product, requested: i32) -> Result<(), AppError> {
    if product.stock < requested {
        return Err(AppError::BadRequest(format!(
            "Insufficient stock for {}. Available: {}, requested: {requested}",
            product.name, product.stock
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use befit_core::CategoryId;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;

    fn product(stock: i32) -> Product {
        Product {
            id: ProductId::new(4),
            category_id: Some(CategoryId::new(1)),
            name: "Creatine Monohydrate".to_string(),
            description: None,
            brand: None,
            physical_activities: Vec::new(),
            fitness_objectives: Vec::new(),
            nutritional_value: None,
            price: Decimal::new(39_900, 2),
            stock,
            sku: None,
            is_active: true,
            average_rating: Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_stock_allows_exact_quantity() {
        assert!(check_stock(&product(3), 3).is_ok());
    }

    #[test]
    fn test_stock_shortage_is_bad_request() {
        let err = check_stock(&product(2), 3).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Creatine Monohydrate. Available: 2, requested: 3"
        );
    }
}

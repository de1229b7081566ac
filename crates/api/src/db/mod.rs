//! Database operations for the BeFit `PostgreSQL` schema.
//!
//! # Schema: `befit`
//!
//! ## Tables
//!
//! - `users` - Local accounts linked to the identity provider by `cognito_sub`
//! - `fitness_profiles` - One per user, drives plan recommendation
//! - `addresses`, `payment_methods` - Owned by a user, at most one default each
//! - `notifications` - In-app messages
//! - `categories`, `products`, `product_images` - The catalog
//! - `shopping_carts`, `cart_items` - One cart per user
//! - `orders`, `order_items` - Placed orders with price snapshots
//! - `reviews` - One per user per product, tied to a delivered order
//! - `subscription_plans`, `subscriptions` - Recurring deliveries
//! - `loyalty_tiers`, `user_loyalty`, `point_history` - The loyalty program
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p befit-cli -- migrate
//! ```
//!
//! Repositories take the pool for single statements. Operations spanning
//! several tables take a `&mut PgConnection` so the caller can run them inside
//! one transaction.

pub mod addresses;
pub mod analytics;
pub mod carts;
pub mod catalog;
pub mod fitness_profiles;
pub mod loyalty;
pub mod notifications;
pub mod orders;
pub mod payment_methods;
pub mod reviews;
pub mod subscriptions;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use analytics::AnalyticsRepository;
pub use carts::CartRepository;
pub use catalog::{CategoryRepository, ProductRepository};
pub use fitness_profiles::FitnessProfileRepository;
pub use loyalty::LoyaltyRepository;
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use payment_methods::PaymentMethodRepository;
pub use reviews::ReviewRepository;
pub use subscriptions::SubscriptionRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique violations to `Conflict` with the given message.
    pub(crate) fn unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_string());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_passes_other_errors_through() {
        let err = RepositoryError::unique(sqlx::Error::RowNotFound, "email taken");
        assert!(matches!(err, RepositoryError::Database(sqlx::Error::RowNotFound)));
    }
}

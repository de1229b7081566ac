//! Admin route handlers, mounted under `/api/v1/admin`.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin).
//!
//! # Route Structure
//!
//! ```text
//! # Catalog
//! POST   /products                       - Create a product
//! PUT    /products/{id}                  - Update a product
//! DELETE /products/{id}                  - Delete a product and its images
//! POST   /products/bulk-action           - Activate, deactivate or delete many
//! POST   /products/{id}/images           - Upload an image (multipart)
//! DELETE /products/{id}/images/{image_id} - Remove an image
//! POST   /categories                     - Create a category
//! PUT    /categories/{id}                - Rename a category
//! DELETE /categories/{id}                - Delete a category
//!
//! # Orders and users
//! GET    /orders                         - All orders, by status
//! PATCH  /orders/{id}/status             - Move an order along its lifecycle
//! GET    /users                          - All users
//! PATCH  /users/{id}/status              - Activate or deactivate
//! PATCH  /users/{id}/role                - Grant or revoke admin
//!
//! # Jobs
//! POST   /loyalty/expire-all             - Expire overdue points
//! POST   /subscriptions/renew            - Charge due subscriptions
//!
//! # Analytics
//! GET    /analytics/dashboard
//! GET    /analytics/sales-report
//! GET    /analytics/products-report
//! GET    /analytics/low-stock
//! GET    /analytics/export/sales.csv
//! GET    /analytics/export/products.csv
//! ```

use axum::Router;

use crate::state::AppState;

pub mod analytics;
pub mod categories;
pub mod jobs;
pub mod orders;
pub mod products;
pub mod users;

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(products::router())
        .merge(categories::router())
        .merge(orders::router())
        .merge(users::router())
        .merge(jobs::router())
        .merge(analytics::router())
}

//! Business operations that span several repositories or external services.
//!
//! Handlers stay thin: they extract, validate, and call into a service. Each
//! service borrows what it needs from `AppState` for the duration of a request.

pub mod analytics;
pub mod cart;
pub mod loyalty;
pub mod orders;
pub mod reports;
pub mod subscriptions;

pub use analytics::{AnalyticsService, Period};
pub use cart::CartService;
pub use loyalty::LoyaltyService;
pub use orders::OrderService;
pub use subscriptions::SubscriptionService;

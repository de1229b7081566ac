//! Domain models for the BeFit API.
//!
//! These are the validated shapes handlers work with and serialize to clients.
//! Database row types stay private to the repositories in [`crate::db`].

pub mod account;
pub mod analytics;
pub mod catalog;
pub mod commerce;
pub mod loyalty;
pub mod subscription;
pub mod user;

pub use account::{
    Address, AddressInput, FitnessProfile, FitnessProfileInput, Notification, PaymentMethod,
    PaymentMethodInput,
};
pub use analytics::{
    CategorySales, DashboardStats, LowStockProduct, MonthlySales, ProductReportRow, ProductStats,
    SalesReport, SalesReportDay, SalesReportSummary, SalesStats, SubscriberGrowth,
    SubscriptionStats, TodaySummary, TopProduct, UserStats,
};
pub use catalog::{
    Category, CategoryInput, Product, ProductDetail, ProductImage, ProductInput, ProductSearch,
    ProductUpdate, SearchFilters,
};
pub use commerce::{
    Cart, CartLine, CartLineView, CheckoutRequest, Order, OrderDetail, OrderItem,
    OrderStatusUpdate, Review, ReviewInput, ReviewUpdate,
};
pub use loyalty::{
    BatchExpireReport, ExpireOutcome, LoyaltyStatus, LoyaltyTier, PointHistoryEntry, TierBenefits,
    UserLoyalty,
};
pub use subscription::{
    PaymentMethodChange, RenewalReport, Subscription, SubscriptionCreate, SubscriptionHistory,
    SubscriptionPlan, SubscriptionSummary,
};
pub use user::{NewUser, User, UserUpdate};

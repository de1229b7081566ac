//! Admin dashboard and report shapes.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use befit_core::ProductId;

/// Units and revenue of one product over delivered orders.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductStats {
    pub product_id: ProductId,
    pub name: String,
    pub total_sold: i64,
    pub total_revenue: Decimal,
    pub average_rating: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesStats {
    pub total_sales: Decimal,
    pub total_orders: i64,
    pub total_products_sold: i64,
    pub average_order_value: Decimal,
    pub top_selling_products: Vec<ProductStats>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserStats {
    pub total_users: i64,
    pub active_users: i64,
    pub new_users_this_month: i64,
    pub users_with_orders: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SubscriptionStats {
    pub total_subscriptions: i64,
    pub active_subscriptions: i64,
    pub paused_subscriptions: i64,
    pub cancelled_subscriptions: i64,
    pub new_subscriptions_this_month: i64,
    /// Sum of the monthly price of active subscriptions.
    pub subscription_revenue: Decimal,
}

/// Best seller of the last 30 days.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: ProductId,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub total_sold: i64,
    pub total_revenue: Decimal,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TodaySummary {
    pub total_sales: Decimal,
    pub total_orders: i64,
    pub total_products_sold: i64,
    pub new_subscriptions: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlySales {
    /// "October 2026".
    pub month: String,
    pub sales: Decimal,
    pub orders: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySales {
    pub category: String,
    pub total_sales: Decimal,
    pub total_products_sold: i64,
    /// Share of delivered revenue, two decimals.
    pub percentage: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriberGrowth {
    pub month: String,
    pub new_subscribers: i64,
    pub total_active: i64,
}

/// Everything on the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub sales: SalesStats,
    pub users: UserStats,
    pub subscriptions: SubscriptionStats,
    pub total_products: i64,
    pub low_stock_products: i64,
    pub top_product: Option<TopProduct>,
    pub today_summary: TodaySummary,
    pub monthly_sales: Vec<MonthlySales>,
    pub category_sales: Vec<CategorySales>,
    pub subscriber_growth: Vec<SubscriberGrowth>,
}

/// One day of delivered sales.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SalesReportDay {
    pub date: NaiveDate,
    pub total_sales: Decimal,
    pub total_orders: i64,
    pub average_order_value: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesReportSummary {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_sales: Decimal,
    pub total_orders: i64,
    pub average_order_value: Decimal,
    pub days_in_period: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesReport {
    pub summary: SalesReportSummary,
    pub details: Vec<SalesReportDay>,
}

/// A product line of the products report.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductReportRow {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub total_sold: i64,
    pub revenue: Decimal,
    pub current_stock: i32,
    pub average_rating: Decimal,
}

/// A product at or below the low stock threshold.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LowStockProduct {
    pub product_id: ProductId,
    pub name: String,
    pub sku: Option<String>,
    pub stock: i32,
    pub is_active: bool,
}

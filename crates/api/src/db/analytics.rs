//! Read-only aggregates for the admin dashboard and reports.
//!
//! Sales figures count delivered orders only, bucketed by `orders.created_at`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::{
    LowStockProduct, ProductReportRow, ProductStats, SalesReportDay, SubscriptionStats,
    TodaySummary, TopProduct, UserStats,
};

/// Delivered revenue totals.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct SalesTotals {
    pub total_sales: Decimal,
    pub total_orders: i64,
    pub total_products_sold: i64,
    pub average_order_value: Decimal,
}

/// Delivered sales of one calendar month.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonthBucket {
    pub month: NaiveDate,
    pub sales: Decimal,
    pub orders: i64,
}

/// New and still-active subscriptions at the end of one calendar month.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GrowthBucket {
    pub month: NaiveDate,
    pub new_subscribers: i64,
    pub total_active: i64,
}

/// Delivered revenue of one category.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryBucket {
    pub category: String,
    pub total_sales: Decimal,
    pub total_products_sold: i64,
}

/// Repository for analytics queries.
pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    /// Create a new analytics repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Lifetime delivered revenue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_totals(&self) -> Result<SalesTotals, RepositoryError> {
        let row = sqlx::query_as::<_, SalesTotals>(
            r"
            WITH delivered AS (
                SELECT id, total_amount FROM befit.orders WHERE order_status = 'delivered'
            )
            SELECT
                COALESCE(SUM(d.total_amount), 0) AS total_sales,
                COUNT(*) AS total_orders,
                COALESCE((
                    SELECT SUM(oi.quantity) FROM befit.order_items oi
                    JOIN delivered d2 ON d2.id = oi.order_id
                ), 0)::BIGINT AS total_products_sold,
                COALESCE(ROUND(SUM(d.total_amount) / NULLIF(COUNT(*), 0), 2), 0)
                    AS average_order_value
            FROM delivered d
            ",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Best sellers by delivered units.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_selling(&self, limit: i64) -> Result<Vec<ProductStats>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductStats>(
            r"
            SELECT p.id AS product_id, p.name,
                   SUM(oi.quantity)::BIGINT AS total_sold,
                   SUM(oi.subtotal) AS total_revenue,
                   p.average_rating
            FROM befit.order_items oi
            JOIN befit.orders o ON o.id = oi.order_id
            JOIN befit.products p ON p.id = oi.product_id
            WHERE o.order_status = 'delivered'
            GROUP BY p.id
            ORDER BY total_sold DESC, p.id
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// User counts. `month_start` bounds "new this month".
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn user_stats(&self, month_start: NaiveDate) -> Result<UserStats, RepositoryError> {
        let row = sqlx::query_as::<_, UserStats>(
            r"
            SELECT
                COUNT(*) AS total_users,
                COUNT(*) FILTER (WHERE account_status) AS active_users,
                COUNT(*) FILTER (WHERE created_at::date >= $1) AS new_users_this_month,
                (SELECT COUNT(DISTINCT user_id) FROM befit.orders) AS users_with_orders
            FROM befit.users
            ",
        )
        .bind(month_start)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Subscription counts by status and monthly revenue of active ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn subscription_stats(
        &self,
        month_start: NaiveDate,
    ) -> Result<SubscriptionStats, RepositoryError> {
        let row = sqlx::query_as::<_, SubscriptionStats>(
            r"
            SELECT
                COUNT(*) AS total_subscriptions,
                COUNT(*) FILTER (WHERE subscription_status = 'active') AS active_subscriptions,
                COUNT(*) FILTER (WHERE subscription_status = 'paused') AS paused_subscriptions,
                COUNT(*) FILTER (WHERE subscription_status = 'cancelled')
                    AS cancelled_subscriptions,
                COUNT(*) FILTER (WHERE start_date >= $1) AS new_subscriptions_this_month,
                COALESCE(SUM(price) FILTER (WHERE subscription_status = 'active'), 0)
                    AS subscription_revenue
            FROM befit.subscriptions
            ",
        )
        .bind(month_start)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Total products and those with stock below `threshold`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_counts(&self, threshold: i32) -> Result<(i64, i64), RepositoryError> {
        let counts: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE stock < $1) FROM befit.products",
        )
        .bind(threshold)
        .fetch_one(self.pool)
        .await?;
        Ok(counts)
    }

    /// Best seller among delivered orders placed since `since`, with its primary image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_product_since(
        &self,
        since: NaiveDate,
    ) -> Result<Option<TopProduct>, RepositoryError> {
        let row = sqlx::query_as::<_, TopProduct>(
            r"
            SELECT p.id AS product_id, p.name, p.brand, c.name AS category,
                   SUM(oi.quantity)::BIGINT AS total_sold,
                   SUM(oi.subtotal) AS total_revenue,
                   (SELECT pi.image_path FROM befit.product_images pi
                    WHERE pi.product_id = p.id
                    ORDER BY pi.is_primary DESC, pi.display_order, pi.id
                    LIMIT 1) AS image_url
            FROM befit.order_items oi
            JOIN befit.orders o ON o.id = oi.order_id
            JOIN befit.products p ON p.id = oi.product_id
            LEFT JOIN befit.categories c ON c.id = p.category_id
            WHERE o.order_status = 'delivered' AND o.created_at::date >= $1
            GROUP BY p.id, c.name
            ORDER BY total_sold DESC, p.id
            LIMIT 1
            ",
        )
        .bind(since)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Orders of any status placed on `day`, and subscriptions started that day.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn day_summary(&self, day: NaiveDate) -> Result<TodaySummary, RepositoryError> {
        let row = sqlx::query_as::<_, TodaySummary>(
            r"
            SELECT
                COALESCE((SELECT SUM(total_amount) FROM befit.orders
                          WHERE created_at::date = $1), 0) AS total_sales,
                (SELECT COUNT(*) FROM befit.orders WHERE created_at::date = $1) AS total_orders,
                COALESCE((SELECT SUM(oi.quantity) FROM befit.order_items oi
                          JOIN befit.orders o ON o.id = oi.order_id
                          WHERE o.created_at::date = $1), 0)::BIGINT AS total_products_sold,
                (SELECT COUNT(*) FROM befit.subscriptions WHERE start_date = $1)
                    AS new_subscriptions
            ",
        )
        .bind(day)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Delivered sales per month from `first_month` through `last_month`, oldest first.
    ///
    /// Both bounds are first-of-month dates. Months without sales are included.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn monthly_sales(
        &self,
        first_month: NaiveDate,
        last_month: NaiveDate,
    ) -> Result<Vec<MonthBucket>, RepositoryError> {
        let rows = sqlx::query_as::<_, MonthBucket>(
            r"
            SELECT m.month::date AS month,
                   COALESCE(SUM(o.total_amount), 0) AS sales,
                   COUNT(o.id) AS orders
            FROM generate_series($1::timestamp, $2::timestamp, INTERVAL '1 month') AS m(month)
            LEFT JOIN befit.orders o
              ON o.order_status = 'delivered'
             AND date_trunc('month', o.created_at)::date = m.month::date
            GROUP BY m.month
            ORDER BY m.month
            ",
        )
        .bind(first_month)
        .bind(last_month)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Delivered revenue per category, largest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn category_sales(&self) -> Result<Vec<CategoryBucket>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryBucket>(
            r"
            SELECT COALESCE(c.name, 'Uncategorized') AS category,
                   SUM(oi.subtotal) AS total_sales,
                   SUM(oi.quantity)::BIGINT AS total_products_sold
            FROM befit.order_items oi
            JOIN befit.orders o ON o.id = oi.order_id
            JOIN befit.products p ON p.id = oi.product_id
            LEFT JOIN befit.categories c ON c.id = p.category_id
            WHERE o.order_status = 'delivered'
            GROUP BY COALESCE(c.name, 'Uncategorized')
            ORDER BY total_sales DESC, category
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Subscriptions started per month, and those live at each month's end.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn subscriber_growth(
        &self,
        first_month: NaiveDate,
        last_month: NaiveDate,
    ) -> Result<Vec<GrowthBucket>, RepositoryError> {
        let rows = sqlx::query_as::<_, GrowthBucket>(
            r"
            SELECT m.month::date AS month,
                   COUNT(s.id) FILTER (
                       WHERE date_trunc('month', s.start_date)::date = m.month::date
                   ) AS new_subscribers,
                   COUNT(s.id) FILTER (
                       WHERE s.start_date < (m.month + INTERVAL '1 month')::date
                         AND (s.end_date IS NULL
                              OR s.end_date >= (m.month + INTERVAL '1 month')::date)
                   ) AS total_active
            FROM generate_series($1::timestamp, $2::timestamp, INTERVAL '1 month') AS m(month)
            LEFT JOIN befit.subscriptions s ON s.start_date < (m.month + INTERVAL '1 month')::date
            GROUP BY m.month
            ORDER BY m.month
            ",
        )
        .bind(first_month)
        .bind(last_month)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Delivered sales per day in `[start, end]`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_by_day(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SalesReportDay>, RepositoryError> {
        let rows = sqlx::query_as::<_, SalesReportDay>(
            r"
            SELECT created_at::date AS date,
                   SUM(total_amount) AS total_sales,
                   COUNT(*) AS total_orders,
                   ROUND(SUM(total_amount) / COUNT(*), 2) AS average_order_value
            FROM befit.orders
            WHERE order_status = 'delivered' AND created_at::date BETWEEN $1 AND $2
            GROUP BY created_at::date
            ORDER BY date
            ",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Every product with delivered units and revenue in `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ProductReportRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductReportRow>(
            r"
            SELECT p.id AS product_id, p.name,
                   COALESCE(c.name, 'Uncategorized') AS category,
                   COALESCE(SUM(oi.quantity) FILTER (WHERE o.id IS NOT NULL), 0)::BIGINT
                       AS total_sold,
                   COALESCE(SUM(oi.subtotal) FILTER (WHERE o.id IS NOT NULL), 0) AS revenue,
                   p.stock AS current_stock,
                   p.average_rating
            FROM befit.products p
            LEFT JOIN befit.categories c ON c.id = p.category_id
            LEFT JOIN befit.order_items oi ON oi.product_id = p.id
            LEFT JOIN befit.orders o
              ON o.id = oi.order_id
             AND o.order_status = 'delivered'
             AND o.created_at::date BETWEEN $1 AND $2
            GROUP BY p.id, c.name
            ORDER BY total_sold DESC, p.id
            ",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Products with stock at or below `threshold`, lowest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<LowStockProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, LowStockProduct>(
            r"
            SELECT id AS product_id, name, sku, stock, is_active
            FROM befit.products
            WHERE stock <= $1
            ORDER BY stock, id
            ",
        )
        .bind(threshold)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

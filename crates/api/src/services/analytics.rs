//! Admin dashboard and sales reports.

use chrono::{Datelike, Days, Months, NaiveDate};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use befit_core::order::round_money;

use crate::db::AnalyticsRepository;
use crate::db::analytics::{CategoryBucket, GrowthBucket, MonthBucket};
use crate::error::AppError;
use crate::models::{
    CategorySales, DashboardStats, LowStockProduct, MonthlySales, ProductReportRow, SalesReport,
    SalesReportSummary, SalesStats, SubscriberGrowth,
};

/// Stock below this counts as low on the dashboard.
pub const DASHBOARD_LOW_STOCK: i32 = 10;
/// Default threshold of the low-stock list (inclusive).
pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 10;
/// Report window when no dates are given.
pub const DEFAULT_REPORT_DAYS: u64 = 30;

const TREND_MONTHS: u32 = 6;
const TOP_PRODUCTS: i64 = 10;

/// A closed date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// Resolve optional bounds; a missing bound defaults to the last 30 days.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when `start` is after `end`.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, AppError> {
        let end = end.unwrap_or(today);
        let start = start.unwrap_or_else(|| {
            end.checked_sub_days(Days::new(DEFAULT_REPORT_DAYS))
                .unwrap_or(end)
        });
        if start > end {
            return Err(AppError::BadRequest(
                "start_date must not be after end_date".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    /// Days covered, both ends included.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Analytics service.
pub struct AnalyticsService<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Assemble the admin dashboard as of `today`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if any aggregate fails.
    #[instrument(skip(self))]
    pub async fn dashboard(&self, today: NaiveDate) -> Result<DashboardStats, AppError> {
        let repo = AnalyticsRepository::new(self.pool);
        let month_start = first_of_month(today);
        let trend_start = month_start
            .checked_sub_months(Months::new(TREND_MONTHS - 1))
            .unwrap_or(month_start);
        let thirty_days_ago = today
            .checked_sub_days(Days::new(DEFAULT_REPORT_DAYS))
            .unwrap_or(today);

        let totals = repo.sales_totals().await?;
        let top_selling_products = repo.top_selling(TOP_PRODUCTS).await?;
        let users = repo.user_stats(month_start).await?;
        let subscriptions = repo.subscription_stats(month_start).await?;
        let (total_products, low_stock_products) = repo.product_counts(DASHBOARD_LOW_STOCK).await?;
        let top_product = repo.top_product_since(thirty_days_ago).await?;
        let today_summary = repo.day_summary(today).await?;
        let monthly_sales = repo.monthly_sales(trend_start, month_start).await?;
        let category_sales = repo.category_sales().await?;
        let subscriber_growth = repo.subscriber_growth(trend_start, month_start).await?;

        Ok(DashboardStats {
            sales: SalesStats {
                total_sales: totals.total_sales,
                total_orders: totals.total_orders,
                total_products_sold: totals.total_products_sold,
                average_order_value: totals.average_order_value,
                top_selling_products,
            },
            users,
            subscriptions,
            total_products,
            low_stock_products,
            top_product,
            today_summary,
            monthly_sales: monthly_sales.into_iter().map(label_month).collect(),
            category_sales: with_percentages(category_sales),
            subscriber_growth: subscriber_growth.into_iter().map(label_growth).collect(),
        })
    }

    /// Daily delivered sales over a period.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn sales_report(&self, period: Period) -> Result<SalesReport, AppError> {
        let details = AnalyticsRepository::new(self.pool)
            .sales_by_day(period.start, period.end)
            .await?;

        let total_sales: Decimal = details.iter().map(|day| day.total_sales).sum();
        let total_orders: i64 = details.iter().map(|day| day.total_orders).sum();
        let average_order_value = if total_orders == 0 {
            Decimal::ZERO
        } else {
            round_money(total_sales / Decimal::from(total_orders))
        };

        Ok(SalesReport {
            summary: SalesReportSummary {
                period_start: period.start,
                period_end: period.end,
                total_sales,
                total_orders,
                average_order_value,
                days_in_period: period.days(),
            },
            details,
        })
    }

    /// Every product with its delivered units and revenue over a period.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn products_report(&self, period: Period) -> Result<Vec<ProductReportRow>, AppError> {
        Ok(AnalyticsRepository::new(self.pool)
            .product_report(period.start, period.end)
            .await?)
    }

    /// Products at or below `threshold`, lowest stock first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<LowStockProduct>, AppError> {
        Ok(AnalyticsRepository::new(self.pool).low_stock(threshold).await?)
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn month_label(month: NaiveDate) -> String {
    month.format("%B %Y").to_string()
}

fn label_month(bucket: MonthBucket) -> MonthlySales {
    MonthlySales {
        month: month_label(bucket.month),
        sales: bucket.sales,
        orders: bucket.orders,
    }
}

fn label_growth(bucket: GrowthBucket) -> SubscriberGrowth {
    SubscriberGrowth {
        month: month_label(bucket.month),
        new_subscribers: bucket.new_subscribers,
        total_active: bucket.total_active,
    }
}

/// Attach each category's share of the total, rounded to two decimals.
fn with_percentages(buckets: Vec<CategoryBucket>) -> Vec<CategorySales> {
    let total: Decimal = buckets.iter().map(|bucket| bucket.total_sales).sum();
    buckets
        .into_iter()
        .map(|bucket| CategorySales {
            percentage: if total.is_zero() {
                Decimal::ZERO
            } else {
                round_money(bucket.total_sales / total * Decimal::ONE_HUNDRED)
            },
            category: bucket.category,
            total_sales: bucket.total_sales,
            total_products_sold: bucket.total_products_sold,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bucket(category: &str, sales: i64) -> CategoryBucket {
        CategoryBucket {
            category: category.to_string(),
            total_sales: Decimal::from(sales),
            total_products_sold: 1,
        }
    }

    #[test]
    fn test_period_defaults_to_last_thirty_days() {
        let today = date(2026, 10, 14);
        let period = Period::resolve(None, None, today).unwrap();
        assert_eq!(period.start, date(2026, 9, 14));
        assert_eq!(period.end, today);
        assert_eq!(period.days(), 31);
    }

    #[test]
    fn test_period_rejects_inverted_range() {
        let err = Period::resolve(Some(date(2026, 5, 2)), Some(date(2026, 5, 1)), date(2026, 6, 1))
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_category_percentages() {
        let rows = with_percentages(vec![bucket("Protein", 2), bucket("Vitamins", 1)]);
        assert_eq!(rows.first().unwrap().percentage, Decimal::new(6667, 2));
        assert_eq!(rows.last().unwrap().percentage, Decimal::new(3333, 2));

        let rows = with_percentages(vec![bucket("Protein", 0)]);
        assert_eq!(rows.first().unwrap().percentage, Decimal::ZERO);
    }

    #[test]
    fn test_month_labels() {
        assert_eq!(month_label(date(2026, 10, 1)), "October 2026");
        assert_eq!(first_of_month(date(2026, 2, 27)), date(2026, 2, 1));
    }
}

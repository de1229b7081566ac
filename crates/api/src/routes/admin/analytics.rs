//! Admin analytics and CSV exports.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{DashboardStats, LowStockProduct, ProductReportRow, SalesReport};
use crate::services::analytics::DEFAULT_LOW_STOCK_THRESHOLD;
use crate::services::reports::{attachment, products_csv, sales_csv};
use crate::services::subscriptions::today;
use crate::services::{AnalyticsService, Period};
use crate::state::AppState;

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analytics/dashboard", get(dashboard))
        .route("/analytics/sales-report", get(sales_report))
        .route("/analytics/products-report", get(products_report))
        .route("/analytics/low-stock", get(low_stock))
        .route("/analytics/export/sales.csv", get(export_sales))
        .route("/analytics/export/products.csv", get(export_products))
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl PeriodQuery {
    fn resolve(&self) -> Result<Period, AppError> {
        Period::resolve(self.start_date, self.end_date, today())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<i32>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(AnalyticsService::new(state.pool()).dashboard(today()).await?))
}

pub async fn sales_report(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<SalesReport>, AppError> {
    let period = query.resolve()?;
    Ok(Json(
        AnalyticsService::new(state.pool()).sales_report(period).await?,
    ))
}

pub async fn products_report(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<ProductReportRow>>, AppError> {
    let period = query.resolve()?;
    Ok(Json(
        AnalyticsService::new(state.pool())
            .products_report(period)
            .await?,
    ))
}

pub async fn low_stock(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<Vec<LowStockProduct>>, AppError> {
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    if threshold < 0 {
        return Err(AppError::BadRequest("threshold must not be negative".to_string()));
    }
    Ok(Json(
        AnalyticsService::new(state.pool()).low_stock(threshold).await?,
    ))
}

pub async fn export_sales(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, AppError> {
    let period = query.resolve()?;
    let report = AnalyticsService::new(state.pool()).sales_report(period).await?;
    Ok(csv_download("sales_report", sales_csv(&report)))
}

pub async fn export_products(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, AppError> {
    let period = query.resolve()?;
    let rows = AnalyticsService::new(state.pool())
        .products_report(period)
        .await?;
    Ok(csv_download("products_report", products_csv(&rows)))
}

fn csv_download(stem: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, attachment(stem, today())),
        ],
        body,
    )
}

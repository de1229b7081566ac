//! Public catalog: products, categories and search.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};

use befit_core::{CategoryId, ProductId};

use crate::db::{CategoryRepository, ProductRepository};
use crate::error::AppError;
use crate::models::{Category, Product, ProductDetail, ProductSearch, SearchFilters};
use crate::state::AppState;
use crate::validation::{MAX_PAGE_LIMIT, Pagination, ValidationError};

/// Build the catalog router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/categories", get(list_categories))
        .route("/search/products", get(search_products))
        .route("/search/filters", get(search_filters))
}

/// Query string of `GET /products`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category_id: Option<CategoryId>,
}


#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub products: Vec<Product>,
    pub total: i64,
}

/// Active products, newest first.
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ProductPage>, AppError> {
    let pagination = Pagination::from_query(query.page, query.limit).validate()?;
    let (products, total) = ProductRepository::new(state.pool())
        .list_active(query.category_id, pagination.limit, pagination.offset())
        .await?;

    Ok(Json(ProductPage {
        products,
        total,
        page: pagination.page,
        limit: pagination.limit,
        total_pages: pagination.total_pages(total),
    }))
}

/// One product with its images. Inactive products are hidden.
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>, AppError> {
    ProductRepository::new(state.pool())
        .get_detail(id)
        .await?
        .filter(|detail| detail.product.is_active)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Product with ID {id} not found")))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(CategoryRepository::new(state.pool()).list().await?))
}

pub async fn search_products(
    State(state): State<AppState>,
    Query(params): Query<ProductSearch>,
) -> Result<Json<SearchResults>, AppError> {
    check_search(&params)?;
    let (products, total) = ProductRepository::new(state.pool())
        .search(&params)
        .await?;
    Ok(Json(SearchResults { products, total }))
}

pub async fn search_filters(
    State(state): State<AppState>,
) -> Result<Json<SearchFilters>, AppError> {
    Ok(Json(
        ProductRepository::new(state.pool()).search_filters().await?,
    ))
}

fn check_search(params: &ProductSearch) -> Result<(), ValidationError> {
    if params.skip < 0 {
        return Err(ValidationError::new("skip", "must not be negative"));
    }
    if !(1..=MAX_PAGE_LIMIT).contains(&params.limit) {
        return Err(ValidationError::new(
            "limit",
            format!("must be between 1 and {MAX_PAGE_LIMIT}"),
        ));
    }
    if let (Some(min), Some(max)) = (params.min_price, params.max_price)
        && min > max
    {
        return Err(ValidationError::new("min_price", "must not exceed max_price"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_check_search_bounds() {
        let params = ProductSearch {
            limit: 20,
            ..ProductSearch::default()
        };
        assert!(check_search(&params).is_ok());

        let err = check_search(&ProductSearch {
            limit: 0,
            ..ProductSearch::default()
        })
        .unwrap_err();
        assert_eq!(err.field, "limit");

        let err = check_search(&ProductSearch {
            limit: 20,
            min_price: Some(Decimal::from(50)),
            max_price: Some(Decimal::from(10)),
            ..ProductSearch::default()
        })
        .unwrap_err();
        assert_eq!(err.field, "min_price");
    }
}

//! Catalog types: categories, products, images, and search.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use befit_core::{CategoryId, ProductId, ProductImageId};

/// A product category.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body for creating or replacing a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
}

/// A sellable supplement.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub physical_activities: Vec<String>,
    pub fitness_objectives: Vec<String>,
    pub nutritional_value: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub sku: Option<String>,
    pub is_active: bool,
    /// Mean of all review ratings, 0 when unreviewed.
    pub average_rating: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An image attached to a product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductImage {
    pub id: ProductImageId,
    pub product_id: ProductId,
    pub image_path: String,
    pub is_primary: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

/// A product with its images ordered by `display_order`.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category_name: Option<String>,
    pub images: Vec<ProductImage>,
}

/// Body of `POST /admin/products`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    #[serde(default)]
    pub physical_activities: Vec<String>,
    #[serde(default)]
    pub fitness_objectives: Vec<String>,
    pub nutritional_value: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub sku: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

/// Body of `PUT /admin/products/{id}`; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub physical_activities: Option<Vec<String>>,
    pub fitness_objectives: Option<Vec<String>>,
    pub nutritional_value: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub sku: Option<String>,
    pub is_active: Option<bool>,
}

impl ProductUpdate {
    /// Apply the present fields on top of an existing product.
    #[must_use]
    pub fn apply_to(self, product: &Product) -> ProductInput {
        ProductInput {
            category_id: self.category_id.or(product.category_id),
            name: self.name.unwrap_or_else(|| product.name.clone()),
            description: self.description.or_else(|| product.description.clone()),
            brand: self.brand.or_else(|| product.brand.clone()),
            physical_activities: self
                .physical_activities
                .unwrap_or_else(|| product.physical_activities.clone()),
            fitness_objectives: self
                .fitness_objectives
                .unwrap_or_else(|| product.fitness_objectives.clone()),
            nutritional_value: self
                .nutritional_value
                .or_else(|| product.nutritional_value.clone()),
            price: self.price.unwrap_or(product.price),
            stock: self.stock.unwrap_or(product.stock),
            sku: self.sku.or_else(|| product.sku.clone()),
            is_active: self.is_active.unwrap_or(product.is_active),
        }
    }
}

/// Query string of `GET /search/products`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductSearch {
    pub q: Option<String>,
    pub category: Option<String>,
    pub physical_activity: Option<String>,
    pub fitness_objective: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

const fn default_search_limit() -> i64 {
    20
}

/// Values available for the search filter widgets.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchFilters {
    pub categories: Vec<String>,
    pub physical_activities: Vec<String>,
    pub fitness_objectives: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product {
            id: ProductId::new(1),
            category_id: Some(CategoryId::new(2)),
            name: "Whey Isolate".to_string(),
            description: None,
            brand: Some("Iron Labs".to_string()),
            physical_activities: vec!["weightlifting".to_string()],
            fitness_objectives: vec!["gain_muscle".to_string()],
            nutritional_value: None,
            price: Decimal::new(89_900, 2),
            stock: 12,
            sku: Some("WHEY-ISO-2LB".to_string()),
            is_active: true,
            average_rating: Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_update_keeps_absent_fields() {
        let update = ProductUpdate {
            price: Some(Decimal::new(79_900, 2)),
            is_active: Some(false),
            ..ProductUpdate::default()
        };
        let merged = update.apply_to(&product());
        assert_eq!(merged.price, Decimal::new(79_900, 2));
        assert!(!merged.is_active);
        assert_eq!(merged.name, "Whey Isolate");
        assert_eq!(merged.stock, 12);
        assert_eq!(merged.category_id, Some(CategoryId::new(2)));
    }

    #[test]
    fn test_search_defaults() {
        let search: ProductSearch = serde_json::from_str("{}").unwrap();
        assert_eq!(search.skip, 0);
        assert_eq!(search.limit, 20);
        assert!(search.q.is_none());
    }

    #[test]
    fn test_product_input_defaults_active() {
        let input: ProductInput =
            serde_json::from_str(r#"{"name": "Creatine", "price": "399.00"}"#).unwrap();
        assert!(input.is_active);
        assert_eq!(input.stock, 0);
        assert!(input.physical_activities.is_empty());
    }
}

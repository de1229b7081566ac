//! Category and product repositories, including search.

use sqlx::{PgPool, Postgres, QueryBuilder};

use befit_core::{CategoryId, ProductId, ProductImageId};

use super::RepositoryError;
use crate::models::{
    Category, CategoryInput, Product, ProductDetail, ProductImage, ProductInput, ProductSearch,
    SearchFilters,
};

const PRODUCT_COLUMNS: &str = "p.id, p.category_id, p.name, p.description, p.brand, \
     p.physical_activities, p.fitness_objectives, p.nutritional_value, p.price, p.stock, p.sku, \
     p.is_active, p.average_rating, p.created_at, p.updated_at";

const IMAGE_COLUMNS: &str = "id, product_id, image_path, is_primary, display_order, created_at";

// =============================================================================
// Categories
// =============================================================================

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at FROM befit.categories ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(
            r"
            INSERT INTO befit.categories (name, description) VALUES ($1, $2)
            RETURNING id, name, description, created_at
            ",
        )
        .bind(input.name.trim())
        .bind(input.description.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "Category name already exists"))
    }

    /// Insert a category unless its name exists. Returns whether a row was added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn ensure(&self, input: &CategoryInput) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO befit.categories (name, description) VALUES ($1, $2) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(input.name.trim())
        .bind(input.description.as_deref())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether a category exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let found = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM befit.categories WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool)
            .await?;
        Ok(found)
    }

    /// Replace a category's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(
            r"
            UPDATE befit.categories SET name = $2, description = $3 WHERE id = $1
            RETURNING id, name, description, created_at
            ",
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(input.description.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "Category name already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a category. Its products become uncategorized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM befit.categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// Products
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Page through active products, optionally in one category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(
        &self,
        category_id: Option<CategoryId>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM befit.products p
            WHERE p.is_active AND ($1::INTEGER IS NULL OR p.category_id = $1)
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(category_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM befit.products \
             WHERE is_active AND ($1::INTEGER IS NULL OR category_id = $1)",
        )
        .bind(category_id)
        .fetch_one(self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Get a product by ID regardless of its active flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM befit.products p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Get a product with its category name and ordered images.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_detail(&self, id: ProductId) -> Result<Option<ProductDetail>, RepositoryError> {
        let Some(product) = self.get(id).await? else {
            return Ok(None);
        };

        let category_name: Option<String> = match product.category_id {
            Some(category_id) => {
                sqlx::query_scalar("SELECT name FROM befit.categories WHERE id = $1")
                    .bind(category_id)
                    .fetch_optional(self.pool)
                    .await?
            }
            None => None,
        };

        let images = self.list_images(id).await?;

        Ok(Some(ProductDetail {
            product,
            category_name,
            images,
        }))
    }

    /// Images of a product by display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_images(&self, id: ProductId) -> Result<Vec<ProductImage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductImage>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM befit.product_images WHERE product_id = $1 \
             ORDER BY display_order, id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU is taken.
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            r"
            INSERT INTO befit.products AS p (
                category_id, name, description, brand, physical_activities,
                fitness_objectives, nutritional_value, price, stock, sku, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(input.category_id)
        .bind(input.name.trim())
        .bind(input.description.as_deref())
        .bind(input.brand.as_deref())
        .bind(&input.physical_activities)
        .bind(&input.fitness_objectives)
        .bind(input.nutritional_value.as_deref())
        .bind(input.price)
        .bind(input.stock)
        .bind(input.sku.as_deref())
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "SKU already exists"))
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the SKU is taken.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            r"
            UPDATE befit.products AS p SET
                category_id = $2, name = $3, description = $4, brand = $5,
                physical_activities = $6, fitness_objectives = $7, nutritional_value = $8,
                price = $9, stock = $10, sku = $11, is_active = $12
            WHERE p.id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.category_id)
        .bind(input.name.trim())
        .bind(input.description.as_deref())
        .bind(input.brand.as_deref())
        .bind(&input.physical_activities)
        .bind(&input.fitness_objectives)
        .bind(input.nutritional_value.as_deref())
        .bind(input.price)
        .bind(input.stock)
        .bind(input.sku.as_deref())
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "SKU already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Set the active flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_active(&self, id: ProductId, active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE befit.products SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a product, returning its image paths so the objects can be removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if orders reference the product.
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: ProductId) -> Result<Vec<String>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let paths: Vec<String> = sqlx::query_scalar(
            "SELECT image_path FROM befit.product_images WHERE product_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM befit.products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::Conflict(
                        "Product has orders; deactivate it instead".to_string(),
                    );
                }
                RepositoryError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(paths)
    }

    /// Attach an image. A primary image demotes the previous primary.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add_image(
        &self,
        product_id: ProductId,
        image_path: &str,
        is_primary: bool,
        display_order: i32,
    ) -> Result<ProductImage, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM befit.products WHERE id = $1)")
                .bind(product_id)
                .fetch_one(&mut *tx)
                .await?;
        if !exists {
            return Err(RepositoryError::NotFound);
        }

        if is_primary {
            sqlx::query(
                "UPDATE befit.product_images SET is_primary = FALSE WHERE product_id = $1",
            )
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        }

        let image = sqlx::query_as::<_, ProductImage>(&format!(
            r"
            INSERT INTO befit.product_images (product_id, image_path, is_primary, display_order)
            VALUES ($1, $2, $3, $4)
            RETURNING {IMAGE_COLUMNS}
            "
        ))
        .bind(product_id)
        .bind(image_path)
        .bind(is_primary)
        .bind(display_order)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(image)
    }

    /// Remove an image row, returning its path.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product has no such image.
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_image(
        &self,
        product_id: ProductId,
        image_id: ProductImageId,
    ) -> Result<String, RepositoryError> {
        sqlx::query_scalar(
            "DELETE FROM befit.product_images WHERE id = $1 AND product_id = $2 RETURNING image_path",
        )
        .bind(image_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Filtered search. `q` matches name, description, brand and category name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(
        &self,
        params: &ProductSearch,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM befit.products p \
             LEFT JOIN befit.categories c ON c.id = p.category_id"
        ));
        push_search_filters(&mut query, params);
        query
            .push(" ORDER BY p.name, p.id LIMIT ")
            .push_bind(params.limit)
            .push(" OFFSET ")
            .push_bind(params.skip);

        let products = query
            .build_query_as::<Product>()
            .fetch_all(self.pool)
            .await?;

        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM befit.products p \
             LEFT JOIN befit.categories c ON c.id = p.category_id",
        );
        push_search_filters(&mut count, params);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        Ok((products, total))
    }

    /// Distinct values for the search filter widgets, sorted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn search_filters(&self) -> Result<SearchFilters, RepositoryError> {
        let categories: Vec<String> =
            sqlx::query_scalar("SELECT name FROM befit.categories ORDER BY name")
                .fetch_all(self.pool)
                .await?;

        let physical_activities: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT UNNEST(physical_activities) AS v FROM befit.products \
             WHERE is_active ORDER BY v",
        )
        .fetch_all(self.pool)
        .await?;

        let fitness_objectives: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT UNNEST(fitness_objectives) AS v FROM befit.products \
             WHERE is_active ORDER BY v",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(SearchFilters {
            categories,
            physical_activities,
            fitness_objectives,
        })
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside `ILIKE`.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_search_filters(query: &mut QueryBuilder<'_, Postgres>, params: &ProductSearch) {
    query.push(" WHERE TRUE");

    if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = like_pattern(q);
        query.push(" AND (p.name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR p.description ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR p.brand ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR c.name ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }

    if let Some(category) = params.category.as_deref().filter(|c| !c.is_empty()) {
        query.push(" AND c.name ILIKE ");
        query.push_bind(category.to_string());
    }

    if let Some(activity) = params.physical_activity.as_deref().filter(|a| !a.is_empty()) {
        query.push(" AND p.physical_activities @> ARRAY[");
        query.push_bind(activity.to_string());
        query.push("]::TEXT[]");
    }

    if let Some(objective) = params.fitness_objective.as_deref().filter(|o| !o.is_empty()) {
        query.push(" AND p.fitness_objectives @> ARRAY[");
        query.push_bind(objective.to_string());
        query.push("]::TEXT[]");
    }

    if let Some(min) = params.min_price {
        query.push(" AND p.price >= ");
        query.push_bind(min);
    }

    if let Some(max) = params.max_price {
        query.push(" AND p.price <= ");
        query.push_bind(max);
    }

    if let Some(active) = params.is_active {
        query.push(" AND p.is_active = ");
        query.push_bind(active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("whey"), "%whey%");
        assert_eq!(like_pattern("100%_pure"), "%100\\%\\_pure%");
    }

    #[test]
    fn test_search_sql_includes_only_given_filters() {
        let params = ProductSearch {
            q: Some("whey".to_string()),
            fitness_objective: Some("gain_muscle".to_string()),
            ..ProductSearch::default()
        };
        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 FROM befit.products p");
        push_search_filters(&mut query, &params);
        let sql = query.sql();

        assert!(sql.contains("p.name ILIKE $1"));
        assert!(sql.contains("c.name ILIKE $4"));
        assert!(sql.contains("p.fitness_objectives @> ARRAY[$5]"));
        assert!(!sql.contains("physical_activities"));
        assert!(!sql.contains("p.price"));
    }
}

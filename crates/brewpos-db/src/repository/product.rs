//! # Product Repository
//!
//! Database operations for the catalog.
//!
//! ## Delete vs Deactivate
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DELETE /products/{id}                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Any sale_items history?                                               │
//! │       │                                                                 │
//! │       ├── yes → UPDATE is_active = 0        (history stays intact)     │
//! │       │                                                                 │
//! │       └── no  → DELETE row                                             │
//! │                  │                                                      │
//! │                  └── FK violation (history raced in)?                  │
//! │                       → fall back to deactivation                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::Page;
use brewpos_core::Product;

/// Columns selected for every product read, in `Product` field order.
const PRODUCT_COLUMNS: &str = "id, name, category, description, price_cents, stock, \
     low_stock_threshold, image_path, is_active, created_at, updated_at";

// =============================================================================
// Filters & Outcomes
// =============================================================================

/// Listing filter for `GET /products`.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Substring match against name or category.
    pub search: Option<String>,
    /// Exact category match.
    pub category: Option<String>,
    /// Only products at or below their low-stock threshold.
    pub low_stock_only: bool,
    /// 1-based page number.
    pub page: u32,
    /// Page size; the handler supplies its default (20).
    pub per_page: u32,
}

/// Partial update payload: absent fields keep their stored values.
///
/// Updates write only the submitted columns. Stock in particular moves
/// under concurrent sales, so an unrelated edit (rename, re-price) must
/// never write back a stock level it read earlier.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub stock: Option<i64>,
    pub low_stock_threshold: Option<i64>,
    pub image_path: Option<String>,
    pub is_active: Option<bool>,
}

/// What happened to a product on delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// No sale history: the row was removed. Carries the stored image
    /// path (if any) so the caller can clean up the file, best-effort.
    Deleted { image_path: Option<String> },
    /// Sale history exists: the product was deactivated instead.
    Deactivated,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists active products with optional search/category/low-stock
    /// filters, ordered by name, paginated.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Page<Product>> {
        debug!(?filter, "Listing products");

        let per_page = filter.per_page.max(1);
        let page = filter.page.max(1);
        let offset = (page - 1) as i64 * per_page as i64;

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1"
        ));
        let mut count: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM products WHERE is_active = 1");

        for qb in [&mut query, &mut count] {
            if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
                let pattern = format!("%{}%", search.trim());
                qb.push(" AND (name LIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR category LIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            if let Some(category) = filter.category.as_deref().filter(|c| !c.trim().is_empty()) {
                qb.push(" AND category = ").push_bind(category.trim().to_string());
            }
            if filter.low_stock_only {
                qb.push(" AND stock <= low_stock_threshold");
            }
        }

        query
            .push(" ORDER BY name LIMIT ")
            .push_bind(per_page as i64)
            .push(" OFFSET ")
            .push_bind(offset);

        let items: Vec<Product> = query.build_query_as().fetch_all(&self.pool).await?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Distinct categories of active products, alphabetical.
    pub async fn categories(&self) -> DbResult<Vec<String>> {
        let categories: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT category FROM products WHERE is_active = 1 ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Gets a product by its ID (active or not).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category, description, price_cents, stock,
                low_stock_threshold, image_path, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.low_stock_threshold)
        .bind(&product.image_path)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Applies a partial update and returns the fresh row.
    ///
    /// Only submitted columns are written, so fields moving under
    /// concurrent writers (stock) keep their current values.
    pub async fn update(&self, id: &str, patch: &ProductPatch) -> DbResult<Product> {
        debug!(id = %id, ?patch, "Updating product");

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE products SET updated_at = ");
        query.push_bind(Utc::now());

        if let Some(name) = &patch.name {
            query.push(", name = ").push_bind(name.clone());
        }
        if let Some(category) = &patch.category {
            query.push(", category = ").push_bind(category.clone());
        }
        if let Some(description) = &patch.description {
            query.push(", description = ").push_bind(description.clone());
        }
        if let Some(price_cents) = patch.price_cents {
            query.push(", price_cents = ").push_bind(price_cents);
        }
        if let Some(stock) = patch.stock {
            query.push(", stock = ").push_bind(stock);
        }
        if let Some(threshold) = patch.low_stock_threshold {
            query.push(", low_stock_threshold = ").push_bind(threshold);
        }
        if let Some(image_path) = &patch.image_path {
            query.push(", image_path = ").push_bind(image_path.clone());
        }
        if let Some(is_active) = patch.is_active {
            query.push(", is_active = ").push_bind(is_active);
        }

        query.push(" WHERE id = ").push_bind(id.to_string());

        let result = query.build().execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Number of sale line items referencing this product.
    pub async fn sale_history_count(&self, id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sale_items WHERE product_id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Deletes a product, or deactivates it when sale history exists.
    ///
    /// A race where history is inserted between the check and the DELETE
    /// is resolved by the foreign-key constraint: the rejected delete is
    /// caught and converted to a deactivation.
    pub async fn delete(&self, id: &str) -> DbResult<DeleteOutcome> {
        let product = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        if self.sale_history_count(id).await? > 0 {
            debug!(id = %id, "Product has sale history, deactivating");
            self.deactivate(id).await?;
            return Ok(DeleteOutcome::Deactivated);
        }

        match sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)
        {
            Ok(_) => {
                debug!(id = %id, "Product deleted");
                Ok(DeleteOutcome::Deleted {
                    image_path: product.image_path,
                })
            }
            Err(DbError::ForeignKeyViolation { .. }) => {
                debug!(id = %id, "Delete rejected by FK constraint, deactivating");
                self.deactivate(id).await?;
                Ok(DeleteOutcome::Deactivated)
            }
            Err(e) => Err(e),
        }
    }

    /// Soft-deletes a product by setting is_active = false.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result =
            sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;

    fn sample_product(name: &str, category: &str, price_cents: i64, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: generate_product_id(),
            name: name.to_string(),
            category: category.to_string(),
            description: None,
            price_cents,
            stock,
            low_stock_threshold: 10,
            image_path: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_db().await;
        let repo = db.products();

        let product = sample_product("Latte", "Coffee", 450, 25);
        repo.insert(&product).await.unwrap();

        let loaded = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Latte");
        assert_eq!(loaded.price_cents, 450);
        assert_eq!(loaded.stock, 25);
        assert!(loaded.is_active);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = test_db().await;
        let repo = db.products();

        repo.insert(&sample_product("Latte", "Coffee", 450, 25))
            .await
            .unwrap();
        repo.insert(&sample_product("Espresso", "Coffee", 300, 5))
            .await
            .unwrap();
        repo.insert(&sample_product("Croissant", "Pastry", 350, 12))
            .await
            .unwrap();

        let all = repo
            .list(&ProductFilter {
                per_page: 20,
                page: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.total, 3);
        // Ordered by name
        assert_eq!(all.items[0].name, "Croissant");

        let coffee = repo
            .list(&ProductFilter {
                category: Some("Coffee".to_string()),
                per_page: 20,
                page: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(coffee.total, 2);

        let low = repo
            .list(&ProductFilter {
                low_stock_only: true,
                per_page: 20,
                page: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(low.total, 1);
        assert_eq!(low.items[0].name, "Espresso");

        let search = repo
            .list(&ProductFilter {
                search: Some("crois".to_string()),
                per_page: 20,
                page: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(search.total, 1);
    }

    #[tokio::test]
    async fn test_categories_distinct_sorted() {
        let db = test_db().await;
        let repo = db.products();

        repo.insert(&sample_product("Latte", "Coffee", 450, 25))
            .await
            .unwrap();
        repo.insert(&sample_product("Espresso", "Coffee", 300, 5))
            .await
            .unwrap();
        repo.insert(&sample_product("Croissant", "Pastry", 350, 12))
            .await
            .unwrap();

        let categories = repo.categories().await.unwrap();
        assert_eq!(categories, vec!["Coffee".to_string(), "Pastry".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_without_history_removes_row() {
        let db = test_db().await;
        let repo = db.products();

        let product = sample_product("Latte", "Coffee", 450, 25);
        repo.insert(&product).await.unwrap();

        let outcome = repo.delete(&product.id).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted { image_path: None });
        assert!(repo.get_by_id(&product.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_with_history_deactivates() {
        use crate::repository::sale::{NewSale, RequestedLine};
        use brewpos_core::{PaymentMethod, Role, TaxRate, User};

        let db = test_db().await;
        let repo = db.products();

        let now = Utc::now();
        let user = User {
            id: generate_product_id(),
            name: "Cashier".into(),
            email: "cashier@cafe.example".into(),
            password_hash: "$argon2id$test".into(),
            role: Role::Cashier,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.users().insert(&user).await.unwrap();

        let product = sample_product("Latte", "Coffee", 450, 25);
        repo.insert(&product).await.unwrap();

        db.sales()
            .record(
                NewSale {
                    user_id: user.id,
                    lines: vec![RequestedLine {
                        product_id: product.id.clone(),
                        quantity: 1,
                    }],
                    payment_method: PaymentMethod::Cash,
                    discount_cents: 0,
                    payment_received_cents: None,
                },
                TaxRate::default(),
            )
            .await
            .unwrap();

        let outcome = repo.delete(&product.id).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deactivated);

        // Row survives for receipt history, just inactive
        let kept = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert!(!kept.is_active);
        assert_eq!(repo.sale_history_count(&product.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let db = test_db().await;
        let repo = db.products();

        let patch = ProductPatch {
            name: Some("Ghost".into()),
            ..Default::default()
        };
        let err = repo.update("no-such-id", &patch).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_writes_only_submitted_fields() {
        let db = test_db().await;
        let repo = db.products();

        let product = sample_product("Latte", "Coffee", 450, 25);
        repo.insert(&product).await.unwrap();

        let updated = repo
            .update(
                &product.id,
                &ProductPatch {
                    name: Some("Oat Latte".into()),
                    price_cents: Some(500),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Oat Latte");
        assert_eq!(updated.price_cents, 500);
        // Untouched fields keep their stored values
        assert_eq!(updated.category, "Coffee");
        assert_eq!(updated.stock, 25);
        assert!(updated.is_active);
    }

    /// A sale committing between an edit form's load and its save must
    /// keep its stock decrement: the rename below writes name only.
    #[tokio::test]
    async fn test_update_does_not_resurrect_concurrent_stock_change() {
        use crate::repository::sale::{NewSale, RequestedLine};
        use brewpos_core::{PaymentMethod, Role, TaxRate, User};

        let db = test_db().await;
        let repo = db.products();

        let now = Utc::now();
        let user = User {
            id: generate_product_id(),
            name: "Cashier".into(),
            email: "stock@cafe.example".into(),
            password_hash: "$argon2id$test".into(),
            role: Role::Cashier,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.users().insert(&user).await.unwrap();

        let product = sample_product("Latte", "Coffee", 450, 10);
        repo.insert(&product).await.unwrap();

        // Sale lands after the edit screen loaded the row
        db.sales()
            .record(
                NewSale {
                    user_id: user.id,
                    lines: vec![RequestedLine {
                        product_id: product.id.clone(),
                        quantity: 3,
                    }],
                    payment_method: PaymentMethod::Cash,
                    discount_cents: 0,
                    payment_received_cents: None,
                },
                TaxRate::default(),
            )
            .await
            .unwrap();

        let updated = repo
            .update(
                &product.id,
                &ProductPatch {
                    name: Some("House Latte".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "House Latte");
        assert_eq!(updated.stock, 7);
    }
}

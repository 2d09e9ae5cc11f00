//! # Sale Repository
//!
//! The transactional sale recorder and sale queries.
//!
//! ## Recording Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record(new_sale, tax_rate)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │    for each line:                                                       │
//! │      load active product ──────────── not found? ──► rollback           │
//! │      check stock ──────────────────── insufficient? ► rollback          │
//! │      UPDATE stock = stock - qty WHERE stock >= qty                      │
//! │         └── 0 rows? (concurrent sale drained it) ──► rollback           │
//! │    CheckoutTotals::compute                                              │
//! │    INSERT sale + sale_items                                             │
//! │  COMMIT                                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  caller emits QR artifact (best-effort, outside the transaction)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any failure before COMMIT rolls the whole sale back: no stock moves,
//! no rows persist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::Page;
use brewpos_core::{
    validation, CheckoutTotals, CoreError, Money, PaymentMethod, PricedLine, Product, Sale,
    SaleItem, TaxRate, MAX_SALE_LINES,
};

/// Columns selected for every sale read, in `Sale` field order.
const SALE_COLUMNS: &str = "id, user_id, receipt_code, subtotal_cents, discount_cents, \
     tax_cents, total_cents, payment_received_cents, change_cents, payment_method, \
     qr_code_path, receipt_url, created_at";

// =============================================================================
// Inputs
// =============================================================================

/// One requested line of a new sale, as submitted by the cashier.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestedLine {
    pub product_id: String,
    pub quantity: i64,
}

/// A new sale to record.
#[derive(Debug, Clone)]
pub struct NewSale {
    /// The cashier recording the sale.
    pub user_id: String,
    pub lines: Vec<RequestedLine>,
    pub payment_method: PaymentMethod,
    /// Requested discount; clamped to 0 ..= subtotal.
    pub discount_cents: i64,
    /// Amount tendered; `None` means exact payment.
    pub payment_received_cents: Option<i64>,
}

// =============================================================================
// Outputs
// =============================================================================

/// A sale together with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct SaleWithItems {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

/// A sale row for listings, joined with the cashier's name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ListedSale {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub sale: Sale,
    pub cashier_name: String,
}

/// Listing filter for `GET /sales`.
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    /// Only sales recorded by this user.
    pub user_id: Option<String>,
    /// Inclusive lower bound on created_at.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on created_at.
    pub date_to: Option<DateTime<Utc>>,
    /// 1-based page number.
    pub page: u32,
    /// Page size; the handler supplies its default (60).
    pub per_page: u32,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a sale atomically: stock checks, stock decrements, totals,
    /// and all row inserts happen in one transaction. Either the whole
    /// sale commits or nothing changes.
    pub async fn record(&self, new_sale: NewSale, tax_rate: TaxRate) -> DbResult<SaleWithItems> {
        if new_sale.lines.is_empty() {
            return Err(CoreError::EmptySale.into());
        }
        if new_sale.lines.len() > MAX_SALE_LINES {
            return Err(CoreError::TooManyLines {
                max: MAX_SALE_LINES,
            }
            .into());
        }
        for line in &new_sale.lines {
            validation::validate_quantity(line.quantity).map_err(CoreError::from)?;
        }

        let mut tx = self.pool.begin().await?;

        let mut priced = Vec::with_capacity(new_sale.lines.len());
        for line in &new_sale.lines {
            let product = Self::load_active_product(&mut tx, &line.product_id).await?;

            if !product.can_fulfill(line.quantity) {
                return Err(CoreError::InsufficientStock {
                    name: product.name,
                    available: product.stock,
                    requested: line.quantity,
                }
                .into());
            }

            // Guarded decrement: the WHERE clause re-checks stock under
            // the write lock, so a concurrent sale that drained the shelf
            // between our read and this write makes this a no-op.
            let result = sqlx::query(
                "UPDATE products SET stock = stock - ?2, updated_at = ?3 \
                 WHERE id = ?1 AND stock >= ?2",
            )
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(CoreError::InsufficientStock {
                    name: product.name,
                    available: product.stock,
                    requested: line.quantity,
                }
                .into());
            }

            priced.push(PricedLine {
                product_id: product.id,
                product_name: product.name,
                unit_price: Money::from_cents(product.price_cents),
                quantity: line.quantity,
            });
        }

        let totals = CheckoutTotals::compute(
            &priced,
            Money::from_cents(new_sale.discount_cents),
            tax_rate,
            new_sale.payment_received_cents.map(Money::from_cents),
        );

        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            user_id: new_sale.user_id.clone(),
            receipt_code: generate_receipt_code(now),
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            tax_cents: totals.tax.cents(),
            total_cents: totals.total.cents(),
            payment_received_cents: totals.received.cents(),
            change_cents: totals.change.cents(),
            payment_method: new_sale.payment_method,
            qr_code_path: None,
            receipt_url: None,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, user_id, receipt_code, subtotal_cents, discount_cents,
                tax_cents, total_cents, payment_received_cents, change_cents,
                payment_method, qr_code_path, receipt_url, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.user_id)
        .bind(&sale.receipt_code)
        .bind(sale.subtotal_cents)
        .bind(sale.discount_cents)
        .bind(sale.tax_cents)
        .bind(sale.total_cents)
        .bind(sale.payment_received_cents)
        .bind(sale.change_cents)
        .bind(sale.payment_method)
        .bind(&sale.qr_code_path)
        .bind(&sale.receipt_url)
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(priced.len());
        for line in &priced {
            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                line_total_cents: line.line_total().cents(),
                created_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, product_name, quantity,
                    unit_price_cents, line_total_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.line_total_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;

            items.push(item);
        }

        tx.commit().await?;

        info!(
            receipt_code = %sale.receipt_code,
            total_cents = sale.total_cents,
            lines = items.len(),
            "Sale recorded"
        );

        Ok(SaleWithItems { sale, items })
    }

    async fn load_active_product(
        tx: &mut Transaction<'_, Sqlite>,
        product_id: &str,
    ) -> DbResult<Product> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, category, description, price_cents, stock, \
                 low_stock_threshold, image_path, is_active, created_at, updated_at \
             FROM products WHERE id = ?1 AND is_active = 1",
        )
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await?;

        product.ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()).into())
    }

    /// Gets a sale with its items by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SaleWithItems>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match sale {
            Some(sale) => {
                let items = self.items_for(&sale.id).await?;
                Ok(Some(SaleWithItems { sale, items }))
            }
            None => Ok(None),
        }
    }

    /// Gets a sale with its items by receipt code (public receipt lookup).
    pub async fn get_by_receipt_code(&self, code: &str) -> DbResult<Option<SaleWithItems>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE receipt_code = ?1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        match sale {
            Some(sale) => {
                let items = self.items_for(&sale.id).await?;
                Ok(Some(SaleWithItems { sale, items }))
            }
            None => Ok(None),
        }
    }

    async fn items_for(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT id, sale_id, product_id, product_name, quantity, \
                 unit_price_cents, line_total_cents, created_at \
             FROM sale_items WHERE sale_id = ?1 ORDER BY created_at, id",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists sales newest-first with optional user and date filters,
    /// joined with the cashier's name.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Page<ListedSale>> {
        debug!(?filter, "Listing sales");

        let per_page = filter.per_page.max(1);
        let page = filter.page.max(1);
        let offset = (page - 1) as i64 * per_page as i64;

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT s.id, s.user_id, s.receipt_code, s.subtotal_cents, s.discount_cents, \
                 s.tax_cents, s.total_cents, s.payment_received_cents, s.change_cents, \
                 s.payment_method, s.qr_code_path, s.receipt_url, s.created_at, \
                 u.name AS cashier_name \
             FROM sales s JOIN users u ON u.id = s.user_id WHERE 1 = 1",
        );
        let mut count: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM sales s WHERE 1 = 1");

        for qb in [&mut query, &mut count] {
            if let Some(user_id) = &filter.user_id {
                qb.push(" AND s.user_id = ").push_bind(user_id.clone());
            }
            if let Some(from) = filter.date_from {
                qb.push(" AND s.created_at >= ").push_bind(from);
            }
            if let Some(to) = filter.date_to {
                qb.push(" AND s.created_at <= ").push_bind(to);
            }
        }

        query
            .push(" ORDER BY s.created_at DESC LIMIT ")
            .push_bind(per_page as i64)
            .push(" OFFSET ")
            .push_bind(offset);

        let items: Vec<ListedSale> = query.build_query_as().fetch_all(&self.pool).await?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Backfills the QR artifact columns after the emitter runs.
    /// Called outside the recording transaction; failure here never
    /// affects the committed sale.
    pub async fn set_qr_artifact(
        &self,
        sale_id: &str,
        qr_code_path: &str,
        receipt_url: &str,
    ) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE sales SET qr_code_path = ?2, receipt_url = ?3 WHERE id = ?1")
                .bind(sale_id)
                .bind(qr_code_path)
                .bind(receipt_url)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", sale_id));
        }

        Ok(())
    }

    /// Counts all sales (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Receipt Codes
// =============================================================================

/// Generates a receipt code: `RCP-YYYYMMDD-XXXXXX`.
///
/// The suffix is six uppercase hex characters drawn from a fresh UUID.
/// The `receipt_code` UNIQUE constraint is the collision backstop; at
/// café volumes a same-day collision is vanishingly unlikely.
pub fn generate_receipt_code(at: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect::<String>()
        .to_uppercase();

    format!("RCP-{}-{}", at.format("%Y%m%d"), suffix)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use brewpos_core::{Role, User};
    use chrono::Utc;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_cashier(db: &Database) -> String {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: "Test Cashier".into(),
            email: format!("{}@example.com", Uuid::new_v4().simple()),
            password_hash: "$argon2id$test".into(),
            role: Role::Cashier,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.users().insert(&user).await.unwrap();
        user.id
    }

    async fn seed_product(db: &Database, name: &str, price_cents: i64, stock: i64) -> String {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            category: "Coffee".into(),
            description: None,
            price_cents,
            stock,
            low_stock_threshold: 10,
            image_path: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();
        product.id
    }

    #[tokio::test]
    async fn test_record_reference_sale() {
        let db = test_db().await;
        let user_id = seed_cashier(&db).await;
        let a = seed_product(&db, "A", 5_000, 10).await;
        let b = seed_product(&db, "B", 3_000, 10).await;

        let sale = db
            .sales()
            .record(
                NewSale {
                    user_id,
                    lines: vec![
                        RequestedLine {
                            product_id: a.clone(),
                            quantity: 2,
                        },
                        RequestedLine {
                            product_id: b.clone(),
                            quantity: 1,
                        },
                    ],
                    payment_method: PaymentMethod::Cash,
                    discount_cents: 0,
                    payment_received_cents: Some(20_000),
                },
                TaxRate::from_bps(1_000),
            )
            .await
            .unwrap();

        assert_eq!(sale.sale.subtotal_cents, 13_000);
        assert_eq!(sale.sale.tax_cents, 1_300);
        assert_eq!(sale.sale.total_cents, 14_300);
        assert_eq!(sale.sale.change_cents, 5_700);
        assert_eq!(sale.items.len(), 2);

        // Stock decremented
        let pa = db.products().get_by_id(&a).await.unwrap().unwrap();
        let pb = db.products().get_by_id(&b).await.unwrap().unwrap();
        assert_eq!(pa.stock, 8);
        assert_eq!(pb.stock, 9);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_everything() {
        let db = test_db().await;
        let user_id = seed_cashier(&db).await;
        let a = seed_product(&db, "A", 5_000, 10).await;
        let b = seed_product(&db, "B", 3_000, 1).await;

        let err = db
            .sales()
            .record(
                NewSale {
                    user_id,
                    lines: vec![
                        RequestedLine {
                            product_id: a.clone(),
                            quantity: 2,
                        },
                        // second line over-requests: whole sale must abort
                        RequestedLine {
                            product_id: b.clone(),
                            quantity: 5,
                        },
                    ],
                    payment_method: PaymentMethod::Cash,
                    discount_cents: 0,
                    payment_received_cents: None,
                },
                TaxRate::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { requested: 5, .. })
        ));

        // First line's decrement rolled back, no rows persisted
        let pa = db.products().get_by_id(&a).await.unwrap().unwrap();
        assert_eq!(pa.stock, 10);
        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_sale_rejected() {
        let db = test_db().await;
        let user_id = seed_cashier(&db).await;

        let err = db
            .sales()
            .record(
                NewSale {
                    user_id,
                    lines: vec![],
                    payment_method: PaymentMethod::Card,
                    discount_cents: 0,
                    payment_received_cents: None,
                },
                TaxRate::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::EmptySale)));
    }

    #[tokio::test]
    async fn test_oversized_sale_rejected() {
        let db = test_db().await;
        let user_id = seed_cashier(&db).await;
        let a = seed_product(&db, "A", 1_000, 500).await;

        let lines = (0..=MAX_SALE_LINES)
            .map(|_| RequestedLine {
                product_id: a.clone(),
                quantity: 1,
            })
            .collect();

        let err = db
            .sales()
            .record(
                NewSale {
                    user_id,
                    lines,
                    payment_method: PaymentMethod::Cash,
                    discount_cents: 0,
                    payment_received_cents: None,
                },
                TaxRate::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::TooManyLines { .. })
        ));

        // Rejected before the transaction: nothing persisted
        let product = db.products().get_by_id(&a).await.unwrap().unwrap();
        assert_eq!(product.stock, 500);
        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_product_rejected() {
        let db = test_db().await;
        let user_id = seed_cashier(&db).await;

        let err = db
            .sales()
            .record(
                NewSale {
                    user_id,
                    lines: vec![RequestedLine {
                        product_id: "nonexistent".into(),
                        quantity: 1,
                    }],
                    payment_method: PaymentMethod::Cash,
                    discount_cents: 0,
                    payment_received_cents: None,
                },
                TaxRate::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_survives_product_edit() {
        let db = test_db().await;
        let user_id = seed_cashier(&db).await;
        let a = seed_product(&db, "Latte", 450, 10).await;

        let sale = db
            .sales()
            .record(
                NewSale {
                    user_id,
                    lines: vec![RequestedLine {
                        product_id: a.clone(),
                        quantity: 1,
                    }],
                    payment_method: PaymentMethod::Card,
                    discount_cents: 0,
                    payment_received_cents: None,
                },
                TaxRate::default(),
            )
            .await
            .unwrap();

        // Rename and re-price the product
        db.products()
            .update(
                &a,
                &crate::repository::product::ProductPatch {
                    name: Some("Oat Latte".into()),
                    price_cents: Some(500),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let reloaded = db.sales().get_by_id(&sale.sale.id).await.unwrap().unwrap();
        assert_eq!(reloaded.items[0].product_name, "Latte");
        assert_eq!(reloaded.items[0].unit_price_cents, 450);
    }

    #[tokio::test]
    async fn test_receipt_code_format_and_lookup() {
        let db = test_db().await;
        let user_id = seed_cashier(&db).await;
        let a = seed_product(&db, "A", 1_000, 10).await;

        let sale = db
            .sales()
            .record(
                NewSale {
                    user_id,
                    lines: vec![RequestedLine {
                        product_id: a,
                        quantity: 1,
                    }],
                    payment_method: PaymentMethod::Digital,
                    discount_cents: 0,
                    payment_received_cents: None,
                },
                TaxRate::default(),
            )
            .await
            .unwrap();

        let code = &sale.sale.receipt_code;
        assert!(code.starts_with("RCP-"));
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

        let found = db
            .sales()
            .get_by_receipt_code(code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.sale.id, sale.sale.id);
    }

    #[tokio::test]
    async fn test_list_newest_first_with_cashier_name() {
        let db = test_db().await;
        let user_id = seed_cashier(&db).await;
        let a = seed_product(&db, "A", 1_000, 100).await;

        for _ in 0..3 {
            db.sales()
                .record(
                    NewSale {
                        user_id: user_id.clone(),
                        lines: vec![RequestedLine {
                            product_id: a.clone(),
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
        }

        let page = db
            .sales()
            .list(&SaleFilter {
                page: 1,
                per_page: 60,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.items[0].cashier_name, "Test Cashier");
        for window in page.items.windows(2) {
            assert!(window[0].sale.created_at >= window[1].sale.created_at);
        }
    }

    #[tokio::test]
    async fn test_set_qr_artifact() {
        let db = test_db().await;
        let user_id = seed_cashier(&db).await;
        let a = seed_product(&db, "A", 1_000, 10).await;

        let sale = db
            .sales()
            .record(
                NewSale {
                    user_id,
                    lines: vec![RequestedLine {
                        product_id: a,
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

        db.sales()
            .set_qr_artifact(
                &sale.sale.id,
                "qrcodes/test.png",
                "http://localhost:3000/receipt/RCP-TEST",
            )
            .await
            .unwrap();

        let reloaded = db.sales().get_by_id(&sale.sale.id).await.unwrap().unwrap();
        assert_eq!(reloaded.sale.qr_code_path.as_deref(), Some("qrcodes/test.png"));
        assert!(reloaded.sale.receipt_url.is_some());
    }
}

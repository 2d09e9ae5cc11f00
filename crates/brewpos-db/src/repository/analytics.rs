//! # Analytics Repository
//!
//! Dashboard aggregates: period stats, sales trend, top products, low
//! stock, recent activity.
//!
//! ## Period Windows
//! ```text
//! daily    current: [today 00:00 UTC, now]        prior: yesterday
//! weekly   current: [Monday 00:00 UTC, now]       prior: previous Mon..Mon
//! monthly  current: [1st 00:00 UTC, now]          prior: previous month
//! ```
//!
//! Growth compares current revenue to the full prior window; when the
//! prior window had no revenue, growth reports 0.0 rather than infinity.

use chrono::{DateTime, Datelike, Days, Months, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use brewpos_core::Product;

// =============================================================================
// Period
// =============================================================================

/// Dashboard reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    /// Start of the current window (UTC midnight boundary).
    pub fn current_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let start_date = match self {
            Period::Daily => today,
            Period::Weekly => today.week(Weekday::Mon).first_day(),
            Period::Monthly => today.with_day(1).unwrap_or(today),
        };
        start_date.and_time(NaiveTime::MIN).and_utc()
    }

    /// Start of the prior window. The prior window ends where the
    /// current one starts.
    pub fn prior_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let current = self.current_start(now);
        match self {
            Period::Daily => current
                .checked_sub_days(Days::new(1))
                .unwrap_or(current),
            Period::Weekly => current
                .checked_sub_days(Days::new(7))
                .unwrap_or(current),
            Period::Monthly => current
                .checked_sub_months(Months::new(1))
                .unwrap_or(current),
        }
    }

    /// SQLite strftime format for trend bucketing: hourly buckets for
    /// daily and weekly views, one bucket per day for monthly.
    fn bucket_format(&self) -> &'static str {
        match self {
            Period::Daily | Period::Weekly => "%Y-%m-%d %H:00",
            Period::Monthly => "%Y-%m-%d",
        }
    }
}

// =============================================================================
// Result Shapes
// =============================================================================

/// Headline numbers for the selected period.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PeriodStats {
    pub revenue_cents: i64,
    pub sales_count: i64,
    /// Revenue divided by sale count, rounded down; 0 with no sales.
    pub average_order_cents: i64,
    /// Revenue of the full prior window, for context.
    pub prior_revenue_cents: i64,
    /// Percentage change vs the prior window; 0.0 when the prior window
    /// had no revenue.
    pub growth_percent: f64,
}

/// One point of the revenue trend.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TrendPoint {
    /// Bucket label (`YYYY-MM-DD` or `YYYY-MM-DD HH:00`).
    pub bucket: String,
    pub revenue_cents: i64,
    pub sales_count: i64,
}

/// A best-selling product over the period.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: String,
    pub name: String,
    pub quantity_sold: i64,
    pub revenue_cents: i64,
}

/// A recent sale summary for the dashboard feed.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RecentSale {
    pub id: String,
    pub receipt_code: String,
    pub total_cents: i64,
    pub cashier_name: String,
    pub created_at: DateTime<Utc>,
}

/// The complete dashboard payload.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardAnalytics {
    pub period: Period,
    pub stats: PeriodStats,
    pub trend: Vec<TrendPoint>,
    pub top_products: Vec<TopProduct>,
    pub low_stock_products: Vec<Product>,
    pub recent_sales: Vec<RecentSale>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for dashboard aggregate queries.
#[derive(Debug, Clone)]
pub struct AnalyticsRepository {
    pool: SqlitePool,
}

impl AnalyticsRepository {
    /// Creates a new AnalyticsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AnalyticsRepository { pool }
    }

    /// Assembles the complete dashboard payload for a period.
    pub async fn dashboard(&self, period: Period) -> DbResult<DashboardAnalytics> {
        let now = Utc::now();

        let stats = self.period_stats(period, now).await?;
        let trend = self.sales_trend(period, now).await?;
        let top_products = self.top_products().await?;
        let low_stock_products = self.low_stock_products().await?;
        let recent_sales = self.recent_sales(10).await?;

        Ok(DashboardAnalytics {
            period,
            stats,
            trend,
            top_products,
            low_stock_products,
            recent_sales,
        })
    }

    /// Revenue and sale count for the current window, with growth vs
    /// the prior window.
    pub async fn period_stats(&self, period: Period, now: DateTime<Utc>) -> DbResult<PeriodStats> {
        let current_start = period.current_start(now);
        let prior_start = period.prior_start(now);

        debug!(?period, %current_start, %prior_start, "Computing period stats");

        let (revenue_cents, sales_count): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_cents), 0), COUNT(*) \
             FROM sales WHERE created_at >= ?1",
        )
        .bind(current_start)
        .fetch_one(&self.pool)
        .await?;

        let (prior_revenue_cents,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_cents), 0) \
             FROM sales WHERE created_at >= ?1 AND created_at < ?2",
        )
        .bind(prior_start)
        .bind(current_start)
        .fetch_one(&self.pool)
        .await?;

        let growth_percent = if prior_revenue_cents == 0 {
            0.0
        } else {
            (revenue_cents - prior_revenue_cents) as f64 / prior_revenue_cents as f64 * 100.0
        };

        let average_order_cents = if sales_count == 0 {
            0
        } else {
            revenue_cents / sales_count
        };

        Ok(PeriodStats {
            revenue_cents,
            sales_count,
            average_order_cents,
            prior_revenue_cents,
            growth_percent,
        })
    }

    /// Revenue trend over the current window, bucketed by hour (daily
    /// and weekly views) or by day (monthly view). Empty buckets are
    /// simply absent; the client fills gaps.
    pub async fn sales_trend(&self, period: Period, now: DateTime<Utc>) -> DbResult<Vec<TrendPoint>> {
        let start = period.current_start(now);

        let points = sqlx::query_as::<_, TrendPoint>(&format!(
            "SELECT strftime('{}', created_at) AS bucket, \
                 COALESCE(SUM(total_cents), 0) AS revenue_cents, \
                 COUNT(*) AS sales_count \
             FROM sales WHERE created_at >= ?1 \
             GROUP BY bucket ORDER BY bucket",
            period.bucket_format()
        ))
        .bind(start)
        .fetch_all(&self.pool)
        .await?;

        Ok(points)
    }

    /// Top 10 products by all-time quantity sold.
    pub async fn top_products(&self) -> DbResult<Vec<TopProduct>> {
        let products = sqlx::query_as::<_, TopProduct>(
            "SELECT si.product_id, \
                 p.name, \
                 SUM(si.quantity) AS quantity_sold, \
                 SUM(si.line_total_cents) AS revenue_cents \
             FROM sale_items si \
             JOIN products p ON p.id = si.product_id \
             GROUP BY si.product_id, p.name \
             ORDER BY quantity_sold DESC, revenue_cents DESC \
             LIMIT 10",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Active products at or below their low-stock threshold, emptiest
    /// shelf first.
    pub async fn low_stock_products(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT id, name, category, description, price_cents, stock, \
                 low_stock_threshold, image_path, is_active, created_at, updated_at \
             FROM products \
             WHERE is_active = 1 AND stock <= low_stock_threshold \
             ORDER BY stock ASC, name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Most recent sales with cashier names, newest first.
    pub async fn recent_sales(&self, limit: i64) -> DbResult<Vec<RecentSale>> {
        let sales = sqlx::query_as::<_, RecentSale>(
            "SELECT s.id, s.receipt_code, s.total_cents, u.name AS cashier_name, s.created_at \
             FROM sales s JOIN users u ON u.id = s.user_id \
             ORDER BY s.created_at DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::sale::{NewSale, RequestedLine};
    use brewpos_core::{PaymentMethod, Role, TaxRate, User};
    use chrono::TimeZone;
    use uuid::Uuid;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_cashier(db: &Database) -> String {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: "Dash Cashier".into(),
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

    async fn record_sale(db: &Database, user_id: &str, product_id: &str, qty: i64) {
        db.sales()
            .record(
                NewSale {
                    user_id: user_id.to_string(),
                    lines: vec![RequestedLine {
                        product_id: product_id.to_string(),
                        quantity: qty,
                    }],
                    payment_method: PaymentMethod::Cash,
                    discount_cents: 0,
                    payment_received_cents: None,
                },
                TaxRate::from_bps(1_000),
            )
            .await
            .unwrap();
    }

    #[test]
    fn test_bucket_granularity() {
        assert_eq!(Period::Daily.bucket_format(), "%Y-%m-%d %H:00");
        assert_eq!(Period::Weekly.bucket_format(), "%Y-%m-%d %H:00");
        assert_eq!(Period::Monthly.bucket_format(), "%Y-%m-%d");
    }

    #[test]
    fn test_period_boundaries() {
        // Wednesday 2026-08-19 15:30 UTC
        let now = Utc.with_ymd_and_hms(2026, 8, 19, 15, 30, 0).unwrap();

        let daily = Period::Daily.current_start(now);
        assert_eq!(daily, Utc.with_ymd_and_hms(2026, 8, 19, 0, 0, 0).unwrap());
        assert_eq!(
            Period::Daily.prior_start(now),
            Utc.with_ymd_and_hms(2026, 8, 18, 0, 0, 0).unwrap()
        );

        // Week starts Monday
        let weekly = Period::Weekly.current_start(now);
        assert_eq!(weekly, Utc.with_ymd_and_hms(2026, 8, 17, 0, 0, 0).unwrap());
        assert_eq!(
            Period::Weekly.prior_start(now),
            Utc.with_ymd_and_hms(2026, 8, 10, 0, 0, 0).unwrap()
        );

        let monthly = Period::Monthly.current_start(now);
        assert_eq!(monthly, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());
        assert_eq!(
            Period::Monthly.prior_start(now),
            Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_growth_zero_when_prior_window_empty() {
        let db = test_db().await;
        let user_id = seed_cashier(&db).await;
        let product = seed_product(&db, "Latte", 450, 100).await;

        record_sale(&db, &user_id, &product, 2).await;

        let stats = db
            .analytics()
            .period_stats(Period::Daily, Utc::now())
            .await
            .unwrap();

        assert!(stats.revenue_cents > 0);
        assert_eq!(stats.sales_count, 1);
        assert_eq!(stats.prior_revenue_cents, 0);
        assert_eq!(stats.growth_percent, 0.0);
    }

    #[tokio::test]
    async fn test_top_products_ordered_by_quantity() {
        let db = test_db().await;
        let user_id = seed_cashier(&db).await;
        let latte = seed_product(&db, "Latte", 450, 100).await;
        let espresso = seed_product(&db, "Espresso", 300, 100).await;

        record_sale(&db, &user_id, &latte, 5).await;
        record_sale(&db, &user_id, &espresso, 2).await;

        let top = db.analytics().top_products().await.unwrap();

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "Latte");
        assert_eq!(top[0].quantity_sold, 5);
        assert_eq!(top[0].revenue_cents, 5 * 450);
        assert_eq!(top[1].name, "Espresso");
    }

    #[tokio::test]
    async fn test_low_stock_emptiest_first() {
        let db = test_db().await;
        seed_product(&db, "Plenty", 450, 50).await;
        seed_product(&db, "Low", 450, 5).await;
        seed_product(&db, "Lower", 450, 2).await;

        let low = db.analytics().low_stock_products().await.unwrap();

        assert_eq!(low.len(), 2);
        assert_eq!(low[0].name, "Lower");
        assert_eq!(low[1].name, "Low");
    }

    #[tokio::test]
    async fn test_dashboard_assembles_all_sections() {
        let db = test_db().await;
        let user_id = seed_cashier(&db).await;
        let product = seed_product(&db, "Latte", 450, 100).await;

        record_sale(&db, &user_id, &product, 1).await;

        let dash = db.analytics().dashboard(Period::Weekly).await.unwrap();

        assert_eq!(dash.period, Period::Weekly);
        assert_eq!(dash.stats.sales_count, 1);
        assert_eq!(dash.trend.len(), 1);
        assert_eq!(dash.recent_sales.len(), 1);
        assert_eq!(dash.recent_sales[0].cashier_name, "Dash Cashier");
    }
}

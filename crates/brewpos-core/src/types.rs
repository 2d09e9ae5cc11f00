//! # Domain Types
//!
//! Core domain types used throughout BrewPOS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │    SaleItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  name, category │   │  receipt_code   │   │  sale_id (FK)   │       │
//! │  │  price_cents    │   │  total_cents    │   │  product_name   │       │
//! │  │  stock          │   │  payment_method │   │  unit_price     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxRate      │   │ PaymentMethod   │   │      Role       │       │
//! │  │  bps (u32)      │   │  Cash           │   │  Admin          │       │
//! │  │  1000 = 10%     │   │  Card           │   │  Cashier        │       │
//! │  │                 │   │  Digital        │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Sales carry both an immutable UUID (`id`) used for relations, and a
//! human-shareable business identifier (`receipt_code`) used in public
//! receipt lookup and QR codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000. 1000 bps = the 10% café sales tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale was paid. Fixed set; validated at the API boundary.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Physical cash payment (tendered amount and change apply).
    Cash,
    /// Card payment on external terminal.
    Card,
    /// Digital wallet / app payment.
    Digital,
}

// =============================================================================
// User Role
// =============================================================================

/// Access-control role.
///
/// Admin: full CRUD including user and product management.
/// Cashier: catalog browsing, sale creation, dashboard viewing.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Cashier,
}

impl Role {
    /// Whether this role may manage products and users.
    #[inline]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product available for sale.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to cashier and on receipts.
    pub name: String,

    /// Free-text category ("Coffee", "Pastry", ...).
    pub category: String,

    /// Optional description for product details.
    pub description: Option<String>,

    /// Unit price in cents.
    pub price_cents: i64,

    /// Current stock level. Never negative after a committed transaction.
    pub stock: i64,

    /// Stock at or below this threshold flags the product as low stock.
    pub low_stock_threshold: i64,

    /// Stored image reference (public path), if any.
    pub image_path: Option<String>,

    /// Whether product is active (soft delete marker).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Low stock: at or below the configured threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.low_stock_threshold
    }

    /// Checks whether the requested quantity can be fulfilled.
    #[inline]
    pub fn can_fulfill(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A completed checkout transaction.
///
/// Immutable after creation except for the QR artifact backfill
/// (`qr_code_path` / `receipt_url`), which is written best-effort after
/// the transaction commits.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,

    /// The cashier who recorded the sale.
    pub user_id: String,

    /// Human-shareable unique identifier: `RCP-YYYYMMDD-XXXXXX`.
    pub receipt_code: String,

    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,

    /// Invariant: total = subtotal - discount + tax.
    pub total_cents: i64,

    pub payment_received_cents: i64,
    pub change_cents: i64,
    pub payment_method: PaymentMethod,

    /// Stored QR PNG reference, backfilled after commit.
    pub qr_code_path: Option<String>,

    /// Public receipt URL encoded into the QR code.
    pub receipt_url: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
///
/// Uses the snapshot pattern: product name and unit price are frozen at
/// sale time, independent of later catalog edits. Created atomically with
/// its parent sale; never updated.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,

    /// Product name at time of sale (frozen).
    pub product_name: String,

    /// Quantity sold (positive).
    pub quantity: i64,

    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,

    /// Line subtotal (unit_price × quantity).
    pub line_total_cents: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// User
// =============================================================================

/// A system user (admin or cashier).
///
/// The password hash never leaves the server: it is skipped during
/// serialization so user payloads are safe to return verbatim.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    pub id: String,
    pub name: String,

    /// Unique login identifier.
    pub email: String,

    /// Argon2 password hash. Never serialized.
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,

    pub role: Role,

    /// Soft-delete marker; inactive users cannot log in.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(1000);
        assert_eq!(rate.bps(), 1000);
        assert!((rate.percentage() - 10.0).abs() < 0.001);
    }

    #[test]
    fn test_tax_rate_default_is_ten_percent() {
        assert_eq!(TaxRate::default().bps(), 1000);
    }

    #[test]
    fn test_payment_method_serde_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Cash).unwrap(),
            "\"cash\""
        );
        assert_eq!(
            serde_json::from_str::<PaymentMethod>("\"digital\"").unwrap(),
            PaymentMethod::Digital
        );
    }

    #[test]
    fn test_role_is_admin() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::Cashier.is_admin());
    }

    #[test]
    fn test_user_hash_not_serialized() {
        let user = User {
            id: "u1".into(),
            name: "Test".into(),
            email: "t@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::Cashier,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn test_product_low_stock() {
        let now = Utc::now();
        let product = Product {
            id: "p1".into(),
            name: "Latte".into(),
            category: "Coffee".into(),
            description: None,
            price_cents: 450,
            stock: 10,
            low_stock_threshold: 10,
            image_path: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(product.is_low_stock());
        assert!(product.can_fulfill(10));
        assert!(!product.can_fulfill(11));
    }
}

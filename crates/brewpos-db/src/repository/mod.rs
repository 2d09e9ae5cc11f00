//! # Repository Module
//!
//! Database repository implementations for BrewPOS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP handler                                                           │
//! │       │                                                                 │
//! │       │  db.sales().record(new_sale, tax_rate)                          │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── record(&self, new_sale, tax_rate)   ← transactional               │
//! │  ├── get_by_id(&self, id)                                              │
//! │  ├── get_by_receipt_code(&self, code)                                  │
//! │  └── list(&self, filter)                                               │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog CRUD, categories, delete/deactivate
//! - [`sale::SaleRepository`] - The transactional sale recorder and queries
//! - [`user::UserRepository`] - User management and login lookup
//! - [`analytics::AnalyticsRepository`] - Dashboard aggregates

use serde::Serialize;

pub mod analytics;
pub mod product;
pub mod sale;
pub mod user;

/// One page of a listing, with enough metadata for the client to build
/// pagination controls.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    /// Total number of pages for this listing.
    pub fn page_count(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        ((self.total.max(0) as u64).div_ceil(self.per_page as u64)) as u32
    }
}

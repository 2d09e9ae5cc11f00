//! Seeds a fresh BrewPOS database with a default admin account and a
//! starter café catalog.
//!
//! ```text
//! BREWPOS_DATABASE_PATH=/var/lib/brewpos/brewpos.db cargo run -p brewpos-db --bin seed
//! ```
//!
//! Idempotent: runs against an already-seeded database without creating
//! duplicates.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use brewpos_core::{Product, Role, User, DEFAULT_LOW_STOCK_THRESHOLD};
use brewpos_db::{Database, DbConfig};

const DEFAULT_ADMIN_EMAIL: &str = "admin@brewpos.local";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

const CATALOG: &[(&str, &str, i64, i64)] = &[
    ("Espresso", "Coffee", 300, 100),
    ("Americano", "Coffee", 350, 100),
    ("Latte", "Coffee", 450, 80),
    ("Cappuccino", "Coffee", 450, 80),
    ("Mocha", "Coffee", 500, 60),
    ("Cold Brew", "Coffee", 475, 40),
    ("Earl Grey", "Tea", 325, 50),
    ("Green Tea", "Tea", 325, 50),
    ("Chai Latte", "Tea", 425, 40),
    ("Croissant", "Pastry", 350, 30),
    ("Pain au Chocolat", "Pastry", 400, 25),
    ("Blueberry Muffin", "Pastry", 375, 24),
    ("Banana Bread", "Pastry", 350, 20),
    ("Turkey Sandwich", "Food", 850, 15),
    ("Caprese Panini", "Food", 900, 12),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let db_path = std::env::var("BREWPOS_DATABASE_PATH")
        .unwrap_or_else(|_| "brewpos.db".to_string());

    info!(path = %db_path, "Seeding BrewPOS database");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    seed_admin(&db).await?;
    seed_catalog(&db).await?;

    db.close().await;
    info!("Seeding complete");
    Ok(())
}

async fn seed_admin(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    if db.users().get_by_email(DEFAULT_ADMIN_EMAIL).await?.is_some() {
        info!(email = DEFAULT_ADMIN_EMAIL, "Admin already exists, skipping");
        return Ok(());
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(DEFAULT_ADMIN_PASSWORD.as_bytes(), &salt)
        .map_err(|e| format!("password hashing failed: {e}"))?
        .to_string();

    let now = Utc::now();
    db.users()
        .insert(&User {
            id: Uuid::new_v4().to_string(),
            name: "Administrator".to_string(),
            email: DEFAULT_ADMIN_EMAIL.to_string(),
            password_hash,
            role: Role::Admin,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await?;

    warn!(
        email = DEFAULT_ADMIN_EMAIL,
        "Created default admin; change the password after first login"
    );
    Ok(())
}

async fn seed_catalog(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    if db.products().count().await? > 0 {
        info!("Catalog not empty, skipping product seed");
        return Ok(());
    }

    let now = Utc::now();
    for &(name, category, price_cents, stock) in CATALOG {
        db.products()
            .insert(&Product {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                category: category.to_string(),
                description: None,
                price_cents,
                stock,
                low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
                image_path: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;
    }

    info!(count = CATALOG.len(), "Catalog seeded");
    Ok(())
}

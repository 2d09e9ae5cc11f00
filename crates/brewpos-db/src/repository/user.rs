//! # User Repository
//!
//! User management and login lookup.
//!
//! Passwords arrive here already hashed (argon2, done at the API layer);
//! this repository only stores and retrieves opaque hash strings.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::Page;
use brewpos_core::{Role, User};

/// Columns selected for every user read, in `User` field order.
const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, is_active, created_at, updated_at";

/// Listing filter for `GET /users`.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Substring match against name or email.
    pub search: Option<String>,
    /// Exact role match.
    pub role: Option<Role>,
    /// 1-based page number.
    pub page: u32,
    /// Page size; the handler supplies its default (60).
    pub per_page: u32,
}

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Looks up an active user by email, for login.
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?1 AND is_active = 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Gets a user by ID (active or not).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Lists active users with optional search/role filters, ordered by
    /// name, paginated.
    pub async fn list(&self, filter: &UserFilter) -> DbResult<Page<User>> {
        debug!(?filter, "Listing users");

        let per_page = filter.per_page.max(1);
        let page = filter.page.max(1);
        let offset = (page - 1) as i64 * per_page as i64;

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {USER_COLUMNS} FROM users WHERE is_active = 1"
        ));
        let mut count: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM users WHERE is_active = 1");

        for qb in [&mut query, &mut count] {
            if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
                let pattern = format!("%{}%", search.trim());
                qb.push(" AND (name LIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR email LIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            if let Some(role) = filter.role {
                qb.push(" AND role = ").push_bind(role);
            }
        }

        query
            .push(" ORDER BY name LIMIT ")
            .push_bind(per_page as i64)
            .push(" OFFSET ")
            .push_bind(offset);

        let items: Vec<User> = query.build_query_as().fetch_all(&self.pool).await?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Inserts a new user. A duplicate email surfaces as
    /// `DbError::UniqueViolation`.
    pub async fn insert(&self, user: &User) -> DbResult<User> {
        debug!(email = %user.email, "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (
                id, name, email, password_hash, role, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(user.clone())
    }

    /// Updates an existing user (full row write; the handler merges
    /// partial updates into the loaded row first).
    pub async fn update(&self, user: &User) -> DbResult<()> {
        debug!(id = %user.id, "Updating user");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = ?2,
                email = ?3,
                password_hash = ?4,
                role = ?5,
                is_active = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", &user.id));
        }

        Ok(())
    }

    /// Soft-deletes a user. Sale history keeps referencing the row, so
    /// users are never hard-deleted.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query("UPDATE users SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Counts active users (for diagnostics and seeding).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_user(name: &str, email: &str, role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$test".to_string(),
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_lookup_by_email() {
        let db = test_db().await;
        let repo = db.users();

        let user = sample_user("Admin", "admin@cafe.example", Role::Admin);
        repo.insert(&user).await.unwrap();

        let found = repo
            .get_by_email("admin@cafe.example")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = test_db().await;
        let repo = db.users();

        repo.insert(&sample_user("One", "same@cafe.example", Role::Cashier))
            .await
            .unwrap();

        let err = repo
            .insert(&sample_user("Two", "same@cafe.example", Role::Cashier))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_deactivated_user_cannot_login() {
        let db = test_db().await;
        let repo = db.users();

        let user = sample_user("Cashier", "cashier@cafe.example", Role::Cashier);
        repo.insert(&user).await.unwrap();
        repo.deactivate(&user.id).await.unwrap();

        assert!(repo
            .get_by_email("cashier@cafe.example")
            .await
            .unwrap()
            .is_none());
        // Still loadable by ID (e.g. for sale history joins)
        assert!(repo.get_by_id(&user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = test_db().await;
        let repo = db.users();

        repo.insert(&sample_user("Alice", "alice@cafe.example", Role::Admin))
            .await
            .unwrap();
        repo.insert(&sample_user("Bob", "bob@cafe.example", Role::Cashier))
            .await
            .unwrap();

        let admins = repo
            .list(&UserFilter {
                role: Some(Role::Admin),
                page: 1,
                per_page: 60,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(admins.total, 1);
        assert_eq!(admins.items[0].name, "Alice");

        let search = repo
            .list(&UserFilter {
                search: Some("bob@".to_string()),
                page: 1,
                per_page: 60,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(search.total, 1);
        assert_eq!(search.items[0].name, "Bob");
    }
}

//! User management handlers. Admin only.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use brewpos_core::{validation, CoreError, Role, User, ValidationError};
use brewpos_db::repository::user::UserFilter;
use brewpos_db::repository::Page;

use crate::auth::{self, AdminUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_PER_PAGE: u32 = 60;

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Partial update: absent fields keep their current values; an empty
/// password means unchanged.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /users` — admin.
pub async fn list(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Json<Page<User>>> {
    let filter = UserFilter {
        search: query.search,
        role: query.role,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(DEFAULT_PER_PAGE),
    };

    let page = state.db.users().list(&filter).await?;
    Ok(Json(page))
}

/// `POST /users` — admin. A duplicate email surfaces as a 422 with a
/// field error; the UNIQUE constraint backstops the check.
pub async fn create(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<CreateUser>,
) -> ApiResult<Json<User>> {
    validate_create(&req)?;

    let email = req.email.trim().to_lowercase();
    if state.db.users().get_by_email(&email).await?.is_some() {
        return Err(ApiError::validation(ValidationError::Duplicate {
            field: "email".to_string(),
            value: email,
        }));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        email: req.email.trim().to_lowercase(),
        password_hash: auth::hash_password(&req.password)?,
        role: req.role,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let user = state.db.users().insert(&user).await?;

    info!(user_id = %user.id, admin_id = %admin.0.id, "User created");
    Ok(Json(user))
}

/// `PUT /users/{id}` — admin; partial update.
pub async fn update(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateUser>,
) -> ApiResult<Json<User>> {
    let mut user = state
        .db
        .users()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User".to_string()))?;

    if let Some(name) = req.name {
        validation::validate_name(&name)?;
        user.name = name.trim().to_string();
    }
    if let Some(email) = req.email {
        validation::validate_email(&email)?;
        user.email = email.trim().to_lowercase();
    }
    if let Some(password) = req.password.filter(|p| !p.is_empty()) {
        validation::validate_password(&password)?;
        user.password_hash = auth::hash_password(&password)?;
    }
    if let Some(role) = req.role {
        user.role = role;
    }

    state.db.users().update(&user).await?;

    info!(user_id = %user.id, admin_id = %admin.0.id, "User updated");
    Ok(Json(user))
}

/// `DELETE /users/{id}` — admin; soft delete. Deleting your own
/// account is refused.
pub async fn delete(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if admin.0.id == id {
        return Err(CoreError::SelfDeletion.into());
    }

    state.db.users().deactivate(&id).await?;

    info!(user_id = %id, admin_id = %admin.0.id, "User deactivated");
    Ok(Json(json!({ "message": "User deactivated" })))
}

fn validate_create(req: &CreateUser) -> Result<(), ApiError> {
    let mut errors: Vec<ValidationError> = Vec::new();

    if let Err(e) = validation::validate_name(&req.name) {
        errors.push(e);
    }
    if let Err(e) = validation::validate_email(&req.email) {
        errors.push(e);
    }
    if let Err(e) = validation::validate_password(&req.password) {
        errors.push(e);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthUser;
    use crate::config::ServerConfig;
    use brewpos_db::{Database, DbConfig};

    async fn test_state() -> AppState {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        AppState::new(db, ServerConfig::load().unwrap())
    }

    fn test_admin() -> AdminUser {
        AdminUser(AuthUser {
            id: "admin-1".into(),
            name: "Admin".into(),
            role: Role::Admin,
        })
    }

    fn cashier_request(email: &str) -> CreateUser {
        CreateUser {
            name: "New Cashier".into(),
            email: email.into(),
            password: "secret1".into(),
            role: Role::Cashier,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_reported_as_field_error() {
        let state = test_state().await;

        create(
            State(state.clone()),
            test_admin(),
            Json(cashier_request("taken@cafe.example")),
        )
        .await
        .unwrap();

        let err = create(
            State(state.clone()),
            test_admin(),
            Json(cashier_request("Taken@cafe.example")),
        )
        .await
        .unwrap_err();

        match err {
            ApiError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field(), "email");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_self_delete_refused() {
        let state = test_state().await;
        let admin = test_admin();
        let own_id = admin.0.id.clone();

        let err = delete(State(state), admin, axum::extract::Path(own_id))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}

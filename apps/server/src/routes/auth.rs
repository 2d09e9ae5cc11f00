//! Login, current-user, and logout handlers.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use brewpos_core::{validation, User};

use crate::auth::{self, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// `POST /login` — verifies credentials and issues a JWT.
///
/// Inactive users are filtered out by the email lookup, so a
/// deactivated account gets the same rejection as a wrong password.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    validation::validate_email(&req.email)?;

    let user = state
        .db
        .users()
        .get_by_email(req.email.trim())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    if !auth::verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = state.jwt.issue(&user.id, &user.name, user.role)?;

    info!(user_id = %user.id, "User logged in");

    Ok(Json(LoginResponse { token, user }))
}

/// `GET /me` — the authenticated user's current record.
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<User>> {
    let user = state
        .db
        .users()
        .get_by_id(&user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User".to_string()))?;

    Ok(Json(user))
}

/// `POST /logout` — stateless: the client discards its token.
pub async fn logout(user: AuthUser) -> Json<serde_json::Value> {
    info!(user_id = %user.id, "User logged out");
    Json(json!({ "message": "Logged out" }))
}

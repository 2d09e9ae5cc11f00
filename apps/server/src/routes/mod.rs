//! HTTP route handlers.
//!
//! ## Surface
//! ```text
//! public         POST /login
//!                GET  /health
//!                GET  /products, /products/categories, /products/{id}
//!                GET  /receipt/{code}, /receipt/{code}/page
//! authenticated  GET  /me            POST /logout
//!                GET  /sales, /sales/{id}       POST /sales
//!                GET  /dashboard/analytics
//! admin          POST /products      PUT/DELETE /products/{id}
//!                GET/POST /users     PUT/DELETE /users/{id}
//! ```
//!
//! Auth is enforced per-handler via the `AuthUser` / `AdminUser`
//! extractors rather than route-group middleware, so each handler's
//! signature states its own access level.

use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub mod auth;
pub mod dashboard;
pub mod products;
pub mod receipt;
pub mod sales;
pub mod users;

/// Builds the complete application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/products", get(products::list).post(products::create))
        .route("/products/categories", get(products::categories))
        .route(
            "/products/:id",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/sales", get(sales::list).post(sales::create))
        .route("/sales/:id", get(sales::show))
        .route("/receipt/:code", get(receipt::show))
        .route("/receipt/:code/page", get(receipt::page))
        .route("/dashboard/analytics", get(dashboard::analytics))
        .route("/users", get(users::list).post(users::create))
        .route("/users/:id", put(users::update).delete(users::delete))
        .with_state(state)
}

/// Liveness probe.
async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    let db_ok = state.db.health_check().await;
    Json(json!({ "status": if db_ok { "ok" } else { "degraded" }, "database": db_ok }))
}

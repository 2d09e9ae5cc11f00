//! Product catalog handlers.
//!
//! Browsing is public (the React catalog works without login); writes
//! are admin-only.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use brewpos_core::{validation, Product, ValidationError, DEFAULT_LOW_STOCK_THRESHOLD};
use brewpos_db::repository::product::{DeleteOutcome, ProductFilter, ProductPatch};
use brewpos_db::repository::Page;

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_PER_PAGE: u32 = 20;

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub low_stock: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i64,
    pub low_stock_threshold: Option<i64>,
    pub image_path: Option<String>,
}

/// Partial update: absent fields keep their current values.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub stock: Option<i64>,
    pub low_stock_threshold: Option<i64>,
    pub image_path: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /products` — public catalog listing.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Product>>> {
    let filter = ProductFilter {
        search: query.search,
        category: query.category,
        low_stock_only: query.low_stock,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(DEFAULT_PER_PAGE),
    };

    let page = state.db.products().list(&filter).await?;
    Ok(Json(page))
}

/// `GET /products/categories` — public.
pub async fn categories(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.db.products().categories().await?))
}

/// `GET /products/{id}` — public.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    let product = state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product".to_string()))?;

    Ok(Json(product))
}

/// `POST /products` — admin.
pub async fn create(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<CreateProduct>,
) -> ApiResult<Json<Product>> {
    validate_create(&req)?;

    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        category: req.category.trim().to_string(),
        description: req.description,
        price_cents: req.price_cents,
        stock: req.stock,
        low_stock_threshold: req.low_stock_threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD),
        image_path: req.image_path,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let product = state.db.products().insert(&product).await?;

    info!(product_id = %product.id, admin_id = %admin.0.id, "Product created");
    Ok(Json(product))
}

/// `PUT /products/{id}` — admin; partial update. Only submitted fields
/// are written, so a sale committing mid-edit keeps its stock
/// decrement. Replacing the image path deletes the old stored file,
/// best-effort.
pub async fn update(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateProduct>,
) -> ApiResult<Json<Product>> {
    let existing = state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product".to_string()))?;

    let mut patch = ProductPatch::default();
    let mut replaced_image: Option<String> = None;

    if let Some(name) = req.name {
        validation::validate_name(&name)?;
        patch.name = Some(name.trim().to_string());
    }
    if let Some(category) = req.category {
        validation::validate_category(&category)?;
        patch.category = Some(category.trim().to_string());
    }
    if let Some(description) = req.description {
        patch.description = Some(description);
    }
    if let Some(price_cents) = req.price_cents {
        validation::validate_price_cents(price_cents)?;
        patch.price_cents = Some(price_cents);
    }
    if let Some(stock) = req.stock {
        validation::validate_stock(stock)?;
        patch.stock = Some(stock);
    }
    if let Some(threshold) = req.low_stock_threshold {
        validation::validate_stock(threshold)?;
        patch.low_stock_threshold = Some(threshold);
    }
    if let Some(image_path) = req.image_path {
        if existing.image_path.as_deref() != Some(image_path.as_str()) {
            replaced_image = existing.image_path.clone();
        }
        patch.image_path = Some(image_path);
    }

    let product = state.db.products().update(&id, &patch).await?;

    if let Some(old) = replaced_image {
        state.storage.delete_quietly(&old);
    }

    info!(product_id = %product.id, admin_id = %admin.0.id, "Product updated");
    Ok(Json(product))
}

/// `DELETE /products/{id}` — admin. Products with sale history are
/// deactivated instead of removed, preserving receipts.
pub async fn delete(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let outcome = state.db.products().delete(&id).await?;

    let body = match outcome {
        DeleteOutcome::Deleted { image_path } => {
            if let Some(image) = image_path {
                state.storage.delete_quietly(&image);
            }
            info!(product_id = %id, admin_id = %admin.0.id, "Product deleted");
            json!({ "deleted": true, "deactivated": false })
        }
        DeleteOutcome::Deactivated => {
            info!(product_id = %id, admin_id = %admin.0.id, "Product deactivated (has sale history)");
            json!({
                "deleted": false,
                "deactivated": true,
                "message": "Product has sale history and was deactivated instead"
            })
        }
    };

    Ok(Json(body))
}

fn validate_create(req: &CreateProduct) -> Result<(), ApiError> {
    let mut errors: Vec<ValidationError> = Vec::new();

    if let Err(e) = validation::validate_name(&req.name) {
        errors.push(e);
    }
    if let Err(e) = validation::validate_category(&req.category) {
        errors.push(e);
    }
    if let Err(e) = validation::validate_price_cents(req.price_cents) {
        errors.push(e);
    }
    if let Err(e) = validation::validate_stock(req.stock) {
        errors.push(e);
    }
    if let Some(threshold) = req.low_stock_threshold {
        if let Err(e) = validation::validate_stock(threshold) {
            errors.push(e);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

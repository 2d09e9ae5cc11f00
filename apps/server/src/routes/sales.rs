//! Sale handlers: checkout and history.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use brewpos_core::{validation, PaymentMethod, ValidationError};
use brewpos_db::repository::sale::{ListedSale, NewSale, RequestedLine, SaleFilter, SaleWithItems};
use brewpos_db::repository::Page;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::qr;
use crate::state::AppState;

const DEFAULT_PER_PAGE: u32 = 60;

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSale {
    pub items: Vec<SaleLineRequest>,
    pub payment_type: PaymentMethod,
    /// Amount tendered in cents; omitted means exact payment.
    pub payment_received: Option<i64>,
    /// Discount in cents.
    #[serde(default)]
    pub discount: i64,
}

#[derive(Debug, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct SaleListQuery {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /sales` — records a sale atomically, then emits the QR
/// receipt artifact best-effort.
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateSale>,
) -> ApiResult<Json<SaleWithItems>> {
    validate_create(&req)?;

    let new_sale = NewSale {
        user_id: user.id.clone(),
        lines: req
            .items
            .into_iter()
            .map(|l| RequestedLine {
                product_id: l.product_id,
                quantity: l.quantity,
            })
            .collect(),
        payment_method: req.payment_type,
        discount_cents: req.discount,
        payment_received_cents: req.payment_received,
    };

    let recorded = state
        .db
        .sales()
        .record(new_sale, state.config.tax_rate())
        .await?;

    info!(
        receipt_code = %recorded.sale.receipt_code,
        cashier_id = %user.id,
        "Sale recorded"
    );

    // Post-commit, best-effort: never fails the response
    qr::emit_receipt_qr(&state, &recorded.sale.id, &recorded.sale.receipt_code).await;

    // Re-read to include the backfilled QR fields when the emitter
    // succeeded; fall back to the committed sale when it didn't.
    let response = state
        .db
        .sales()
        .get_by_id(&recorded.sale.id)
        .await
        .ok()
        .flatten()
        .unwrap_or(recorded);

    Ok(Json(response))
}

/// `GET /sales` — authenticated sale history, newest first.
pub async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<SaleListQuery>,
) -> ApiResult<Json<Page<ListedSale>>> {
    let filter = SaleFilter {
        user_id: None,
        date_from: query.date_from,
        date_to: query.date_to,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(DEFAULT_PER_PAGE),
    };

    let page = state.db.sales().list(&filter).await?;
    Ok(Json(page))
}

/// `GET /sales/{id}` — authenticated.
pub async fn show(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let sale = state
        .db
        .sales()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Sale".to_string()))?;

    Ok(Json(json!(sale)))
}

fn validate_create(req: &CreateSale) -> Result<(), ApiError> {
    let mut errors: Vec<ValidationError> = Vec::new();

    if let Err(e) = validation::validate_sale_line_count(req.items.len()) {
        errors.push(e);
    }
    for line in &req.items {
        if let Err(e) = validation::validate_quantity(line.quantity) {
            errors.push(e);
        }
    }
    if let Err(e) = validation::validate_discount_cents(req.discount) {
        errors.push(e);
    }
    if let Some(received) = req.payment_received {
        if let Err(e) = validation::validate_payment_received_cents(received) {
            errors.push(e);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

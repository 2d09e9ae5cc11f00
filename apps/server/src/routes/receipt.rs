//! Public receipt lookup: JSON for the app, HTML for printing.
//!
//! These routes are what the QR code on a printed receipt points at, so
//! they require no authentication.

use axum::extract::{Path, State};
use axum::response::Html;
use axum::Json;

use brewpos_core::Money;
use brewpos_db::repository::sale::SaleWithItems;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `GET /receipt/{code}` — JSON receipt by receipt code.
pub async fn show(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<SaleWithItems>> {
    let sale = state
        .db
        .sales()
        .get_by_receipt_code(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Receipt".to_string()))?;

    Ok(Json(sale))
}

/// `GET /receipt/{code}/page` — server-rendered printable receipt.
pub async fn page(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Html<String>> {
    let sale = state
        .db
        .sales()
        .get_by_receipt_code(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Receipt".to_string()))?;

    Ok(Html(render_receipt(&sale)))
}

fn render_receipt(sale: &SaleWithItems) -> String {
    let mut rows = String::new();
    for item in &sale.items {
        rows.push_str(&format!(
            "<tr><td>{}</td><td class=\"n\">{}</td><td class=\"n\">{}</td><td class=\"n\">{}</td></tr>\n",
            escape(&item.product_name),
            item.quantity,
            Money::from_cents(item.unit_price_cents),
            Money::from_cents(item.line_total_cents),
        ));
    }

    let s = &sale.sale;
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Receipt {code}</title>
<style>
  body {{ font-family: monospace; max-width: 380px; margin: 2em auto; }}
  h1 {{ font-size: 1.2em; text-align: center; }}
  table {{ width: 100%; border-collapse: collapse; }}
  td, th {{ padding: 2px 4px; text-align: left; }}
  .n {{ text-align: right; }}
  .totals td {{ border-top: 1px dashed #000; }}
  .grand {{ font-weight: bold; }}
  .meta {{ text-align: center; color: #555; margin-top: 1em; }}
  @media print {{ .meta .noprint {{ display: none; }} }}
</style>
</head>
<body>
<h1>BrewPOS</h1>
<p class="meta">{code}<br>{date}</p>
<table>
<tr><th>Item</th><th class="n">Qty</th><th class="n">Price</th><th class="n">Total</th></tr>
{rows}
<tr class="totals"><td colspan="3">Subtotal</td><td class="n">{subtotal}</td></tr>
<tr><td colspan="3">Discount</td><td class="n">-{discount}</td></tr>
<tr><td colspan="3">Tax</td><td class="n">{tax}</td></tr>
<tr class="grand"><td colspan="3">Total</td><td class="n">{total}</td></tr>
<tr><td colspan="3">Paid ({method:?})</td><td class="n">{received}</td></tr>
<tr><td colspan="3">Change</td><td class="n">{change}</td></tr>
</table>
<p class="meta">Thank you for your visit!<br><span class="noprint"><a href="javascript:window.print()">Print</a></span></p>
</body>
</html>"#,
        code = escape(&s.receipt_code),
        date = s.created_at.format("%Y-%m-%d %H:%M UTC"),
        rows = rows,
        subtotal = Money::from_cents(s.subtotal_cents),
        discount = Money::from_cents(s.discount_cents),
        tax = Money::from_cents(s.tax_cents),
        total = Money::from_cents(s.total_cents),
        method = s.payment_method,
        received = Money::from_cents(s.payment_received_cents),
        change = Money::from_cents(s.change_cents),
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

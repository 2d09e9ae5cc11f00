//! QR receipt emitter.
//!
//! After a sale commits, a QR code pointing at the public receipt URL is
//! rendered to a PNG and its path backfilled onto the sale row. The
//! whole step is best-effort: the sale is already committed, so any
//! failure here is logged and swallowed.

use image::Luma;
use qrcode::QrCode;
use tracing::{info, warn};

use crate::state::AppState;

/// Renders and stores the QR artifact for a committed sale, then
/// backfills `qr_code_path` and `receipt_url`. Never fails the caller.
pub async fn emit_receipt_qr(state: &AppState, sale_id: &str, receipt_code: &str) {
    let receipt_url = format!("{}/receipt/{}", state.config.public_base_url, receipt_code);
    let relative_path = format!("qrcodes/{receipt_code}.png");

    if let Err(e) = render_to_file(state, &receipt_url, &relative_path) {
        warn!(
            receipt_code = %receipt_code,
            error = %e,
            "QR render failed, sale committed without artifact"
        );
        return;
    }

    match state
        .db
        .sales()
        .set_qr_artifact(sale_id, &relative_path, &receipt_url)
        .await
    {
        Ok(()) => info!(receipt_code = %receipt_code, "QR receipt artifact stored"),
        Err(e) => {
            warn!(
                receipt_code = %receipt_code,
                error = %e,
                "QR artifact backfill failed, sale committed without it"
            );
            state.storage.delete_quietly(&relative_path);
        }
    }
}

fn render_to_file(
    state: &AppState,
    url: &str,
    relative_path: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let code = QrCode::new(url.as_bytes())?;
    let png = code
        .render::<Luma<u8>>()
        .min_dimensions(300, 300)
        .build();

    let path = state.storage.prepare(relative_path)?;
    png.save(&path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qr_renders_for_receipt_url() {
        let code = QrCode::new(b"http://localhost:3000/receipt/RCP-20260819-A1B2C3").unwrap();
        let png = code.render::<Luma<u8>>().min_dimensions(300, 300).build();

        assert!(png.width() >= 300);
        assert!(png.height() >= 300);
    }
}

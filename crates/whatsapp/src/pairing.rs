//! Pairing token rendering.
//!
//! First-time authentication needs an operator to scan a QR code with the
//! phone that owns the account. We only surface the token; nothing here acts
//! on it.

use {
    qrcode::{QrCode, render::unicode},
    tracing::{info, warn},
};

/// Render a pairing token as a compact terminal QR code.
pub fn render_qr(token: &str) -> Option<String> {
    let code = QrCode::new(token.as_bytes()).ok()?;
    Some(
        code.render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .quiet_zone(true)
            .build(),
    )
}

/// Write the pairing token to the log sink, optionally as a scannable code.
pub fn announce(token: &str, render: bool) {
    warn!(token = %token, "whatsapp pairing required: scan the QR code with the linked phone");
    if !render {
        return;
    }
    match render_qr(token) {
        Some(qr) => info!("whatsapp pairing code:\n{qr}"),
        None => warn!(len = token.len(), "pairing token too long to render as QR code"),
    }
}

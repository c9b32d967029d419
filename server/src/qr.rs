//! Share link and QR code rendering.

use axum::http::HeaderMap;
use qrcodegen::{QrCode, QrCodeEcc};
use std::fmt::Write;

pub const DEFAULT_QR_SIZE: u32 = 200;
pub const MIN_QR_SIZE: u32 = 64;
pub const MAX_QR_SIZE: u32 = 1024;

const BORDER_MODULES: i32 = 2;
const LIGHT: &str = "#f8fcff";
const DARK: &str = "#0a1018";

#[derive(Debug, thiserror::Error)]
#[error("payload is too long for a QR code")]
pub struct QrTooLong;

/// Render `payload` as a square SVG document `size_px` wide.
pub fn render_svg(payload: &str, size_px: u32) -> Result<String, QrTooLong> {
    let qr = QrCode::encode_text(payload, QrCodeEcc::Medium).map_err(|_| QrTooLong)?;
    let size_px = size_px.clamp(MIN_QR_SIZE, MAX_QR_SIZE);
    let qr_size = qr.size();
    let total_modules = qr_size + BORDER_MODULES * 2;

    // Drawn in module units; the viewBox scales it to size_px
    let mut path = String::new();
    for y in 0..qr_size {
        for x in 0..qr_size {
            if qr.get_module(x, y) {
                let _ = write!(
                    path,
                    "M{},{}h1v1h-1z",
                    x + BORDER_MODULES,
                    y + BORDER_MODULES
                );
            }
        }
    }

    Ok(format!(
        concat!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" ",
            "width=\"{size}\" height=\"{size}\" viewBox=\"0 0 {n} {n}\" ",
            "shape-rendering=\"crispEdges\">",
            "<rect width=\"100%\" height=\"100%\" fill=\"{light}\"/>",
            "<path d=\"{path}\" fill=\"{dark}\"/>",
            "</svg>\n"
        ),
        size = size_px,
        n = total_modules,
        light = LIGHT,
        dark = DARK,
        path = path,
    ))
}

/// URL players should share: configured public URL, else the request host.
pub fn share_url(public_url: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(url) = public_url {
        return url.to_string();
    }
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or("localhost:3000");
    format!("http://{}/", host)
}

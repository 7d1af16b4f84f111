//! Image encoding: `DynamicImage` → PNG bytes, and PNG → base64 data-URI.
//!
//! PNG is lossless, which keeps rendered glyph edges crisp for the OCR
//! service. The same bytes feed the report previews.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

pub const PNG_MIME: &str = "image/png";

/// Encode a rasterised page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} PNG bytes", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Wrap PNG bytes in a `data:` URI suitable for an `<img src>`.
pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:{};base64,{}", PNG_MIME, STANDARD.encode(png))
}

/// Encode a page straight to a preview data-URI.
pub fn preview_data_uri(img: &DynamicImage) -> Result<String, image::ImageError> {
    encode_png(img).map(|png| png_data_uri(&png))
}

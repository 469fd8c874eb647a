//! Image encoding: `DynamicImage` → JPEG or PNG bytes.
//!
//! Pages are flattened to RGB before encoding: JPEG has no alpha channel and
//! pdfium renders onto an opaque white background anyway.

use crate::config::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page. `quality` applies to JPEG only.
pub fn encode_page(
    img: &DynamicImage,
    format: ImageFormat,
    quality: u8,
) -> Result<Vec<u8>, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();

    match format {
        ImageFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
            encoder.encode_image(&rgb)?;
        }
        ImageFormat::Png => {
            DynamicImage::ImageRgb8(rgb)
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        }
    }

    debug!("Encoded {} image → {} bytes", format, buf.len());
    Ok(buf)
}

//! PNG payload checks.
//!
//! Tiles are cached and served as opaque bytes. Before anything is written to
//! disk the payload is checked to be a PNG with a readable header, so a cache
//! entry is never a truncated or foreign blob.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use crate::error::RenderError;

/// Content type of every tile response.
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Check that `data` is a PNG image and return its dimensions.
///
/// Only the signature and the header chunk are inspected; pixel data is not
/// decoded.
pub fn validate_png(data: &[u8]) -> Result<(u32, u32), RenderError> {
    match image::guess_format(data) {
        Ok(ImageFormat::Png) => {}
        Ok(other) => {
            return Err(RenderError::InvalidImage(format!(
                "expected PNG, got {:?}",
                other
            )))
        }
        Err(_) => {
            return Err(RenderError::InvalidImage(
                "unrecognized image signature".to_string(),
            ))
        }
    }

    ImageReader::with_format(Cursor::new(data), ImageFormat::Png)
        .into_dimensions()
        .map_err(|e| RenderError::InvalidImage(e.to_string()))
}

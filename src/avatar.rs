use std::io::Cursor;

use image::{imageops::FilterType, ImageFormat};
use tracing::debug;

use crate::error::AppError;

/// Uploads above this size are rejected before decoding.
pub const MAX_AVATAR_BYTES: usize = 1_000_000;

/// Stored avatars are square PNGs of this side length.
pub const AVATAR_SIDE: u32 = 250;

fn is_supported_type(declared_type: &str) -> bool {
    matches!(
        declared_type,
        "image/jpeg" | "image/jpg" | "image/png"
    )
}

/// Validate and re-encode an uploaded image to the canonical stored form:
/// a 250x250 PNG, cropped to fill. The declared content type and the actual
/// bytes both have to check out.
pub fn normalize(raw: &[u8], declared_type: &str) -> Result<Vec<u8>, AppError> {
    if !is_supported_type(declared_type) {
        return Err(AppError::Validation(
            "avatar must be a jpg or png image".into(),
        ));
    }
    if raw.len() > MAX_AVATAR_BYTES {
        return Err(AppError::Validation("avatar larger than 1MB".into()));
    }

    let img = image::load_from_memory(raw)
        .map_err(|_| AppError::Validation("could not decode avatar image".into()))?;

    let resized = img.resize_to_fill(AVATAR_SIDE, AVATAR_SIDE, FilterType::Triangle);

    let mut out = Cursor::new(Vec::new());
    resized
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("png encode failed: {e}")))?;

    let out = out.into_inner();
    debug!(input_len = raw.len(), output_len = out.len(), "avatar normalized");
    Ok(out)
}

//! Face-region geometry: margin expansion, crop and resize to the fixed
//! square resolution the recognizer model is trained at.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use crate::error::{AttendanceError, Result};

/// Axis-aligned rectangle in detector (pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Grow `rect` by `margin` on every side, clamped to the image.
///
/// The origin is clamped at zero first and the size is then capped by the
/// remaining extent, so a face touching the left/top edge keeps the full
/// `2 * margin` of growth towards the right/bottom.
pub fn expand_rect(rect: FaceRect, margin: i32, img_w: u32, img_h: u32) -> FaceRect {
    let img_w = img_w as i32;
    let img_h = img_h as i32;
    let x = rect.x.saturating_sub(margin).max(0);
    let y = rect.y.saturating_sub(margin).max(0);
    let width = rect.width.saturating_add(margin.saturating_mul(2)).min(img_w - x);
    let height = rect.height.saturating_add(margin.saturating_mul(2)).min(img_h - y);
    FaceRect { x, y, width, height }
}

/// Crop `rect` (expanded by `margin`) out of `image` and resize it to
/// `size x size`.
pub fn normalize_region(image: &GrayImage, rect: FaceRect, margin: i32, size: u32) -> Result<GrayImage> {
    let r = expand_rect(rect, margin, image.width(), image.height());
    if r.is_empty() {
        return Err(AttendanceError::InvalidImage(format!(
            "face rectangle {:?} lies outside the {}x{} image",
            rect,
            image.width(),
            image.height()
        )));
    }
    let crop = imageops::crop_imm(image, r.x as u32, r.y as u32, r.width as u32, r.height as u32).to_image();
    Ok(imageops::resize(&crop, size, size, FilterType::Triangle))
}

pub fn to_grayscale(image: DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray,
        other => other.to_luma8(),
    }
}

/// Decode an encoded image (jpeg/png/...) into grayscale.
pub fn decode_gray(bytes: &[u8]) -> Result<GrayImage> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| AttendanceError::InvalidImage(format!("failed to decode image: {}", e)))?;
    let gray = to_grayscale(decoded);
    ensure_not_empty(&gray)?;
    Ok(gray)
}

pub fn ensure_not_empty(image: &GrayImage) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(AttendanceError::InvalidImage("empty frame".to_string()));
    }
    Ok(())
}

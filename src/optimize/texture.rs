//! Texture downsampling

use image::imageops::{self, FilterType};
use image::RgbaImage;

use super::OptimizedTexture;
use crate::loader::{LoadFailure, RawTexture};

/// Shrink a texture by `scale` (clamped to `(0, 1]`), never below 1x1
pub fn downsample(texture: RawTexture, scale: f32) -> Result<OptimizedTexture, LoadFailure> {
    let RawTexture {
        width,
        height,
        rgba,
    } = texture;

    let expected = width as usize * height as usize * 4;
    if width == 0 || height == 0 || rgba.len() != expected {
        return Err(LoadFailure::Parse(format!(
            "texture {width}x{height} has {} bytes, expected {expected}",
            rgba.len()
        )));
    }

    let scale = if scale.is_finite() { scale.clamp(0.0, 1.0) } else { 1.0 };
    let target_width = ((width as f32 * scale).round() as u32).max(1);
    let target_height = ((height as f32 * scale).round() as u32).max(1);

    if target_width == width && target_height == height {
        return Ok(OptimizedTexture {
            width,
            height,
            rgba,
        });
    }

    let image = RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| LoadFailure::Parse("texture buffer too small".to_string()))?;
    let resized = imageops::resize(&image, target_width, target_height, FilterType::Triangle);

    Ok(OptimizedTexture {
        width: target_width,
        height: target_height,
        rgba: resized.into_raw(),
    })
}

use image::{RgbaImage, imageops, imageops::FilterType};
use thiserror::Error;
use tracing::debug;

use super::compositor::anchor;
use super::types::{OverlaySpec, Position};

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("No overlay image configured")]
    MissingPath,

    #[error("Overlay image has no pixels")]
    EmptyImage,

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),
}

/// Scale the overlay to `size_ratio_percent` of the canvas width, fade its alpha by
/// the overlay opacity and blend it centered on `position`.
pub(super) fn draw_image_watermark(
    canvas: &mut RgbaImage,
    overlay: &OverlaySpec,
    position: Position,
) -> Result<(), OverlayError> {
    let path = overlay.path.as_ref().ok_or(OverlayError::MissingPath)?;
    let logo = image::open(path)?.to_rgba8();
    if logo.width() == 0 || logo.height() == 0 {
        return Err(OverlayError::EmptyImage);
    }

    let (target_width, target_height) = overlay_size(
        canvas.width(),
        logo.dimensions(),
        overlay.size_ratio_percent,
    );
    debug!(
        "Scaling overlay {:?} from {}x{} to {}x{}",
        path,
        logo.width(),
        logo.height(),
        target_width,
        target_height
    );

    let mut resized = imageops::resize(&logo, target_width, target_height, FilterType::Lanczos3);
    fade_alpha(&mut resized, overlay.opacity);

    let (x, y) = anchor(position, canvas.dimensions(), resized.dimensions());
    imageops::overlay(canvas, &resized, x, y);
    Ok(())
}

/// Width is a percentage of the canvas width; height keeps the overlay's aspect ratio.
pub fn overlay_size(canvas_width: u32, overlay: (u32, u32), ratio_percent: u8) -> (u32, u32) {
    let (w, h) = overlay;
    let target_width = (canvas_width as u64 * ratio_percent as u64 / 100).max(1);
    let target_height = (h as u64 * target_width / w.max(1) as u64).max(1);
    (target_width as u32, target_height as u32)
}

/// Multiply every pixel's alpha by `opacity / 255`.
fn fade_alpha(image: &mut RgbaImage, opacity: u8) {
    if opacity == u8::MAX {
        return;
    }
    for pixel in image.pixels_mut() {
        pixel[3] = ((pixel[3] as u32 * opacity as u32 + 127) / 255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_overlay_size_preserves_aspect_ratio() {
        assert_eq!(overlay_size(1000, (400, 200), 20), (200, 100));
        assert_eq!(overlay_size(200, (50, 100), 50), (100, 200));
        // Never collapses to zero
        assert_eq!(overlay_size(10, (1000, 1), 5), (1, 1));
    }

    #[test]
    fn test_fade_alpha_scales_existing_alpha() {
        let mut img = RgbaImage::from_pixel(1, 2, Rgba([1, 2, 3, 255]));
        img.put_pixel(0, 1, Rgba([1, 2, 3, 100]));
        fade_alpha(&mut img, 128);
        assert_eq!(img.get_pixel(0, 0)[3], 128);
        assert_eq!(img.get_pixel(0, 1)[3], 50);
        assert_eq!(img.get_pixel(0, 0)[0], 1);
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let mut canvas = RgbaImage::new(4, 4);
        let result = draw_image_watermark(&mut canvas, &OverlaySpec::default(), Position::CENTER);
        assert!(matches!(result, Err(OverlayError::MissingPath)));
    }
}

use image::DynamicImage;
use tracing::{debug, error};

use super::overlay::draw_image_watermark;
use super::text::draw_text_watermark;
use super::types::{Position, WatermarkKind, WatermarkSpec};
use crate::font::FontResolver;

/// Anything that can turn a source image plus a spec into a watermarked image.
///
/// Implementations must be pure with respect to their inputs: the same source and
/// spec always produce the same pixels.
pub trait Render {
    fn render(&mut self, source: &DynamicImage, spec: &WatermarkSpec) -> DynamicImage;
}

/// Draws text and image watermarks. Never fails: any problem degrades to a fallback
/// font or to returning the source unchanged.
pub struct Compositor {
    fonts: FontResolver,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(FontResolver::new())
    }
}

impl Compositor {
    pub fn new(fonts: FontResolver) -> Self {
        Self { fonts }
    }
}

impl Render for Compositor {
    fn render(&mut self, source: &DynamicImage, spec: &WatermarkSpec) -> DynamicImage {
        let spec = spec.normalized();
        if spec.is_noop() {
            debug!("Watermark spec is a no-op, returning source unchanged");
            return source.clone();
        }

        let mut canvas = source.to_rgba8();

        match spec.kind {
            WatermarkKind::Text => {
                let font = self.fonts.resolve(
                    &spec.font.family,
                    spec.font.size,
                    spec.font.bold,
                    spec.font.italic,
                );
                if !draw_text_watermark(&mut canvas, &spec, &font) {
                    return source.clone();
                }
            }
            WatermarkKind::Image => {
                if let Err(e) = draw_image_watermark(&mut canvas, &spec.overlay, spec.position) {
                    error!("Failed to apply image watermark: {}", e);
                    return source.clone();
                }
            }
        }

        DynamicImage::ImageRgba8(canvas)
    }
}

/// Top-left corner for content of size `content` centered on `position`, shifted so the
/// content stays inside `canvas`. Content larger than the canvas is pinned to the origin.
pub fn anchor(position: Position, canvas: (u32, u32), content: (u32, u32)) -> (i64, i64) {
    let position = position.clamped();
    let place = |pos: f32, extent: u32, size: u32| -> i64 {
        let max = extent.saturating_sub(size) as f64;
        let centered = pos as f64 * extent as f64 - size as f64 / 2.0;
        centered.clamp(0.0, max).round() as i64
    };

    (
        place(position.x, canvas.0, content.0),
        place(position.y, canvas.1, content.1),
    )
}

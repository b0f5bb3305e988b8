// Watermark model and compositing - text and image overlays drawn onto a source image
mod compositor;
mod overlay;
mod text;
mod types;

pub use compositor::{Compositor, Render, anchor};
pub use overlay::{OverlayError, overlay_size};
pub use text::{LARGE_TEXT_SIZE, SHADOW_OFFSET, stroke_offsets};
pub use types::{
    FontSpec, MAX_FONT_SIZE, MAX_SIZE_RATIO_PERCENT, MAX_STROKE_WIDTH, MIN_FONT_SIZE,
    MIN_SIZE_RATIO_PERCENT, MIN_STROKE_WIDTH, OverlaySpec, Position, StrokeSpec, WatermarkKind,
    WatermarkSpec,
};

#[cfg(test)]
mod tests {
    mod compositor_tests;
}

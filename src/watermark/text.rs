use image::{GrayImage, Luma, Rgb, RgbaImage};

use super::compositor::anchor;
use super::types::WatermarkSpec;
use crate::font::FontHandle;

/// Font size from which the stroke uses the full square ring instead of four directions.
pub const LARGE_TEXT_SIZE: u32 = 40;
/// Ring radius cap for large text, bounding the number of stroke offsets.
pub const MAX_LARGE_STROKE_OFFSET: i32 = 3;
/// Shadow offset in pixels, down and to the right.
pub const SHADOW_OFFSET: i64 = 2;

const SHADOW_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Draw the text watermark described by `spec` onto `canvas`.
///
/// Returns false when the text produced no ink and the canvas was left alone.
pub(super) fn draw_text_watermark(
    canvas: &mut RgbaImage,
    spec: &WatermarkSpec,
    font: &FontHandle,
) -> bool {
    let mask = font.rasterize(&spec.text);
    if mask.width() == 0 || mask.height() == 0 {
        return false;
    }

    let (x, y) = anchor(spec.position, canvas.dimensions(), mask.dimensions());
    let alpha = spec.opacity;

    // Stroke wins over shadow; they are never drawn together
    if spec.stroke.enabled {
        let offsets = stroke_offsets(spec.stroke.width, spec.font.size);
        let (ring, reach) = spread(&mask, &offsets);
        let reach = reach as i64;
        stamp(canvas, &ring, x - reach, y - reach, spec.stroke.color.resolve(), alpha);
    } else if spec.shadow {
        stamp(
            canvas,
            &mask,
            x + SHADOW_OFFSET,
            y + SHADOW_OFFSET,
            SHADOW_COLOR,
            alpha / 2,
        );
    }

    stamp(canvas, &mask, x, y, spec.color.resolve(), alpha);
    true
}

/// Offsets at which the stroke color is drawn around the text.
pub fn stroke_offsets(width: u8, font_size: u32) -> Vec<(i32, i32)> {
    let width = width.max(1) as i32;
    let mut offsets = Vec::new();

    if font_size < LARGE_TEXT_SIZE {
        for d in 1..=width {
            offsets.extend([(d, 0), (-d, 0), (0, d), (0, -d)]);
        }
    } else {
        let reach = width.min(MAX_LARGE_STROKE_OFFSET);
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                if (dx, dy) != (0, 0) {
                    offsets.push((dx, dy));
                }
            }
        }
    }

    offsets
}

/// Union of `mask` shifted by each offset, so overlapping passes never stack alpha.
/// Returns the grown mask and how far it extends past the original on each side.
fn spread(mask: &GrayImage, offsets: &[(i32, i32)]) -> (GrayImage, u32) {
    let reach = offsets
        .iter()
        .map(|(dx, dy)| dx.unsigned_abs().max(dy.unsigned_abs()))
        .max()
        .unwrap_or(0);

    let (w, h) = mask.dimensions();
    let mut grown = GrayImage::new(w + 2 * reach, h + 2 * reach);

    for &(dx, dy) in offsets {
        for (mx, my, pixel) in mask.enumerate_pixels() {
            if pixel[0] == 0 {
                continue;
            }
            let tx = (mx as i64 + reach as i64 + dx as i64) as u32;
            let ty = (my as i64 + reach as i64 + dy as i64) as u32;
            let target = grown.get_pixel_mut(tx, ty);
            *target = Luma([target[0].max(pixel[0])]);
        }
    }

    (grown, reach)
}

/// Blend `color` through the coverage `mask` onto `canvas` at `(x, y)` with the given
/// alpha, clipping at the canvas edges.
pub(super) fn stamp(
    canvas: &mut RgbaImage,
    mask: &GrayImage,
    x: i64,
    y: i64,
    color: Rgb<u8>,
    alpha: u8,
) {
    if alpha == 0 {
        return;
    }

    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    for (mx, my, coverage) in mask.enumerate_pixels() {
        if coverage[0] == 0 {
            continue;
        }
        let tx = x + mx as i64;
        let ty = y + my as i64;
        if tx < 0 || ty < 0 || tx >= cw || ty >= ch {
            continue;
        }

        let src_alpha = (coverage[0] as u32 * alpha as u32 + 127) / 255;
        if src_alpha == 0 {
            continue;
        }

        let dst = canvas.get_pixel_mut(tx as u32, ty as u32);
        let sa = src_alpha as f32 / 255.0;
        let da = dst[3] as f32 / 255.0;
        let out_alpha = sa + da * (1.0 - sa);

        for c in 0..3 {
            let blended = (color[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_alpha;
            dst[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
        dst[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_small_text_strokes_in_four_directions() {
        let offsets = stroke_offsets(2, 20);
        assert_eq!(offsets.len(), 8);
        assert!(offsets.contains(&(2, 0)));
        assert!(offsets.contains(&(0, -2)));
        assert!(!offsets.contains(&(1, 1)));
    }

    #[test]
    fn test_large_text_stroke_ring_is_capped() {
        let offsets = stroke_offsets(5, 72);
        // 7x7 square minus the center
        assert_eq!(offsets.len(), 48);
        assert!(offsets.iter().all(|(dx, dy)| dx.abs() <= 3 && dy.abs() <= 3));

        assert_eq!(stroke_offsets(1, 72).len(), 8);
    }

    #[test]
    fn test_spread_grows_mask() {
        let mut mask = GrayImage::new(1, 1);
        mask.put_pixel(0, 0, Luma([200]));
        let (grown, reach) = spread(&mask, &stroke_offsets(1, 10));
        assert_eq!(reach, 1);
        assert_eq!(grown.dimensions(), (3, 3));
        assert_eq!(grown.get_pixel(0, 1)[0], 200);
        assert_eq!(grown.get_pixel(1, 1)[0], 0);
        assert_eq!(grown.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_stamp_blends_and_clips() {
        let mut canvas = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let mask = GrayImage::from_pixel(2, 2, Luma([255]));

        stamp(&mut canvas, &mask, 1, 1, Rgb([255, 255, 255]), 255);
        assert_eq!(*canvas.get_pixel(1, 1), Rgba([255, 255, 255, 255]));
        assert_eq!(*canvas.get_pixel(0, 0), Rgba([0, 0, 0, 255]));

        let mut canvas = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        stamp(&mut canvas, &GrayImage::from_pixel(1, 1, Luma([255])), 0, 0, Rgb([255, 0, 0]), 128);
        let px = canvas.get_pixel(0, 0);
        assert!((127..=129).contains(&px[0]));
        assert_eq!(px[3], 255);
    }

    #[test]
    fn test_stamp_zero_alpha_is_untouched() {
        let mut canvas = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 40]));
        let before = canvas.clone();
        stamp(&mut canvas, &GrayImage::from_pixel(2, 2, Luma([255])), 0, 0, Rgb([255, 0, 0]), 0);
        assert_eq!(canvas, before);
    }
}

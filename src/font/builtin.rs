use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::{GrayImage, Luma};

/// Pixel multiplier applied to the 8x8 glyphs. The built-in font has a fixed size.
pub const BUILTIN_SCALE: u32 = 2;

const GLYPH_SIZE: u32 = 8;

fn glyph_for(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Draw `text` with the built-in bitmap font into a coverage mask.
///
/// Lines are split on `\n`. The mask is not cropped; callers trim it to the ink bounds.
pub fn rasterize(text: &str) -> GrayImage {
    let cell = GLYPH_SIZE * BUILTIN_SCALE;
    let line_height = cell + BUILTIN_SCALE;
    let lines: Vec<&str> = text.lines().collect();
    let columns = lines
        .iter()
        .map(|line| line.chars().count() as u32)
        .max()
        .unwrap_or(0);

    if columns == 0 {
        return GrayImage::new(0, 0);
    }

    let mut mask = GrayImage::new(columns * cell, lines.len() as u32 * line_height);

    for (row_idx, line) in lines.iter().enumerate() {
        let top = row_idx as u32 * line_height;
        for (col_idx, ch) in line.chars().enumerate() {
            let left = col_idx as u32 * cell;
            let glyph = glyph_for(ch);
            for (gy, bits) in glyph.iter().enumerate() {
                for gx in 0..GLYPH_SIZE {
                    if (bits >> gx) & 1 == 0 {
                        continue;
                    }
                    let base_x = left + gx * BUILTIN_SCALE;
                    let base_y = top + gy as u32 * BUILTIN_SCALE;
                    for dy in 0..BUILTIN_SCALE {
                        for dx in 0..BUILTIN_SCALE {
                            mask.put_pixel(base_x + dx, base_y + dy, Luma([255]));
                        }
                    }
                }
            }
        }
    }

    mask
}

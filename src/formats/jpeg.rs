use image::{DynamicImage, ImageEncoder, Rgba, RgbaImage, codecs::jpeg::JpegEncoder, imageops};
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

use crate::export::ExportError;

/// Composite onto opaque white, since JPEG has no alpha channel.
pub fn flatten_onto_white(image: &DynamicImage) -> image::RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut background =
        RgbaImage::from_pixel(rgba.width(), rgba.height(), Rgba([255, 255, 255, 255]));
    imageops::overlay(&mut background, &rgba, 0, 0);
    DynamicImage::ImageRgba8(background).to_rgb8()
}

/// Save image as a 3-channel JPEG at the given quality (1-100).
pub fn save(image: &DynamicImage, path: &Path, quality: u8) -> Result<(), ExportError> {
    let rgb_image = flatten_onto_white(image);
    let output = BufWriter::new(std::fs::File::create(path)?);

    let encoder = JpegEncoder::new_with_quality(output, quality.clamp(1, 100));
    encoder.write_image(
        &rgb_image,
        rgb_image.width(),
        rgb_image.height(),
        image::ExtendedColorType::Rgb8,
    )?;

    debug!("JPEG written to {:?} at quality {}", path, quality);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_transparent_becomes_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
        let flat = flatten_onto_white(&img);
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_flatten_keeps_opaque_pixels() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255])));
        let flat = flatten_onto_white(&img);
        assert_eq!(flat.get_pixel(1, 1).0, [10, 20, 30]);
    }
}

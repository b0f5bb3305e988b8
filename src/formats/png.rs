use image::{DynamicImage, codecs::png::PngEncoder};
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

use crate::export::ExportError;

/// Save image as an RGBA PNG, keeping any transparency.
pub fn save(image: &DynamicImage, path: &Path) -> Result<(), ExportError> {
    let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
    let output = BufWriter::new(std::fs::File::create(path)?);
    let encoder = PngEncoder::new(output);
    rgba.write_with_encoder(encoder)?;
    debug!("PNG written to {:?}", path);
    Ok(())
}

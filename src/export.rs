use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::formats::{self, ExportFormat, is_supported_image};
use crate::watermark::{Render, WatermarkSpec};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("No export directory has been chosen yet")]
    NoExportDirectory,

    #[error("Refusing to overwrite the source image: {0}")]
    WouldOverwriteSource(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),
}

/// Where exported files are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    #[default]
    AlongsideSource,
    LastExportDirectory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSpec {
    pub format: ExportFormat,
    /// JPEG quality 1-100, ignored for PNG
    pub quality: u8,
    pub use_suffix: bool,
    pub suffix: String,
    pub destination: Destination,
}

impl Default for ExportSpec {
    fn default() -> Self {
        Self {
            format: ExportFormat::Jpeg,
            quality: 90,
            use_suffix: true,
            suffix: "_watermarked".to_string(),
            destination: Destination::AlongsideSource,
        }
    }
}

/// `{baseName}{suffix?}.{ext}` for the given source.
pub fn output_file_name(source: &Path, export: &ExportSpec) -> String {
    let base = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let suffix = if export.use_suffix {
        export.suffix.as_str()
    } else {
        ""
    };
    format!("{}{}.{}", base, suffix, export.format.extension())
}

/// Full output path according to the destination policy.
pub fn output_path(
    source: &Path,
    export: &ExportSpec,
    last_export_dir: Option<&Path>,
) -> Result<PathBuf, ExportError> {
    let directory = match export.destination {
        Destination::AlongsideSource => source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
        Destination::LastExportDirectory => last_export_dir
            .map(Path::to_path_buf)
            .ok_or(ExportError::NoExportDirectory)?,
    };

    let path = directory.join(output_file_name(source, export));
    if path == source {
        return Err(ExportError::WouldOverwriteSource(path));
    }
    Ok(path)
}

/// Encode `image` to `path` in the export format. Not atomic: a failure can leave a
/// partial file behind.
pub fn write_image(
    image: &DynamicImage,
    path: &Path,
    export: &ExportSpec,
) -> Result<(), ExportError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    match export.format {
        ExportFormat::Jpeg => formats::jpeg::save(image, path, export.quality),
        ExportFormat::Png => formats::png::save(image, path),
    }
}

/// Load the full-resolution source, apply the watermark and write the result.
pub fn export_image<R: Render>(
    renderer: &mut R,
    source_path: &Path,
    watermark: &WatermarkSpec,
    export: &ExportSpec,
    last_export_dir: Option<&Path>,
) -> Result<PathBuf, ExportError> {
    if !is_supported_image(source_path) {
        return Err(ExportError::UnsupportedFormat(source_path.to_path_buf()));
    }

    let destination = output_path(source_path, export, last_export_dir)?;

    let source = image::ImageReader::open(source_path)?
        .with_guessed_format()?
        .decode()?;
    let rendered = renderer.render(&source, watermark);

    write_image(&rendered, &destination, export)?;
    info!("Exported {:?} -> {:?}", source_path, destination);
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_name_with_and_without_suffix() {
        let mut export = ExportSpec::default();
        assert_eq!(
            output_file_name(Path::new("/photos/beach.jpeg"), &export),
            "beach_watermarked.jpg"
        );

        export.use_suffix = false;
        export.format = ExportFormat::Png;
        assert_eq!(output_file_name(Path::new("/photos/beach.jpeg"), &export), "beach.png");
    }

    #[test]
    fn test_output_path_destinations() {
        let source = Path::new("/photos/beach.jpg");
        let export = ExportSpec::default();
        assert_eq!(
            output_path(source, &export, Some(Path::new("/exports"))).unwrap(),
            PathBuf::from("/photos/beach_watermarked.jpg")
        );

        let export = ExportSpec {
            destination: Destination::LastExportDirectory,
            ..ExportSpec::default()
        };
        assert_eq!(
            output_path(source, &export, Some(Path::new("/exports"))).unwrap(),
            PathBuf::from("/exports/beach_watermarked.jpg")
        );
        assert!(matches!(
            output_path(source, &export, None),
            Err(ExportError::NoExportDirectory)
        ));
    }

    #[test]
    fn test_output_path_refuses_to_overwrite_source() {
        let export = ExportSpec {
            use_suffix: false,
            ..ExportSpec::default()
        };
        assert!(matches!(
            output_path(Path::new("/photos/beach.jpg"), &export, None),
            Err(ExportError::WouldOverwriteSource(_))
        ));
    }
}

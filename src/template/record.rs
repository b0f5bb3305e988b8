use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::color::ColorSpec;
use crate::export::{Destination, ExportSpec};
use crate::formats::ExportFormat;
use crate::watermark::{
    FontSpec, OverlaySpec, Position, StrokeSpec, WatermarkKind, WatermarkSpec,
};

fn default_overlay_size_ratio() -> u8 {
    OverlaySpec::default().size_ratio_percent
}

fn default_overlay_opacity() -> u8 {
    OverlaySpec::default().opacity
}

/// On-disk layout of a template or of the session settings: one flat TOML table.
///
/// The image-watermark fields were added later and default when missing so older
/// files still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    #[serde(default)]
    pub name: String,
    pub text: String,
    pub position_x: f32,
    pub position_y: f32,
    pub font_size: u32,
    pub opacity: u8,
    pub font_family: String,
    pub bold: bool,
    pub italic: bool,
    pub color: ColorSpec,
    pub shadow: bool,
    pub stroke: bool,
    pub stroke_width: u8,
    pub stroke_color: ColorSpec,
    pub export_format: ExportFormat,
    pub export_quality: u8,
    pub use_suffix: bool,
    pub suffix: String,
    pub save_to_source_dir: bool,
    #[serde(default)]
    pub use_image_watermark: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_path: Option<PathBuf>,
    #[serde(default = "default_overlay_size_ratio")]
    pub overlay_size_ratio: u8,
    #[serde(default = "default_overlay_opacity")]
    pub overlay_opacity: u8,
    /// Only written for the session settings record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_export_dir: Option<PathBuf>,
}

impl TemplateRecord {
    pub fn from_specs(name: &str, watermark: &WatermarkSpec, export: &ExportSpec) -> Self {
        Self {
            name: name.to_string(),
            text: watermark.text.clone(),
            position_x: watermark.position.x,
            position_y: watermark.position.y,
            font_size: watermark.font.size,
            opacity: watermark.opacity,
            font_family: watermark.font.family.clone(),
            bold: watermark.font.bold,
            italic: watermark.font.italic,
            color: watermark.color.clone(),
            shadow: watermark.shadow,
            stroke: watermark.stroke.enabled,
            stroke_width: watermark.stroke.width,
            stroke_color: watermark.stroke.color.clone(),
            export_format: export.format,
            export_quality: export.quality,
            use_suffix: export.use_suffix,
            suffix: export.suffix.clone(),
            save_to_source_dir: export.destination == Destination::AlongsideSource,
            use_image_watermark: watermark.kind == WatermarkKind::Image,
            overlay_path: watermark.overlay.path.clone(),
            overlay_size_ratio: watermark.overlay.size_ratio_percent,
            overlay_opacity: watermark.overlay.opacity,
            last_export_dir: None,
        }
    }

    pub fn watermark(&self) -> WatermarkSpec {
        WatermarkSpec {
            kind: if self.use_image_watermark {
                WatermarkKind::Image
            } else {
                WatermarkKind::Text
            },
            text: self.text.clone(),
            position: Position::new(self.position_x, self.position_y),
            opacity: self.opacity,
            font: FontSpec {
                family: self.font_family.clone(),
                size: self.font_size,
                bold: self.bold,
                italic: self.italic,
            },
            color: self.color.clone(),
            shadow: self.shadow,
            stroke: StrokeSpec {
                enabled: self.stroke,
                width: self.stroke_width,
                color: self.stroke_color.clone(),
            },
            overlay: OverlaySpec {
                path: self.overlay_path.clone(),
                size_ratio_percent: self.overlay_size_ratio,
                opacity: self.overlay_opacity,
            },
        }
        .normalized()
    }

    pub fn export(&self) -> ExportSpec {
        ExportSpec {
            format: self.export_format,
            quality: self.export_quality.clamp(1, 100),
            use_suffix: self.use_suffix,
            suffix: self.suffix.clone(),
            destination: if self.save_to_source_dir {
                Destination::AlongsideSource
            } else {
                Destination::LastExportDirectory
            },
        }
    }
}

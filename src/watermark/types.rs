use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::color::ColorSpec;

/// Font sizes in pixels. The upper bound keeps the text mask allocation bounded.
pub const MIN_FONT_SIZE: u32 = 1;
pub const MAX_FONT_SIZE: u32 = 1000;
pub const MIN_STROKE_WIDTH: u8 = 1;
pub const MAX_STROKE_WIDTH: u8 = 5;
pub const MIN_SIZE_RATIO_PERCENT: u8 = 5;
pub const MAX_SIZE_RATIO_PERCENT: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkKind {
    #[default]
    Text,
    Image,
}

/// Normalized anchor of the watermark's center, `(0,0)` top-left to `(1,1)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const CENTER: Position = Position { x: 0.5, y: 0.5 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Clamp both coordinates into `[0, 1]`. Non-finite values snap to the center.
    pub fn clamped(self) -> Self {
        let clamp = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.5 };
        Self {
            x: clamp(self.x),
            y: clamp(self.y),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::CENTER
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    /// Family name or a path to a font file
    pub family: String,
    pub size: u32,
    pub bold: bool,
    pub italic: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "Arial".to_string(),
            size: 36,
            bold: false,
            italic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeSpec {
    pub enabled: bool,
    pub width: u8,
    pub color: ColorSpec,
}

impl Default for StrokeSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            width: 2,
            color: ColorSpec::from("black"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySpec {
    pub path: Option<PathBuf>,
    /// Overlay width as a percentage of the source width
    pub size_ratio_percent: u8,
    pub opacity: u8,
}

impl Default for OverlaySpec {
    fn default() -> Self {
        Self {
            path: None,
            size_ratio_percent: 20,
            opacity: 255,
        }
    }
}

/// Everything needed to draw one watermark. Rebuilt by the caller on every edit and
/// only ever read by the compositor and caches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkSpec {
    pub kind: WatermarkKind,
    pub text: String,
    pub position: Position,
    /// Text alpha, 0-255
    pub opacity: u8,
    pub font: FontSpec,
    pub color: ColorSpec,
    pub shadow: bool,
    pub stroke: StrokeSpec,
    pub overlay: OverlaySpec,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            kind: WatermarkKind::Text,
            text: "Watermark".to_string(),
            position: Position::CENTER,
            opacity: 128,
            font: FontSpec::default(),
            color: ColorSpec::default(),
            shadow: false,
            stroke: StrokeSpec::default(),
            overlay: OverlaySpec::default(),
        }
    }
}

impl WatermarkSpec {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: WatermarkKind::Image,
            overlay: OverlaySpec {
                path: Some(path.into()),
                ..OverlaySpec::default()
            },
            ..Self::default()
        }
    }

    /// Copy with every numeric field forced into its valid range.
    pub fn normalized(&self) -> Self {
        let mut spec = self.clone();
        spec.position = spec.position.clamped();
        spec.font.size = spec.font.size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        spec.stroke.width = spec
            .stroke
            .width
            .clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH);
        spec.overlay.size_ratio_percent = spec
            .overlay
            .size_ratio_percent
            .clamp(MIN_SIZE_RATIO_PERCENT, MAX_SIZE_RATIO_PERCENT);
        spec
    }

    /// True when rendering would leave the source untouched.
    pub fn is_noop(&self) -> bool {
        match self.kind {
            WatermarkKind::Text => self.text.trim().is_empty() || self.opacity == 0,
            WatermarkKind::Image => self.overlay.path.is_none() || self.overlay.opacity == 0,
        }
    }
}

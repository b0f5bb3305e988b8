use image::Rgb;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fallback used whenever a color cannot be parsed. Rendering never aborts on a bad color.
pub const FALLBACK_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// A color as the user typed it: a CSS color name, a `#RGB`/`#RRGGBB` hex string,
/// or a 3/4-tuple of channel values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Name(String),
    Channels(Vec<f64>),
}

impl ColorSpec {
    pub fn resolve(&self) -> Rgb<u8> {
        resolve_color(self)
    }
}

impl Default for ColorSpec {
    fn default() -> Self {
        ColorSpec::Name("white".to_string())
    }
}

impl From<&str> for ColorSpec {
    fn from(value: &str) -> Self {
        ColorSpec::Name(value.to_string())
    }
}

impl From<String> for ColorSpec {
    fn from(value: String) -> Self {
        ColorSpec::Name(value)
    }
}

impl From<(u8, u8, u8)> for ColorSpec {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        ColorSpec::Channels(vec![r as f64, g as f64, b as f64])
    }
}

/// Normalize a color spec into an 8-bit RGB triple.
///
/// Unparseable input resolves to white instead of failing.
pub fn resolve_color(spec: &ColorSpec) -> Rgb<u8> {
    let resolved = match spec {
        ColorSpec::Name(text) => parse_color_str(text),
        ColorSpec::Channels(channels) => parse_channels(channels),
    };

    resolved.unwrap_or_else(|| {
        debug!("Unrecognized color {:?}, using white", spec);
        FALLBACK_COLOR
    })
}

fn parse_color_str(input: &str) -> Option<Rgb<u8>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Alpha from #RRGGBBAA or rgba() is dropped
    trimmed
        .parse::<csscolorparser::Color>()
        .ok()
        .map(|color| {
            let [r, g, b, _] = color.to_rgba8();
            Rgb([r, g, b])
        })
}

fn parse_channels(channels: &[f64]) -> Option<Rgb<u8>> {
    if !(channels.len() == 3 || channels.len() == 4) {
        return None;
    }
    if channels.iter().any(|c| !c.is_finite()) {
        return None;
    }

    let clamp = |v: f64| v.round().clamp(0.0, 255.0) as u8;
    Some(Rgb([clamp(channels[0]), clamp(channels[1]), clamp(channels[2])]))
}

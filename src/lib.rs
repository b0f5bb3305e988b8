use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod color;
pub mod export;
pub mod font;
pub mod formats;
pub mod preview;
pub mod session;
pub mod startup_checks;
pub mod template;
pub mod watermark;

pub use color::{ColorSpec, resolve_color};
pub use export::{Destination, ExportError, ExportSpec, export_image};
pub use font::{FontHandle, FontResolver};
pub use formats::ExportFormat;
pub use preview::{Debouncer, PreviewCache, PreviewError};
pub use session::{Session, SessionError};
pub use template::{SessionSettings, TemplateError, TemplateStore};
pub use watermark::{Compositor, Position, Render, WatermarkKind, WatermarkSpec};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub app: AppConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub fonts: FontConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Holds `templates/` and `session.toml`
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FontConfig {
    /// Directories searched for font files. Empty means the platform defaults.
    #[serde(default)]
    pub search_directories: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreviewConfig {
    /// Quiet period after the last edit before a preview is rendered
    pub debounce_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig {
                name: "Photomark".to_string(),
                log_level: "info".to_string(),
            },
            storage: StorageConfig {
                directory: PathBuf::from(".photomark"),
            },
            fonts: FontConfig::default(),
            preview: PreviewConfig::default(),
        }
    }
}

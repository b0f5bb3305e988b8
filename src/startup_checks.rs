use crate::Config;
use crate::font::platform_font_dirs;
use crate::template::TemplateStore;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create storage directory: {0}")]
    StorageDirectoryCreationFailed(#[from] std::io::Error),

    #[error("Font directory does not exist: {0}")]
    FontDirectoryMissing(String),

    #[error("No font directory available, text will use the built-in font")]
    NoFontDirectories,
}

impl StartupCheckError {
    /// Errors that should stop the program rather than degrade it.
    pub fn is_critical(&self) -> bool {
        matches!(self, StartupCheckError::StorageDirectoryCreationFailed(_))
    }
}

pub fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let store = TemplateStore::from_config(&config.storage);
    let templates_dir = store.templates_dir();
    if !templates_dir.exists() {
        info!("Template directory does not exist, creating: {:?}", templates_dir);
        if let Err(e) = std::fs::create_dir_all(templates_dir) {
            error!("Failed to create template directory: {}", e);
            errors.push(StartupCheckError::StorageDirectoryCreationFailed(e));
        }
    } else {
        info!("Template directory exists: {:?}", templates_dir);
    }

    let (font_dirs, configured) = if config.fonts.search_directories.is_empty() {
        (platform_font_dirs(), false)
    } else {
        (config.fonts.search_directories.clone(), true)
    };

    // Missing platform directories are normal; only configured ones are worth a warning
    if configured {
        for dir in &font_dirs {
            if !dir.is_dir() {
                warn!("Configured font directory does not exist: {:?}", dir);
                errors.push(StartupCheckError::FontDirectoryMissing(
                    dir.display().to_string(),
                ));
            }
        }
    }

    if !font_dirs.iter().any(|dir| dir.is_dir()) {
        warn!("No font directories found, text watermarks will use the built-in font");
        errors.push(StartupCheckError::NoFontDirectories);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_storage_and_reports_missing_fonts() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.directory = temp_dir.path().join("data");
        config.fonts.search_directories = vec![temp_dir.path().join("no-fonts-here")];

        let errors = perform_startup_checks(&config).unwrap_err();
        assert!(temp_dir.path().join("data").join("templates").is_dir());
        assert!(errors.iter().all(|e| !e.is_critical()));
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, StartupCheckError::FontDirectoryMissing(_)))
        );
    }

    #[test]
    fn test_passes_with_existing_font_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.directory = temp_dir.path().join("data");
        config.fonts.search_directories = vec![temp_dir.path().to_path_buf()];

        assert!(perform_startup_checks(&config).is_ok());
    }
}

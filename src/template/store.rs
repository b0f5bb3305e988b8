use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{TemplateError, TemplateRecord};
use crate::StorageConfig;
use crate::export::ExportSpec;
use crate::watermark::WatermarkSpec;

pub const SESSION_FILE_NAME: &str = "session.toml";
const TEMPLATES_DIR_NAME: &str = "templates";
const TEMPLATE_EXTENSION: &str = "toml";

/// The user's last working state, restored on startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSettings {
    pub watermark: WatermarkSpec,
    pub export: ExportSpec,
    pub last_export_dir: Option<PathBuf>,
}

/// Named templates, one TOML file each, plus a separate session settings file.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    templates_dir: PathBuf,
    session_file: PathBuf,
}

/// Turn a template name into a file stem. Alphanumerics, `-`, `_` and spaces are kept,
/// everything else becomes `_`.
pub fn sanitize_name(name: &str) -> Result<String, TemplateError> {
    let trimmed = name.trim();
    let sanitized: String = trimmed
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches(|c| c == '_' || c == ' ').is_empty() {
        return Err(TemplateError::InvalidName(name.to_string()));
    }
    Ok(sanitized)
}

fn read_record(path: &Path) -> Result<TemplateRecord, TemplateError> {
    let contents = std::fs::read_to_string(path)?;
    let doc = contents.parse::<toml_edit::DocumentMut>()?;
    Ok(toml_edit::de::from_document(doc)?)
}

fn write_record(path: &Path, record: &TemplateRecord) -> Result<(), TemplateError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let document = toml_edit::ser::to_document(record)?;
    std::fs::write(path, document.to_string())?;
    Ok(())
}

impl TemplateStore {
    /// Store rooted at `root`: templates under `root/templates`, session in
    /// `root/session.toml`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            templates_dir: root.join(TEMPLATES_DIR_NAME),
            session_file: root.join(SESSION_FILE_NAME),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.directory.clone())
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    pub fn session_file(&self) -> &Path {
        &self.session_file
    }

    fn template_path(&self, name: &str) -> Result<PathBuf, TemplateError> {
        let stem = sanitize_name(name)?;
        Ok(self
            .templates_dir
            .join(format!("{}.{}", stem, TEMPLATE_EXTENSION)))
    }

    /// Read the record stored for `name`, checking it really belongs to that name
    /// (two names can sanitize to the same file).
    fn read_named(&self, name: &str) -> Result<(PathBuf, TemplateRecord), TemplateError> {
        let path = self.template_path(name)?;
        if !path.exists() {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        let record = read_record(&path)?;
        if record.name != name {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        Ok((path, record))
    }

    /// Save or overwrite the template called `name`.
    pub fn save(
        &self,
        name: &str,
        watermark: &WatermarkSpec,
        export: &ExportSpec,
    ) -> Result<(), TemplateError> {
        let path = self.template_path(name)?;
        if path.exists()
            && let Ok(existing) = read_record(&path)
            && existing.name != name
        {
            return Err(TemplateError::AlreadyExists(existing.name));
        }

        write_record(&path, &TemplateRecord::from_specs(name, watermark, export))?;
        info!("Saved template '{}' to {:?}", name, path);
        Ok(())
    }

    /// Names of all readable templates, sorted.
    pub fn list(&self) -> Result<Vec<String>, TemplateError> {
        if !self.templates_dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.templates_dir)? {
            let path = entry?.path();
            let is_template = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(TEMPLATE_EXTENSION))
                .unwrap_or(false);
            if !is_template {
                continue;
            }

            match read_record(&path) {
                Ok(record) => names.push(record.name),
                Err(e) => warn!("Skipping unreadable template {:?}: {}", path, e),
            }
        }

        names.sort();
        Ok(names)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read_named(name).is_ok()
    }

    pub fn load(&self, name: &str) -> Result<(WatermarkSpec, ExportSpec), TemplateError> {
        let (_, record) = self.read_named(name)?;
        debug!("Loaded template '{}'", name);
        Ok((record.watermark(), record.export()))
    }

    /// Like `load`, but falls back to the built-in defaults on any failure.
    pub fn load_or_default(&self, name: &str) -> (WatermarkSpec, ExportSpec) {
        match self.load(name) {
            Ok(specs) => specs,
            Err(e) => {
                warn!("Failed to load template '{}', using defaults: {}", name, e);
                (WatermarkSpec::default(), ExportSpec::default())
            }
        }
    }

    pub fn delete(&self, name: &str) -> Result<(), TemplateError> {
        let (path, _) = self.read_named(name)?;
        std::fs::remove_file(&path)?;
        info!("Deleted template '{}'", name);
        Ok(())
    }

    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<(), TemplateError> {
        let (old_path, mut record) = self.read_named(old_name)?;
        let new_path = self.template_path(new_name)?;

        if new_path != old_path && new_path.exists() {
            return Err(TemplateError::AlreadyExists(new_name.to_string()));
        }

        record.name = new_name.to_string();
        write_record(&new_path, &record)?;
        if new_path != old_path {
            std::fs::remove_file(&old_path)?;
        }

        info!("Renamed template '{}' to '{}'", old_name, new_name);
        Ok(())
    }

    /// Last session settings, or defaults when the file is missing or unreadable.
    pub fn load_session(&self) -> SessionSettings {
        if !self.session_file.exists() {
            debug!("Session settings not found, starting with defaults");
            return SessionSettings::default();
        }

        match read_record(&self.session_file) {
            Ok(record) => SessionSettings {
                watermark: record.watermark(),
                export: record.export(),
                last_export_dir: record.last_export_dir,
            },
            Err(e) => {
                warn!(
                    "Failed to read session settings {:?}, using defaults: {}",
                    self.session_file, e
                );
                SessionSettings::default()
            }
        }
    }

    pub fn save_session(&self, settings: &SessionSettings) -> Result<(), TemplateError> {
        let mut record = TemplateRecord::from_specs("", &settings.watermark, &settings.export);
        record.last_export_dir = settings.last_export_dir.clone();
        write_record(&self.session_file, &record)?;
        debug!("Saved session settings to {:?}", self.session_file);
        Ok(())
    }
}

//! Headless editing session: the state a UI shell keeps between events.
//!
//! Holds the imported image list, the current selection and the current watermark and
//! export settings. Edits are diff-checked, auto-saved to the session settings file and
//! debounced before a preview render is run.

use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::Config;
use crate::export::{Destination, ExportError, ExportSpec, export_image};
use crate::font::FontResolver;
use crate::formats::is_supported_image;
use crate::preview::{Debouncer, PreviewCache, PreviewError};
use crate::template::{SessionSettings, TemplateError, TemplateStore};
use crate::watermark::{Compositor, Render, WatermarkSpec};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No image selected")]
    NoImageSelected,

    #[error(transparent)]
    Preview(#[from] PreviewError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

pub struct Session<R = Compositor> {
    store: TemplateStore,
    images: Vec<PathBuf>,
    current: Option<usize>,
    settings: SessionSettings,
    preview: PreviewCache<R>,
    debouncer: Debouncer<WatermarkSpec>,
}

impl Session<Compositor> {
    pub fn from_config(config: &Config) -> Self {
        let compositor = Compositor::new(FontResolver::from_config(&config.fonts));
        Self::new(
            TemplateStore::from_config(&config.storage),
            PreviewCache::new(compositor),
            Duration::from_millis(config.preview.debounce_ms),
        )
    }
}

impl<R: Render> Session<R> {
    /// Start a session, restoring the last saved settings from `store`.
    pub fn new(store: TemplateStore, preview: PreviewCache<R>, debounce: Duration) -> Self {
        let settings = store.load_session();
        Self {
            store,
            images: Vec::new(),
            current: None,
            settings,
            preview,
            debouncer: Debouncer::new(debounce),
        }
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn current_image(&self) -> Option<&Path> {
        self.current.map(|idx| self.images[idx].as_path())
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn watermark(&self) -> &WatermarkSpec {
        &self.settings.watermark
    }

    pub fn export_spec(&self) -> &ExportSpec {
        &self.settings.export
    }

    pub fn preview_cache(&self) -> &PreviewCache<R> {
        &self.preview
    }

    /// Add images to the session. Unsupported formats are skipped and returned; paths
    /// already present are ignored. The first image is selected if nothing was.
    pub fn add_images<I, P>(&mut self, paths: I, now: Instant) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut rejected = Vec::new();
        for path in paths {
            let path = path.into();
            if !is_supported_image(&path) {
                warn!("Skipping unsupported image format: {:?}", path);
                rejected.push(path);
                continue;
            }
            if !self.images.contains(&path) {
                debug!("Added image {:?}", path);
                self.images.push(path);
            }
        }

        if self.current.is_none() && !self.images.is_empty() {
            self.select(0, now);
        }
        rejected
    }

    /// Select the image at `index` and schedule a preview. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize, now: Instant) -> bool {
        if index >= self.images.len() {
            return false;
        }
        self.current = Some(index);
        self.debouncer.submit(self.settings.watermark.clone(), now);
        true
    }

    /// Replace the watermark settings. Returns `Ok(false)` when nothing changed.
    ///
    /// The new spec is applied even when auto-saving it fails; the error is returned so
    /// the caller can tell the user.
    pub fn set_watermark(
        &mut self,
        spec: WatermarkSpec,
        now: Instant,
    ) -> Result<bool, TemplateError> {
        if spec == self.settings.watermark {
            return Ok(false);
        }
        self.settings.watermark = spec;
        self.debouncer.submit(self.settings.watermark.clone(), now);
        self.autosave()?;
        Ok(true)
    }

    /// Replace the export settings. Returns `Ok(false)` when nothing changed.
    pub fn set_export(&mut self, export: ExportSpec) -> Result<bool, TemplateError> {
        if export == self.settings.export {
            return Ok(false);
        }
        self.settings.export = export;
        self.autosave()?;
        Ok(true)
    }

    pub fn set_last_export_dir(&mut self, dir: impl Into<PathBuf>) -> Result<(), TemplateError> {
        self.settings.last_export_dir = Some(dir.into());
        self.autosave()
    }

    fn autosave(&self) -> Result<(), TemplateError> {
        self.store.save_session(&self.settings).inspect_err(|e| {
            error!("Failed to auto-save session settings: {}", e);
        })
    }

    /// Load a named template into the current settings.
    ///
    /// Both specs are applied before the session is saved, so a failed save leaves the
    /// template fully applied in memory and only reports the error.
    pub fn apply_template(&mut self, name: &str, now: Instant) -> Result<(), SessionError> {
        let (watermark, export) = self.store.load(name)?;
        let watermark_changed = watermark != self.settings.watermark;
        let changed = watermark_changed || export != self.settings.export;

        self.settings.watermark = watermark;
        self.settings.export = export;
        if watermark_changed {
            self.debouncer.submit(self.settings.watermark.clone(), now);
        }
        info!("Applied template '{}'", name);

        if changed {
            self.autosave()?;
        }
        Ok(())
    }

    pub fn save_template(&self, name: &str) -> Result<(), SessionError> {
        self.store
            .save(name, &self.settings.watermark, &self.settings.export)?;
        Ok(())
    }

    /// Render the pending preview once the quiet period after the last edit has passed.
    pub fn poll_preview(
        &mut self,
        now: Instant,
    ) -> Option<Result<Arc<DynamicImage>, SessionError>> {
        let spec = self.debouncer.poll(now)?;
        let path = self.current_image()?.to_path_buf();
        Some(
            self.preview
                .get_or_render(&path, &spec)
                .map_err(SessionError::from),
        )
    }

    /// Render the current image with the current settings right away.
    pub fn render_preview(&mut self) -> Result<Arc<DynamicImage>, SessionError> {
        self.debouncer.flush();
        let path = self
            .current_image()
            .ok_or(SessionError::NoImageSelected)?
            .to_path_buf();
        Ok(self.preview.get_or_render(&path, &self.settings.watermark)?)
    }

    /// Drop all cached previews and decoded sources, e.g. after files changed on disk.
    pub fn reload(&mut self) {
        self.preview.clear();
    }

    /// Export the selected image with the current settings.
    pub fn export_current(&mut self) -> Result<PathBuf, SessionError> {
        let path = self
            .current_image()
            .ok_or(SessionError::NoImageSelected)?
            .to_path_buf();
        self.export(&path)
    }

    /// Export one image with the current settings.
    pub fn export(&mut self, source: &Path) -> Result<PathBuf, SessionError> {
        let output = export_image(
            self.preview.renderer_mut(),
            source,
            &self.settings.watermark,
            &self.settings.export,
            self.settings.last_export_dir.as_deref(),
        )?;
        Ok(output)
    }

    /// Export one image into `dir`, remembering it as the last-used export directory.
    ///
    /// The saved destination policy is left alone. Failing to save the new directory is
    /// logged and does not stop the export.
    pub fn export_to(&mut self, source: &Path, dir: &Path) -> Result<PathBuf, SessionError> {
        if self.settings.last_export_dir.as_deref() != Some(dir) {
            self.settings.last_export_dir = Some(dir.to_path_buf());
            if self.autosave().is_err() {
                warn!("Exporting to {:?} without saving it as the last export directory", dir);
            }
        }

        let export = ExportSpec {
            destination: Destination::LastExportDirectory,
            ..self.settings.export.clone()
        };
        let output = export_image(
            self.preview.renderer_mut(),
            source,
            &self.settings.watermark,
            &export,
            Some(dir),
        )?;
        Ok(output)
    }

    /// Persist the session settings one last time.
    pub fn shutdown(self) -> Result<(), TemplateError> {
        self.store.save_session(&self.settings)?;
        info!("Session settings saved on shutdown");
        Ok(())
    }
}

// Preview cache - memoizes rendered watermarks and decoded sources for the editing session
mod debounce;

pub use debounce::Debouncer;

use image::DynamicImage;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::formats::is_supported_image;
use crate::watermark::{Compositor, Render, WatermarkSpec};

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

/// Session-lifetime memo of `(source path, spec) -> rendered image`.
///
/// Entries are never evicted on their own; an edit simply produces a new key and the
/// old entry stays until `clear`.
pub struct PreviewCache<R = Compositor> {
    renderer: R,
    sources: HashMap<PathBuf, Arc<DynamicImage>>,
    rendered: HashMap<String, Arc<DynamicImage>>,
}

impl Default for PreviewCache<Compositor> {
    fn default() -> Self {
        Self::new(Compositor::default())
    }
}

impl<R: Render> PreviewCache<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            sources: HashMap::new(),
            rendered: HashMap::new(),
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Rendered image for this exact source and spec, rendering on first request.
    pub fn get_or_render(
        &mut self,
        source_path: &Path,
        spec: &WatermarkSpec,
    ) -> Result<Arc<DynamicImage>, PreviewError> {
        let key = cache_key(source_path, spec)?;
        if let Some(hit) = self.rendered.get(&key) {
            debug!("Preview cache hit for {:?}", source_path);
            return Ok(hit.clone());
        }

        debug!("Preview cache miss for {:?}, rendering", source_path);
        let source = self.source(source_path)?;
        let output = Arc::new(self.renderer.render(&source, spec));
        self.rendered.insert(key, output.clone());
        Ok(output)
    }

    /// Decoded source image, loaded once per path.
    pub fn source(&mut self, path: &Path) -> Result<Arc<DynamicImage>, PreviewError> {
        if let Some(image) = self.sources.get(path) {
            return Ok(image.clone());
        }

        if !is_supported_image(path) {
            return Err(PreviewError::UnsupportedFormat(path.to_path_buf()));
        }

        let image = image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?;
        debug!(
            "Decoded source {:?} ({}x{})",
            path,
            image.width(),
            image.height()
        );

        let image = Arc::new(image);
        self.sources.insert(path.to_path_buf(), image.clone());
        Ok(image)
    }

    /// Drop every rendered preview and decoded source.
    pub fn clear(&mut self) {
        debug!(
            "Clearing preview cache ({} previews, {} sources)",
            self.rendered.len(),
            self.sources.len()
        );
        self.rendered.clear();
        self.sources.clear();
    }

    pub fn len(&self) -> usize {
        self.rendered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

/// Key covering the source path and every field of the watermark settings.
pub fn cache_key(source_path: &Path, spec: &WatermarkSpec) -> Result<String, serde_json::Error> {
    let spec_json = serde_json::to_string(spec)?;
    let mut hasher = Sha256::new();
    hasher.update(source_path.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    hasher.update(spec_json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontResolver;
    use crate::watermark::Position;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    /// Wraps the real compositor and counts how often it runs.
    struct CountingRenderer {
        inner: Compositor,
        calls: usize,
    }

    impl Render for CountingRenderer {
        fn render(&mut self, source: &DynamicImage, spec: &WatermarkSpec) -> DynamicImage {
            self.calls += 1;
            self.inner.render(source, spec)
        }
    }

    fn counting_cache() -> PreviewCache<CountingRenderer> {
        PreviewCache::new(CountingRenderer {
            inner: Compositor::new(FontResolver::with_search_dirs(Vec::new())),
            calls: 0,
        })
    }

    fn write_source(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        RgbImage::from_pixel(64, 32, Rgb([20, 40, 60])).save(&path).unwrap();
        path
    }

    #[test]
    fn test_same_key_returns_cached_object() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_source(&temp_dir, "photo.png");
        let mut cache = counting_cache();
        let spec = WatermarkSpec::text("Preview");

        let first = cache.get_or_render(&source, &spec).unwrap();
        let second = cache.get_or_render(&source, &spec).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.renderer().calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_changed_spec_renders_again_and_reuses_source() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_source(&temp_dir, "photo.png");
        let mut cache = counting_cache();

        let spec = WatermarkSpec::text("Preview");
        let moved = WatermarkSpec {
            position: Position::new(0.1, 0.1),
            ..spec.clone()
        };

        cache.get_or_render(&source, &spec).unwrap();
        cache.get_or_render(&source, &moved).unwrap();
        cache.get_or_render(&source, &spec).unwrap();

        assert_eq!(cache.renderer().calls, 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.source_count(), 1);
    }

    #[test]
    fn test_clear_forces_rerender() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_source(&temp_dir, "photo.png");
        let mut cache = counting_cache();
        let spec = WatermarkSpec::text("Preview");

        let before = cache.get_or_render(&source, &spec).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.source_count(), 0);

        let after = cache.get_or_render(&source, &spec).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(*before, *after);
        assert_eq!(cache.renderer().calls, 2);
    }

    #[test]
    fn test_unsupported_source_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("photo.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        let mut cache = counting_cache();
        let result = cache.get_or_render(&path, &WatermarkSpec::default());
        assert!(matches!(result, Err(PreviewError::UnsupportedFormat(_))));
        assert_eq!(cache.renderer().calls, 0);
    }

    #[test]
    fn test_cache_key_covers_path_and_spec() {
        let spec = WatermarkSpec::text("A");
        let key = cache_key(Path::new("a.jpg"), &spec).unwrap();
        assert_eq!(key, cache_key(Path::new("a.jpg"), &spec).unwrap());
        assert_ne!(key, cache_key(Path::new("b.jpg"), &spec).unwrap());

        let mut bold = spec.clone();
        bold.font.bold = true;
        assert_ne!(key, cache_key(Path::new("a.jpg"), &bold).unwrap());
    }
}

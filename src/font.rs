//! Font resolution: maps a family name plus style flags to a loadable font, with a
//! best-effort filename search over the platform font directories.
//!
//! Results differ between machines because they depend on which font files are
//! installed. When nothing matches, the built-in bitmap font is returned, so a caller
//! always gets something it can draw with.

pub mod builtin;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{GrayImage, Luma};
use imageproc::drawing::{draw_text_mut, text_size};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::FontConfig;

const FONT_EXTENSIONS: &[&str] = &["ttf", "ttc", "otf"];

/// Common family names and the file they ship as on the usual platforms.
const FAMILY_FILES: &[(&str, &str)] = &[
    ("arial", "arial.ttf"),
    ("arial black", "ariblk.ttf"),
    ("comic sans ms", "comic.ttf"),
    ("courier new", "cour.ttf"),
    ("dejavu sans", "DejaVuSans.ttf"),
    ("dejavu sans mono", "DejaVuSansMono.ttf"),
    ("dejavu serif", "DejaVuSerif.ttf"),
    ("georgia", "georgia.ttf"),
    ("helvetica", "Helvetica.ttc"),
    ("impact", "impact.ttf"),
    ("kaiti", "simkai.ttf"),
    ("liberation mono", "LiberationMono-Regular.ttf"),
    ("liberation sans", "LiberationSans-Regular.ttf"),
    ("liberation serif", "LiberationSerif-Regular.ttf"),
    ("microsoft yahei", "msyh.ttc"),
    ("monospace", "DejaVuSansMono.ttf"),
    ("noto sans", "NotoSans-Regular.ttf"),
    ("pingfang sc", "PingFang.ttc"),
    ("sans-serif", "DejaVuSans.ttf"),
    ("segoe ui", "segoeui.ttf"),
    ("serif", "DejaVuSerif.ttf"),
    ("simhei", "simhei.ttf"),
    ("simsun", "simsun.ttc"),
    ("tahoma", "tahoma.ttf"),
    ("times new roman", "times.ttf"),
    ("trebuchet ms", "trebuc.ttf"),
    ("verdana", "verdana.ttf"),
];

const BOLD_ITALIC_SUFFIXES: &[&str] = &[
    "BoldItalic",
    "-BoldItalic",
    " Bold Italic",
    "BoldOblique",
    "-BoldOblique",
    "bi",
    "z",
];
const BOLD_SUFFIXES: &[&str] = &["Bold", "-Bold", " Bold", "bd", "b"];
const ITALIC_SUFFIXES: &[&str] = &["Italic", "-Italic", " Italic", "Oblique", "-Oblique", "i"];

/// A font ready to draw text at one size.
#[derive(Clone)]
pub enum FontHandle {
    Outline {
        font: Arc<FontVec>,
        scale: PxScale,
        path: PathBuf,
    },
    /// Built-in 8x8 bitmap glyphs. Fixed size, no bold or italic.
    Builtin,
}

impl std::fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FontHandle::Outline { scale, path, .. } => f
                .debug_struct("Outline")
                .field("path", path)
                .field("scale", &scale.y)
                .finish(),
            FontHandle::Builtin => f.write_str("Builtin"),
        }
    }
}

impl FontHandle {
    pub fn is_builtin(&self) -> bool {
        matches!(self, FontHandle::Builtin)
    }

    /// File the font was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        match self {
            FontHandle::Outline { path, .. } => Some(path),
            FontHandle::Builtin => None,
        }
    }

    /// Rasterize `text` into a coverage mask cropped to the pixels that carry ink.
    ///
    /// The mask dimensions are the text's pixel bounding box. Text without any ink
    /// (empty or whitespace) yields a 0x0 mask.
    pub fn rasterize(&self, text: &str) -> GrayImage {
        let mask = match self {
            FontHandle::Outline { font, scale, .. } => rasterize_outline(font, *scale, text),
            FontHandle::Builtin => builtin::rasterize(text),
        };
        crop_to_ink(&mask)
    }
}

fn rasterize_outline(font: &FontVec, scale: PxScale, text: &str) -> GrayImage {
    let scaled = font.as_scaled(scale);
    let line_height = (scaled.height() + scaled.line_gap()).ceil().max(1.0) as u32;
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return GrayImage::new(0, 0);
    }

    let widest = lines
        .iter()
        .map(|line| text_size(scale, font, line).0)
        .max()
        .unwrap_or(0);

    // Glyphs can overhang their advance box (italics, negative bearings)
    let pad = (scale.y / 2.0).ceil() as u32 + 2;
    let mut mask = GrayImage::new(
        widest + 2 * pad,
        line_height * lines.len() as u32 + 2 * pad,
    );

    for (idx, line) in lines.iter().enumerate() {
        let y = pad + idx as u32 * line_height;
        draw_text_mut(&mut mask, Luma([255]), pad as i32, y as i32, scale, font, line);
    }

    mask
}

fn crop_to_ink(mask: &GrayImage) -> GrayImage {
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0u32, 0u32);
    let mut found = false;

    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] == 0 {
            continue;
        }
        found = true;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    if !found {
        return GrayImage::new(0, 0);
    }

    image::imageops::crop_imm(mask, min_x, min_y, max_x - min_x + 1, max_y - min_y + 1).to_image()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FontKey {
    family: String,
    size: u32,
    bold: bool,
    italic: bool,
}

/// Resolves family names to fonts and memoizes the result for the session.
///
/// Font files are assumed not to change while the process runs, so entries are never
/// invalidated.
pub struct FontResolver {
    search_dirs: Vec<PathBuf>,
    index: Option<HashMap<String, PathBuf>>,
    cache: HashMap<FontKey, FontHandle>,
}

impl Default for FontResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FontResolver {
    /// Resolver searching the platform's standard font directories.
    pub fn new() -> Self {
        Self::with_search_dirs(platform_font_dirs())
    }

    /// Resolver searching only `dirs`. An empty list means only direct file paths
    /// resolve and everything else gets the built-in font.
    pub fn with_search_dirs(dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs: dirs,
            index: None,
            cache: HashMap::new(),
        }
    }

    pub fn from_config(config: &FontConfig) -> Self {
        if config.search_directories.is_empty() {
            Self::new()
        } else {
            Self::with_search_dirs(config.search_directories.clone())
        }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Number of memoized (family, size, bold, italic) entries.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Resolve a font. Never fails; falls back to the built-in font.
    pub fn resolve(&mut self, family: &str, size: u32, bold: bool, italic: bool) -> FontHandle {
        let key = FontKey {
            family: family.to_string(),
            size,
            bold,
            italic,
        };

        if let Some(handle) = self.cache.get(&key) {
            return handle.clone();
        }

        let handle = self.search(family, size.max(1), bold, italic);
        self.cache.insert(key, handle.clone());
        handle
    }

    fn search(&mut self, family: &str, size: u32, bold: bool, italic: bool) -> FontHandle {
        let trimmed = family.trim();

        let direct = Path::new(trimmed);
        if !trimmed.is_empty()
            && direct.is_file()
            && let Some(handle) = load_font_file(direct, size)
        {
            debug!("Loaded font directly from {:?}", direct);
            return handle;
        }

        if !trimmed.is_empty() {
            let candidates = candidate_filenames(trimmed, bold, italic);
            let index = self.font_index();
            for candidate in &candidates {
                let Some(path) = index.get(&candidate.to_lowercase()) else {
                    continue;
                };
                if let Some(handle) = load_font_file(path, size) {
                    debug!("Resolved font '{}' to {:?}", family, path);
                    return handle;
                }
            }
        }

        warn!(
            "No font found for '{}' (bold={}, italic={}), using built-in font",
            family, bold, italic
        );
        FontHandle::Builtin
    }

    /// Lowercased file name -> path for every font file under the search directories.
    /// Earlier directories win on name clashes.
    fn font_index(&mut self) -> &HashMap<String, PathBuf> {
        let dirs = &self.search_dirs;
        self.index.get_or_insert_with(|| {
            let mut index = HashMap::new();
            for dir in dirs {
                if !dir.is_dir() {
                    continue;
                }
                for entry in WalkDir::new(dir)
                    .follow_links(true)
                    .into_iter()
                    .filter_map(Result::ok)
                {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let path = entry.path();
                    let is_font = path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .map(|ext| FONT_EXTENSIONS.iter().any(|f| ext.eq_ignore_ascii_case(f)))
                        .unwrap_or(false);
                    if !is_font {
                        continue;
                    }
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        index
                            .entry(name.to_lowercase())
                            .or_insert_with(|| path.to_path_buf());
                    }
                }
            }
            debug!("Indexed {} font files", index.len());
            index
        })
    }
}

fn load_font_file(path: &Path, size: u32) -> Option<FontHandle> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            debug!("Failed to read font {:?}: {}", path, e);
            return None;
        }
    };

    let is_collection = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("ttc"))
        .unwrap_or(false);

    let font = if is_collection {
        FontVec::try_from_vec_and_index(data, 0)
    } else {
        FontVec::try_from_vec(data)
    };

    match font {
        Ok(font) => Some(FontHandle::Outline {
            font: Arc::new(font),
            scale: PxScale::from(size as f32),
            path: path.to_path_buf(),
        }),
        Err(_) => {
            debug!("Failed to parse font {:?}", path);
            None
        }
    }
}

/// File names to look for, most specific first.
///
/// Matching against the directory index is case-insensitive, so each name stands for
/// all of its upper/lower case spellings. Styled variants come before the regular
/// face, which is still accepted when no styled file exists.
pub fn candidate_filenames(family: &str, bold: bool, italic: bool) -> Vec<String> {
    let lower = family.trim().to_lowercase();
    let suffixes: &[&str] = match (bold, italic) {
        (true, true) => BOLD_ITALIC_SUFFIXES,
        (true, false) => BOLD_SUFFIXES,
        (false, true) => ITALIC_SUFFIXES,
        (false, false) => &[],
    };

    let mut stems = Vec::new();
    let mut table_file = None;
    if let Some((_, file)) = FAMILY_FILES.iter().find(|(name, _)| *name == lower) {
        let stem = Path::new(file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file);
        let stem = stem
            .strip_suffix("-Regular")
            .or_else(|| stem.strip_suffix("Regular"))
            .unwrap_or(stem);
        stems.push(stem.to_string());
        table_file = Some(*file);
    }

    let base = family.trim();
    for variant in [
        base.to_string(),
        base.replace(' ', ""),
        base.replace(' ', "-"),
    ] {
        if !stems.contains(&variant) {
            stems.push(variant);
        }
    }

    let mut names: Vec<String> = Vec::new();
    let mut push = |name: String| {
        if !names.contains(&name) {
            names.push(name);
        }
    };

    for stem in &stems {
        for suffix in suffixes {
            for ext in FONT_EXTENSIONS {
                push(format!("{}{}.{}", stem, suffix, ext));
            }
        }
    }

    if let Some(file) = table_file {
        push(file.to_string());
    }
    for stem in &stems {
        for ext in FONT_EXTENSIONS {
            push(format!("{}.{}", stem, ext));
        }
        for regular in ["-Regular", "Regular"] {
            for ext in FONT_EXTENSIONS {
                push(format!("{}{}.{}", stem, regular, ext));
            }
        }
    }

    names
}

/// Standard font directories for the current platform.
pub fn platform_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        let windir = std::env::var_os("WINDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("C:\\Windows"));
        dirs.push(windir.join("Fonts"));
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            dirs.push(PathBuf::from(local).join("Microsoft").join("Windows").join("Fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            dirs.push(home.join("Library").join("Fonts"));
        }
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            dirs.push(home.join(".fonts"));
            dirs.push(home.join(".local").join("share").join("fonts"));
        }
    }

    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// DejaVu Sans regular, bold and oblique, shipped with the tests.
    fn fixture_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fonts")
    }

    fn fixture_resolver() -> FontResolver {
        FontResolver::with_search_dirs(vec![fixture_dir()])
    }

    fn file_name(handle: &FontHandle) -> Option<String> {
        handle
            .source()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Wrap a single TrueType font into a one-font `.ttc` collection.
    fn wrap_in_collection(ttf: &[u8]) -> Vec<u8> {
        // "ttcf", version, font count, one offset
        const HEADER_LEN: u32 = 16;
        let num_tables = u16::from_be_bytes([ttf[4], ttf[5]]) as usize;
        let mut font = ttf.to_vec();
        for table in 0..num_tables {
            // Table records start after the 12 byte offset table; offset is the third field
            let at = 12 + table * 16 + 8;
            let offset = u32::from_be_bytes(font[at..at + 4].try_into().unwrap());
            font[at..at + 4].copy_from_slice(&(offset + HEADER_LEN).to_be_bytes());
        }

        let mut collection = Vec::with_capacity(font.len() + HEADER_LEN as usize);
        collection.extend_from_slice(b"ttcf");
        collection.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        collection.extend_from_slice(&1u32.to_be_bytes());
        collection.extend_from_slice(&HEADER_LEN.to_be_bytes());
        collection.extend(font);
        collection
    }

    #[test]
    fn test_family_resolves_to_fixture_font() {
        let mut resolver = fixture_resolver();

        let regular = resolver.resolve("DejaVu Sans", 24, false, false);
        assert!(!regular.is_builtin());
        assert_eq!(file_name(&regular).as_deref(), Some("DejaVuSans.ttf"));

        // Case and spacing of the family name do not matter
        let lower = resolver.resolve("dejavusans", 24, false, false);
        assert_eq!(file_name(&lower).as_deref(), Some("DejaVuSans.ttf"));
    }

    #[test]
    fn test_style_variants_resolve() {
        let mut resolver = fixture_resolver();

        let bold = resolver.resolve("DejaVu Sans", 24, true, false);
        assert_eq!(file_name(&bold).as_deref(), Some("DejaVuSans-Bold.ttf"));

        let italic = resolver.resolve("DejaVu Sans", 24, false, true);
        assert_eq!(file_name(&italic).as_deref(), Some("DejaVuSans-Oblique.ttf"));

        // No bold oblique file: the regular face is still better than the built-in font
        let both = resolver.resolve("DejaVu Sans", 24, true, true);
        assert_eq!(file_name(&both).as_deref(), Some("DejaVuSans.ttf"));
    }

    #[test]
    fn test_first_loadable_candidate_wins() {
        let temp_dir = TempDir::new().unwrap();
        // Listed before "DejaVuSans-Bold.ttf" but not a font
        std::fs::write(temp_dir.path().join("DejaVuSansBold.ttf"), b"garbage").unwrap();
        std::fs::copy(
            fixture_dir().join("DejaVuSans-Bold.ttf"),
            temp_dir.path().join("DejaVuSans-Bold.ttf"),
        )
        .unwrap();

        let mut resolver = FontResolver::with_search_dirs(vec![temp_dir.path().to_path_buf()]);
        let bold = resolver.resolve("DejaVu Sans", 24, true, false);
        assert_eq!(file_name(&bold).as_deref(), Some("DejaVuSans-Bold.ttf"));
    }

    #[test]
    fn test_direct_path_and_collection_load() {
        let temp_dir = TempDir::new().unwrap();
        let ttf = std::fs::read(fixture_dir().join("DejaVuSans.ttf")).unwrap();
        let collection = temp_dir.path().join("DejaVuSans.ttc");
        std::fs::write(&collection, wrap_in_collection(&ttf)).unwrap();

        let mut resolver = FontResolver::with_search_dirs(Vec::new());
        let direct = fixture_dir().join("DejaVuSans.ttf");
        let handle = resolver.resolve(direct.to_str().unwrap(), 24, false, false);
        assert_eq!(handle.source(), Some(direct.as_path()));

        let handle = resolver.resolve(collection.to_str().unwrap(), 24, false, false);
        assert_eq!(handle.source(), Some(collection.as_path()));
        assert!(handle.rasterize("Ttc").width() > 0);
    }

    #[test]
    fn test_outline_rasterize_scales_with_size() {
        let mut resolver = fixture_resolver();
        let small = resolver.resolve("DejaVu Sans", 20, false, false).rasterize("Test");
        let large = resolver.resolve("DejaVu Sans", 60, false, false).rasterize("Test");

        assert!(small.width() > 0 && small.height() > 0);
        // Cap height of "T" is well under the pixel size
        assert!(small.height() <= 20);
        assert!(large.width() > small.width() * 2);
        assert!(large.height() > small.height() * 2);

        let two_lines = resolver
            .resolve("DejaVu Sans", 20, false, false)
            .rasterize("Test\nTest");
        assert!(two_lines.height() > small.height() * 2);
        assert_eq!(two_lines.width(), small.width());

        let blank = resolver.resolve("DejaVu Sans", 20, false, false).rasterize(" ");
        assert_eq!(blank.dimensions(), (0, 0));
    }

    #[test]
    fn test_unknown_family_falls_back_to_builtin() {
        let mut resolver = FontResolver::with_search_dirs(Vec::new());
        let handle = resolver.resolve("Definitely Not A Font", 24, false, false);
        assert!(handle.is_builtin());
        assert!(handle.source().is_none());
    }

    #[test]
    fn test_resolution_is_memoized_per_key() {
        let mut resolver = FontResolver::with_search_dirs(Vec::new());
        resolver.resolve("Arial", 24, false, false);
        resolver.resolve("Arial", 24, false, false);
        assert_eq!(resolver.cached_len(), 1);

        resolver.resolve("Arial", 24, true, false);
        resolver.resolve("Arial", 32, false, false);
        assert_eq!(resolver.cached_len(), 3);
    }

    #[test]
    fn test_unparseable_font_file_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("arial.ttf"), b"not a font").unwrap();

        let mut resolver = FontResolver::with_search_dirs(vec![temp_dir.path().to_path_buf()]);
        assert!(resolver.resolve("Arial", 20, false, false).is_builtin());

        let direct = temp_dir.path().join("arial.ttf");
        let mut resolver = FontResolver::with_search_dirs(Vec::new());
        assert!(
            resolver
                .resolve(direct.to_str().unwrap(), 20, false, false)
                .is_builtin()
        );
    }

    #[test]
    fn test_candidates_prefer_styled_table_names() {
        let names = candidate_filenames("Arial", true, false);
        assert_eq!(names[0], "arialBold.ttf");
        assert!(names.contains(&"arialbd.ttf".to_string()));
        assert!(names.contains(&"arial.ttf".to_string()));

        let styled = names.iter().position(|n| n == "arialbd.ttf").unwrap();
        let regular = names.iter().position(|n| n == "arial.ttf").unwrap();
        assert!(styled < regular);
    }

    #[test]
    fn test_candidates_cover_spacing_variants() {
        let names = candidate_filenames("DejaVu Sans", false, true);
        assert!(names.contains(&"DejaVuSans-Oblique.ttf".to_string()));
        assert!(names.contains(&"DejaVu Sans.ttf".to_string()));
        assert!(names.contains(&"DejaVu-Sans.otf".to_string()));
        assert!(names.contains(&"DejaVuSans.ttf".to_string()));
    }

    #[test]
    fn test_candidates_strip_regular_from_table_stem() {
        let names = candidate_filenames("Liberation Sans", true, true);
        assert!(names.contains(&"LiberationSans-BoldItalic.ttf".to_string()));
        assert!(names.contains(&"LiberationSans-Regular.ttf".to_string()));
    }

    #[test]
    fn test_builtin_rasterize_is_cropped() {
        let mask = FontHandle::Builtin.rasterize("T");
        assert!(mask.width() > 0 && mask.height() > 0);
        // Cropped masks have ink on every border
        let (w, h) = mask.dimensions();
        assert!((0..h).any(|y| mask.get_pixel(0, y)[0] > 0));
        assert!((0..h).any(|y| mask.get_pixel(w - 1, y)[0] > 0));
        assert!((0..w).any(|x| mask.get_pixel(x, 0)[0] > 0));
        assert!((0..w).any(|x| mask.get_pixel(x, h - 1)[0] > 0));

        assert_eq!(FontHandle::Builtin.rasterize("  ").dimensions(), (0, 0));
    }
}

use crate::cache::ResourceCache;
use crate::error::BoardError;
use rustybuzz::{Direction as HbDirection, Face as HbFace, UnicodeBuffer};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// The three weights the report template is designed around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontRole {
    Heavy,
    Bold,
    Medium,
}

impl FontRole {
    pub const ALL: [FontRole; 3] = [FontRole::Heavy, FontRole::Bold, FontRole::Medium];

    fn slot(self) -> usize {
        match self {
            FontRole::Heavy => 0,
            FontRole::Bold => 1,
            FontRole::Medium => 2,
        }
    }
}

/// Pure text metrics. Every section height is derived through this, before any drawing.
pub trait TextMeasurer: Send + Sync {
    fn text_width(&self, role: FontRole, size: f32, text: &str) -> f32;
    fn line_height(&self, role: FontRole, size: f32) -> f32;
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct TextWidthKey {
    font_index: usize,
    size_milli: i64,
    text: String,
}

#[derive(Debug)]
struct TextWidthCache {
    map: HashMap<TextWidthKey, f32>,
    order: VecDeque<TextWidthKey>,
    max_entries: usize,
}

impl TextWidthCache {
    fn new(max_entries: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    fn get(&self, key: &TextWidthKey) -> Option<f32> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: TextWidthKey, value: f32) {
        if self.map.contains_key(&key) {
            return;
        }
        self.map.insert(key.clone(), value);
        self.order.push_back(key);
        while self.map.len() > self.max_entries {
            match self.order.pop_front() {
                Some(old) => {
                    self.map.remove(&old);
                }
                None => break,
            }
        }
    }
}

/// Vertical metrics in 1/1000 em.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FontMetrics {
    pub(crate) ascent: i32,
    pub(crate) descent: i32,
    pub(crate) line_gap: i32,
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let units_per_em = face.units_per_em().max(1) as f32;
        let scale = |v: i16| ((v as f32) * 1000.0 / units_per_em).round() as i32;
        Self {
            ascent: scale(face.ascender()),
            descent: scale(face.descender()),
            line_gap: scale(face.line_gap()),
        }
    }

    fn line_height(&self, size: f32) -> f32 {
        let height_1000 = self.ascent - self.descent + self.line_gap;
        if height_1000 <= 0 {
            return size;
        }
        size * height_1000 as f32 / 1000.0
    }
}

#[derive(Debug)]
pub(crate) struct RegisteredFont {
    pub(crate) name: String,
    pub(crate) data: Arc<Vec<u8>>,
    pub(crate) metrics: FontMetrics,
}

#[derive(Debug)]
pub(crate) struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    text_width_cache: Mutex<TextWidthCache>,
}

impl FontRegistry {
    pub(crate) fn new() -> Self {
        Self {
            fonts: Vec::new(),
            text_width_cache: Mutex::new(TextWidthCache::new(20_000)),
        }
    }

    pub(crate) fn register_bytes(
        &mut self,
        data: Arc<Vec<u8>>,
        source_name: Option<&str>,
    ) -> Result<usize, BoardError> {
        let source = source_name.unwrap_or("EmbeddedFont");
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|err| BoardError::Font(format!("invalid font data for {source}: {err}")))?;
        let name = font_name(&face, Path::new(source));
        let metrics = FontMetrics::from_face(&face);
        let index = self.fonts.len();
        self.fonts.push(RegisteredFont {
            name,
            data,
            metrics,
        });
        Ok(index)
    }

    pub(crate) fn font(&self, index: usize) -> Option<&RegisteredFont> {
        self.fonts.get(index)
    }

    pub(crate) fn measure_text_width(&self, index: usize, size: f32, text: &str) -> f32 {
        if text.is_empty() {
            return 0.0;
        }
        let Some(font) = self.fonts.get(index) else {
            return fallback_width(size, text);
        };
        let cache_key = TextWidthKey {
            font_index: index,
            size_milli: (size * 1000.0).round() as i64,
            text: text.to_string(),
        };
        if let Ok(cache) = self.text_width_cache.lock() {
            if let Some(value) = cache.get(&cache_key) {
                return value;
            }
        }
        let value = shaped_width(&font.data, size, text).unwrap_or_else(|| fallback_width(size, text));
        if let Ok(mut cache) = self.text_width_cache.lock() {
            cache.insert(cache_key, value);
        }
        value
    }

    pub(crate) fn line_height(&self, index: usize, size: f32) -> f32 {
        self.fonts
            .get(index)
            .map(|font| font.metrics.line_height(size))
            .unwrap_or(size)
    }
}

/// Paths of the three role fonts, as given in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontPaths {
    pub heavy: PathBuf,
    pub bold: PathBuf,
    pub medium: PathBuf,
}

impl FontPaths {
    fn for_role(&self, role: FontRole) -> &Path {
        match role {
            FontRole::Heavy => &self.heavy,
            FontRole::Bold => &self.bold,
            FontRole::Medium => &self.medium,
        }
    }
}

/// Fonts bound to the three roles. Loading is all-or-nothing.
#[derive(Debug)]
pub struct FontSet {
    registry: FontRegistry,
    roles: [usize; 3],
}

impl FontSet {
    pub fn load(paths: &FontPaths, cache: &ResourceCache) -> Result<Self, BoardError> {
        let mut registry = FontRegistry::new();
        let mut roles = [0usize; 3];
        for role in FontRole::ALL {
            let path = paths.for_role(role);
            let data = cache
                .font_bytes(path)
                .map_err(|err| BoardError::Font(format!("{:?} font: {}", role, err)))?;
            let source = path.to_string_lossy();
            roles[role.slot()] = registry.register_bytes(data, Some(&source))?;
        }
        Ok(Self { registry, roles })
    }

    pub fn from_bytes(heavy: Vec<u8>, bold: Vec<u8>, medium: Vec<u8>) -> Result<Self, BoardError> {
        let mut registry = FontRegistry::new();
        let mut roles = [0usize; 3];
        for (role, data) in FontRole::ALL.into_iter().zip([heavy, bold, medium]) {
            let source = format!("{:?}", role);
            roles[role.slot()] = registry.register_bytes(Arc::new(data), Some(&source))?;
        }
        Ok(Self { registry, roles })
    }

    pub fn family_name(&self, role: FontRole) -> &str {
        self.registry
            .font(self.roles[role.slot()])
            .map(|font| font.name.as_str())
            .unwrap_or("")
    }

    pub(crate) fn font_data(&self, role: FontRole) -> Option<&[u8]> {
        self.registry
            .font(self.roles[role.slot()])
            .map(|font| font.data.as_slice())
    }

    /// Distance from the top of the line box to the baseline.
    pub(crate) fn ascent(&self, role: FontRole, size: f32) -> f32 {
        self.registry
            .font(self.roles[role.slot()])
            .map(|font| {
                let metrics = font.metrics;
                let gap = metrics.line_gap.max(0) as f32 / 2.0;
                (metrics.ascent as f32 + gap) * size / 1000.0
            })
            .unwrap_or(size * 0.8)
    }

    /// First character of `text` that needs ink but has no glyph in the role's font.
    pub fn missing_glyph(&self, role: FontRole, text: &str) -> Option<char> {
        let face = self
            .font_data(role)
            .and_then(|data| ttf_parser::Face::parse(data, 0).ok());
        text.chars()
            .filter(|ch| needs_glyph(*ch))
            .find(|ch| face.as_ref().is_none_or(|face| face.glyph_index(*ch).is_none()))
    }

    pub(crate) fn check_coverage(&self, role: FontRole, text: &str) -> Result<(), BoardError> {
        match self.missing_glyph(role, text) {
            Some(ch) => Err(missing_glyph_error(role, ch)),
            None => Ok(()),
        }
    }
}

/// Whether `ch` must map to a real glyph. Blanks, controls and invisible joiners or
/// selectors need not.
pub(crate) fn needs_glyph(ch: char) -> bool {
    !ch.is_whitespace()
        && !ch.is_control()
        && !matches!(ch, '\u{200B}'..='\u{200F}' | '\u{2060}' | '\u{FE00}'..='\u{FE0F}' | '\u{FEFF}')
}

pub(crate) fn missing_glyph_error(role: FontRole, ch: char) -> BoardError {
    BoardError::Font(format!("{role:?} font has no glyph for {ch:?}"))
}

impl TextMeasurer for FontSet {
    fn text_width(&self, role: FontRole, size: f32, text: &str) -> f32 {
        self.registry
            .measure_text_width(self.roles[role.slot()], size, text)
    }

    fn line_height(&self, role: FontRole, size: f32) -> f32 {
        self.registry.line_height(self.roles[role.slot()], size)
    }
}

/// Fixed-advance metrics. Lets layout be computed and tested without any font file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMeasurer {
    pub advance_ratio: f32,
    pub line_ratio: f32,
}

impl MonospaceMeasurer {
    pub fn new(advance_ratio: f32, line_ratio: f32) -> Self {
        Self {
            advance_ratio,
            line_ratio,
        }
    }
}

impl Default for MonospaceMeasurer {
    fn default() -> Self {
        Self::new(0.6, 1.25)
    }
}

impl TextMeasurer for MonospaceMeasurer {
    fn text_width(&self, _role: FontRole, size: f32, text: &str) -> f32 {
        text.chars().count() as f32 * size * self.advance_ratio
    }

    fn line_height(&self, _role: FontRole, size: f32) -> f32 {
        size * self.line_ratio
    }
}

fn fallback_width(size: f32, text: &str) -> f32 {
    (size * 0.6).max(1.0) * text.chars().count() as f32
}

fn shaped_width(data: &[u8], size: f32, text: &str) -> Option<f32> {
    let face = HbFace::from_slice(data, 0)?;
    let units_per_em = face.units_per_em().max(1) as f32;
    let mut buffer = UnicodeBuffer::new();
    buffer.set_direction(detect_direction(text));
    buffer.push_str(text);
    let output = rustybuzz::shape(&face, &[], buffer);
    let positions = output.glyph_positions();
    if positions.is_empty() {
        return None;
    }
    let total: i64 = positions.iter().map(|pos| pos.x_advance as i64).sum();
    Some((total.max(0) as f32) * size / units_per_em)
}

pub(crate) fn detect_direction(text: &str) -> HbDirection {
    for ch in text.chars() {
        let code = ch as u32;
        let rtl = matches!(
            code,
            0x0590..=0x08FF | 0xFB1D..=0xFDFF | 0xFE70..=0xFEFF | 0x1EE00..=0x1EEFF
        );
        if rtl {
            return HbDirection::RightToLeft;
        }
    }
    HbDirection::LeftToRight
}

fn font_name(face: &ttf_parser::Face<'_>, path: &Path) -> String {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut post = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY if family.is_none() => {
                family = Some(name)
            }
            name_id::POST_SCRIPT_NAME if post.is_none() => post = Some(name),
            _ => {}
        }
    }
    post.or(family)
        .or_else(|| {
            path.file_stem()
                .and_then(|v| v.to_str())
                .map(|v| v.to_string())
        })
        .unwrap_or_else(|| "EmbeddedFont".to_string())
}

/// Looks for a TrueType font in the usual system locations. Test helper only.
#[cfg(test)]
pub(crate) fn find_system_font() -> Option<PathBuf> {
    let candidates = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/Library/Fonts/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monospace_widths_scale_with_char_count() {
        let m = MonospaceMeasurer::new(0.5, 1.0);
        assert_eq!(m.text_width(FontRole::Bold, 20.0, "abcd"), 40.0);
        assert_eq!(m.text_width(FontRole::Bold, 20.0, "卷王"), 20.0);
        assert_eq!(m.line_height(FontRole::Medium, 28.0), 28.0);
    }

    #[test]
    fn blank_characters_never_need_a_glyph() {
        for ch in [' ', '\n', '\t', '\u{200D}', '\u{FE0F}'] {
            assert!(!needs_glyph(ch), "{ch:?}");
        }
        assert!(needs_glyph('A'));
        assert!(needs_glyph('卷'));
    }

    #[test]
    fn coverage_reports_the_first_uncovered_character() {
        let Some(path) = find_system_font() else {
            return;
        };
        let bytes = std::fs::read(path).unwrap();
        let fonts = FontSet::from_bytes(bytes.clone(), bytes.clone(), bytes).unwrap();
        assert_eq!(fonts.missing_glyph(FontRole::Bold, "Peeper board 2025\n"), None);
        fonts.check_coverage(FontRole::Bold, "user1").unwrap();

        // Only meaningful for a font without CJK coverage.
        if fonts.missing_glyph(FontRole::Bold, "卷").is_none() {
            return;
        }
        assert_eq!(fonts.missing_glyph(FontRole::Bold, "ab 卷王"), Some('卷'));
        let err = fonts.check_coverage(FontRole::Heavy, "卷王").unwrap_err();
        assert!(matches!(err, BoardError::Font(message) if message.contains("Heavy")));
    }

    #[test]
    fn width_cache_evicts_oldest_entries() {
        let mut cache = TextWidthCache::new(2);
        for (i, text) in ["a", "b", "c"].iter().enumerate() {
            cache.insert(
                TextWidthKey {
                    font_index: 0,
                    size_milli: 1000,
                    text: text.to_string(),
                },
                i as f32,
            );
        }
        let key = |t: &str| TextWidthKey {
            font_index: 0,
            size_milli: 1000,
            text: t.to_string(),
        };
        assert_eq!(cache.get(&key("a")), None);
        assert_eq!(cache.get(&key("c")), Some(2.0));
    }

    #[test]
    fn invalid_font_bytes_are_fatal() {
        let err = FontSet::from_bytes(vec![0; 16], vec![0; 16], vec![0; 16]).unwrap_err();
        assert!(matches!(err, BoardError::Font(_)));
    }

    #[test]
    fn missing_font_file_is_fatal() {
        let cache = ResourceCache::default();
        let paths = FontPaths {
            heavy: PathBuf::from("/definitely/missing/heavy.ttf"),
            bold: PathBuf::from("/definitely/missing/bold.ttf"),
            medium: PathBuf::from("/definitely/missing/medium.ttf"),
        };
        let err = FontSet::load(&paths, &cache).unwrap_err();
        assert!(matches!(err, BoardError::Font(_)));
    }

    #[test]
    fn real_font_measures_and_caches_widths() {
        let Some(path) = find_system_font() else {
            return;
        };
        let paths = FontPaths {
            heavy: path.clone(),
            bold: path.clone(),
            medium: path,
        };
        let fonts = FontSet::load(&paths, &ResourceCache::default()).unwrap();
        let short = fonts.text_width(FontRole::Bold, 36.0, "Peeper");
        let long = fonts.text_width(FontRole::Bold, 36.0, "Peeper Board");
        assert!(short > 0.0 && long > short);
        assert_eq!(fonts.text_width(FontRole::Bold, 36.0, "Peeper"), short);
        assert!(fonts.line_height(FontRole::Heavy, 72.0) >= 72.0 * 0.9);
        assert!(!fonts.family_name(FontRole::Medium).is_empty());
    }
}

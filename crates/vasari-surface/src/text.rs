//! Glyph rasterization with fontdue, with font discovery through fontdb.

use crate::error::{Result, SurfaceError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Horizontal shear applied to rows above the baseline for faux italics.
pub const ITALIC_SHEAR: f32 = 0.2;

/// Where the raster context gets its font from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FontSource {
    /// A sans-serif face discovered among the system fonts.
    #[default]
    System,
    /// A specific `.ttf`/`.otf` file.
    File(PathBuf),
    /// No font: text draws are skipped.
    Disabled,
}

impl FontSource {
    /// Configured font path, or the system font when none is set.
    pub fn from_config(path: Option<&Path>) -> Self {
        match path {
            Some(path) => FontSource::File(path.to_path_buf()),
            None => FontSource::System,
        }
    }
}

/// A rasterized glyph: coverage bitmap plus placement metrics.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub metrics: fontdue::Metrics,
    pub coverage: Vec<u8>,
}

/// Glyph placed along a run, in surface coordinates.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlacedGlyph {
    pub key: (char, u32),
    pub left: f32,
    pub top: f32,
}

/// A laid-out single line of text.
#[derive(Debug, Default)]
pub(crate) struct LineLayout {
    pub glyphs: Vec<PlacedGlyph>,
    pub width: f32,
}

/// Font plus a per-size glyph cache.
pub struct GlyphRasterizer {
    font: fontdue::Font,
    cache: HashMap<(char, u32), Glyph>,
}

impl GlyphRasterizer {
    pub fn from_bytes(bytes: &[u8], collection_index: u32) -> Result<Self> {
        let settings = fontdue::FontSettings {
            collection_index,
            ..fontdue::FontSettings::default()
        };
        let font = fontdue::Font::from_bytes(bytes, settings).map_err(SurfaceError::FontData)?;
        Ok(Self {
            font,
            cache: HashMap::new(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| SurfaceError::Font {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(&bytes, 0).map_err(|e| SurfaceError::Font {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Construct from a reasonable system sans-serif font using `fontdb`.
    pub fn from_system_fonts() -> Option<Self> {
        use fontdb::{Database, Family, Query, Stretch, Style, Weight};

        let mut db = Database::new();
        db.load_system_fonts();

        let id = db
            .query(&Query {
                families: &[
                    Family::SansSerif,
                    Family::Name("DejaVu Sans".into()),
                    Family::Name("Helvetica".into()),
                    Family::Name("Arial".into()),
                ],
                weight: Weight::NORMAL,
                stretch: Stretch::Normal,
                style: Style::Normal,
                ..Query::default()
            })
            .or_else(|| db.faces().next().map(|face| face.id))?;

        db.with_face_data(id, |data, index| Self::from_bytes(data, index))
            .and_then(|result| match result {
                Ok(glyphs) => Some(glyphs),
                Err(err) => {
                    tracing::warn!("system font could not be parsed: {err}");
                    None
                }
            })
    }

    /// Load the font described by `source`. `Ok(None)` means text is disabled.
    pub fn load(source: &FontSource) -> Result<Option<Self>> {
        match source {
            FontSource::Disabled => Ok(None),
            FontSource::File(path) => Self::from_path(path).map(Some),
            FontSource::System => {
                let found = Self::from_system_fonts();
                if found.is_none() {
                    tracing::warn!("no system font found; text will not be drawn");
                }
                Ok(found)
            }
        }
    }

    /// Rasterize (or fetch from cache) one glyph at `size` pixels.
    pub fn glyph(&mut self, ch: char, size: f32) -> &Glyph {
        let key = (ch, size_key(size));
        let font = &self.font;
        self.cache.entry(key).or_insert_with(|| {
            let (metrics, coverage) = font.rasterize(ch, size.max(1.0));
            Glyph { metrics, coverage }
        })
    }

    pub(crate) fn cached(&self, key: (char, u32)) -> Option<&Glyph> {
        self.cache.get(&key)
    }

    /// Advance width of `text` at `size`, unclipped.
    pub fn measure(&mut self, text: &str, size: f32) -> f32 {
        text.chars()
            .map(|ch| self.glyph(ch, size).metrics.advance_width)
            .sum()
    }

    /// Place glyphs along a baseline starting at `x`, dropping glyphs whose
    /// advance would cross `x + max_width`.
    pub(crate) fn layout_line(&mut self, text: &str, x: f32, baseline: f32, size: f32, max_width: f32) -> LineLayout {
        let mut layout = LineLayout::default();
        let limit = max_width.max(0.0);
        for ch in text.chars() {
            if ch == '\n' {
                break;
            }
            let key = (ch, size_key(size));
            let metrics = self.glyph(ch, size).metrics;
            if layout.width + metrics.advance_width > limit + 0.5 {
                break;
            }
            layout.glyphs.push(PlacedGlyph {
                key,
                left: x + layout.width + metrics.xmin as f32,
                top: baseline - metrics.height as f32 - metrics.ymin as f32,
            });
            layout.width += metrics.advance_width;
        }
        layout
    }
}

/// Glyph cache key for a pixel size (quarter-pixel buckets).
fn size_key(size: f32) -> u32 {
    (size.max(1.0) * 4.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_source_from_config() {
        assert_eq!(FontSource::from_config(None), FontSource::System);
        assert_eq!(
            FontSource::from_config(Some(Path::new("fonts/a.ttf"))),
            FontSource::File(PathBuf::from("fonts/a.ttf"))
        );
    }

    #[test]
    fn disabled_source_loads_nothing() {
        assert!(GlyphRasterizer::load(&FontSource::Disabled).unwrap().is_none());
    }

    #[test]
    fn missing_font_file_is_an_error() {
        let err = GlyphRasterizer::load(&FontSource::File("/no/such/font.ttf".into()))
            .err()
            .unwrap();
        assert!(matches!(err, SurfaceError::Font { .. }));
    }

    #[test]
    fn garbage_font_bytes_are_rejected() {
        assert!(GlyphRasterizer::from_bytes(b"definitely not a font", 0).is_err());
    }

    #[test]
    fn size_keys_bucket_quarter_pixels() {
        assert_eq!(size_key(13.0), 52);
        assert_eq!(size_key(13.1), 52);
        assert_eq!(size_key(0.0), 4);
    }
}

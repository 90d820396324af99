//! CPU raster context backing every render pass.

use crate::error::{Result, SurfaceError};
use crate::paint::{Paint, Rgba};
use crate::text::{FontSource, GlyphRasterizer, ITALIC_SHEAR};
use crate::PixelFormat;
use tiny_skia::{FillRule, FilterQuality, Mask, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform};

/// How an image should fit within its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFitMode {
    /// Stretch to fill (may distort aspect ratio)
    Fill,
    /// Fit inside maintaining aspect ratio (letterbox/pillarbox)
    #[default]
    Contain,
    /// Fill maintaining aspect ratio (cropped to the bounds)
    Cover,
}

/// Stroke join style. Unknown names fall back to miter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "round" => LineJoin::Round,
            "bevel" => LineJoin::Bevel,
            _ => LineJoin::Miter,
        }
    }

    fn to_skia(self) -> tiny_skia::LineJoin {
        match self {
            LineJoin::Miter => tiny_skia::LineJoin::Miter,
            LineJoin::Round => tiny_skia::LineJoin::Round,
            LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
        }
    }
}

/// Line and shadow state applied to strokes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub width: f32,
    pub join: LineJoin,
    pub shadow_color: Rgba,
    pub shadow_blur: f32,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            width: 1.0,
            join: LineJoin::Miter,
            shadow_color: Rgba::TRANSPARENT,
            shadow_blur: 0.0,
        }
    }
}

/// Font size, horizontal clip and slant of a text draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub max_width: f32,
    pub italic: bool,
}

/// A decoded image ready to be blitted.
#[derive(Clone)]
pub struct RasterImage {
    pixmap: Pixmap,
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl RasterImage {
    /// Build from straight (non-premultiplied) RGBA8 pixels.
    pub fn from_rgba(width: u32, height: u32, mut rgba: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(SurfaceError::BufferSize {
                expected,
                actual: rgba.len(),
            });
        }
        for px in rgba.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            for channel in &mut px[..3] {
                *channel = ((u16::from(*channel) * a + 127) / 255) as u8;
            }
        }
        let size = tiny_skia::IntSize::from_wh(width, height).ok_or(SurfaceError::InvalidSize { width, height })?;
        let pixmap = Pixmap::from_vec(rgba, size).ok_or(SurfaceError::InvalidSize { width, height })?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }
}

/// Position and size of an image of `img` pixels fitted into `bounds` at `origin`.
pub fn calculate_image_fit(
    origin: [f32; 2],
    bounds: [f32; 2],
    img: [f32; 2],
    fit: ImageFitMode,
) -> ([f32; 2], [f32; 2]) {
    if img[0] <= 0.0 || img[1] <= 0.0 || bounds[0] <= 0.0 || bounds[1] <= 0.0 {
        return (origin, [0.0, 0.0]);
    }
    let bounds_aspect = bounds[0] / bounds[1];
    let img_aspect = img[0] / img[1];
    let (render_w, render_h) = match fit {
        ImageFitMode::Fill => return (origin, bounds),
        ImageFitMode::Contain if img_aspect > bounds_aspect => (bounds[0], bounds[0] / img_aspect),
        ImageFitMode::Contain => (bounds[1] * img_aspect, bounds[1]),
        ImageFitMode::Cover if img_aspect > bounds_aspect => (bounds[1] * img_aspect, bounds[1]),
        ImageFitMode::Cover => (bounds[0], bounds[0] / img_aspect),
    };

    // Center within bounds
    let offset_x = (bounds[0] - render_w) * 0.5;
    let offset_y = (bounds[1] - render_h) * 0.5;
    ([origin[0] + offset_x, origin[1] + offset_y], [render_w, render_h])
}

/// Immediate-mode drawing onto an RGBA pixmap.
pub struct RasterContext {
    pixmap: Pixmap,
    glyphs: Option<GlyphRasterizer>,
    warned_no_font: bool,
}

impl RasterContext {
    pub fn new(width: u32, height: u32, font: &FontSource) -> Result<Self> {
        let pixmap = Pixmap::new(width, height).ok_or(SurfaceError::InvalidSize { width, height })?;
        Ok(Self {
            pixmap,
            glyphs: GlyphRasterizer::load(font)?,
            warned_no_font: false,
        })
    }

    /// Use an already loaded font.
    pub fn with_glyphs(width: u32, height: u32, glyphs: GlyphRasterizer) -> Result<Self> {
        let mut ctx = Self::new(width, height, &FontSource::Disabled)?;
        ctx.glyphs = Some(glyphs);
        Ok(ctx)
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Bytes per row of the exported buffer.
    pub fn stride(&self) -> usize {
        self.pixmap.width() as usize * 4
    }

    pub fn has_font(&self) -> bool {
        self.glyphs.is_some()
    }

    /// Reallocate the pixmap. Contents are discarded.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == self.width() && height == self.height() {
            return Ok(());
        }
        self.pixmap = Pixmap::new(width, height).ok_or(SurfaceError::InvalidSize { width, height })?;
        Ok(())
    }

    /// Clear every pixel to transparent.
    pub fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, paint: &Paint) {
        if let Some(rect) = Rect::from_xywh(x, y, w, h) {
            self.pixmap.fill_rect(rect, &paint.to_skia(), Transform::identity(), None);
        }
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, paint: &Paint, style: &StrokeStyle) {
        let Some(rect) = Rect::from_xywh(x, y, w, h) else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        let width = style.width.max(0.0);

        if !style.shadow_color.is_transparent() && style.shadow_blur > 0.0 {
            // Approximate the blur with widening translucent rings.
            const RINGS: u32 = 3;
            for ring in (1..=RINGS).rev() {
                let spread = style.shadow_blur * ring as f32 / RINGS as f32;
                let color = style.shadow_color.with_alpha_scaled(1.0 / (ring as f32 + 1.0));
                let shadow = Stroke {
                    width: width + spread,
                    line_join: style.join.to_skia(),
                    ..Stroke::default()
                };
                self.pixmap.stroke_path(&path, &Paint::Solid(color).to_skia(), &shadow, Transform::identity(), None);
            }
        }

        let stroke = Stroke {
            width,
            line_join: style.join.to_skia(),
            ..Stroke::default()
        };
        self.pixmap.stroke_path(&path, &paint.to_skia(), &stroke, Transform::identity(), None);
    }

    /// Draw one line of text with its baseline at `baseline`. Glyphs past
    /// `style.max_width` are clipped. Returns the drawn advance width.
    pub fn fill_text(&mut self, text: &str, x: f32, baseline: f32, style: &TextStyle, paint: &Paint) -> f32 {
        let Some(glyphs) = self.glyphs.as_mut() else {
            if !self.warned_no_font {
                tracing::warn!("raster: no font loaded, skipping text draws");
                self.warned_no_font = true;
            }
            return 0.0;
        };

        let line = glyphs.layout_line(text, x, baseline, style.size, style.max_width);
        let shear = if style.italic { ITALIC_SHEAR } else { 0.0 };

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for placed in &line.glyphs {
            let Some(glyph) = glyphs.cached(placed.key) else {
                continue;
            };
            let (w, h) = (glyph.metrics.width as f32, glyph.metrics.height as f32);
            if w == 0.0 || h == 0.0 {
                continue;
            }
            let lean = shear * (baseline - placed.top).max(0.0);
            min_x = min_x.min(placed.left);
            min_y = min_y.min(placed.top);
            max_x = max_x.max(placed.left + w + lean);
            max_y = max_y.max(placed.top + h);
        }
        if min_x > max_x || min_y > max_y {
            return line.width;
        }

        let bx = min_x.floor() as i32;
        let by = min_y.floor() as i32;
        let bw = (max_x.ceil() as i32 - bx + 1).max(1) as u32;
        let bh = (max_y.ceil() as i32 - by + 1).max(1) as u32;
        let (Some(mut mask), Some(mut layer)) = (Mask::new(bw, bh), Pixmap::new(bw, bh)) else {
            return line.width;
        };

        let data = mask.data_mut();
        for placed in &line.glyphs {
            let Some(glyph) = glyphs.cached(placed.key) else {
                continue;
            };
            let gw = glyph.metrics.width;
            for (row, coverage) in glyph.coverage.chunks_exact(gw.max(1)).enumerate() {
                let y = placed.top + row as f32;
                let lean = shear * (baseline - y);
                let py = (y - by as f32).round() as i32;
                if py < 0 || py >= bh as i32 {
                    continue;
                }
                for (col, &cov) in coverage.iter().enumerate() {
                    if cov == 0 {
                        continue;
                    }
                    let px = (placed.left + col as f32 + lean - bx as f32).round() as i32;
                    if px < 0 || px >= bw as i32 {
                        continue;
                    }
                    let idx = py as usize * bw as usize + px as usize;
                    data[idx] = data[idx].max(cov);
                }
            }
        }

        if let Some(rect) = Rect::from_xywh(bx as f32, by as f32, bw as f32, bh as f32) {
            let shift = Transform::from_translate(-(bx as f32), -(by as f32));
            layer.fill_rect(rect, &paint.to_skia(), shift, Some(&mask));
            self.pixmap
                .draw_pixmap(bx, by, layer.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
        }
        line.width
    }

    /// Advance width of `text` at `size`, or 0 without a font.
    pub fn measure_text(&mut self, text: &str, size: f32) -> f32 {
        self.glyphs.as_mut().map_or(0.0, |glyphs| glyphs.measure(text, size))
    }

    /// Blit `image` fitted into the box at (`x`, `y`, `w`, `h`).
    pub fn draw_image(&mut self, image: &RasterImage, x: f32, y: f32, w: f32, h: f32, fit: ImageFitMode) {
        let ([dx, dy], [dw, dh]) = calculate_image_fit(
            [x, y],
            [w, h],
            [image.width() as f32, image.height() as f32],
            fit,
        );
        if dw <= 0.0 || dh <= 0.0 {
            return;
        }

        let clip = if fit == ImageFitMode::Cover {
            let Some(rect) = Rect::from_xywh(x, y, w, h) else {
                return;
            };
            let Some(mut mask) = Mask::new(self.width(), self.height()) else {
                return;
            };
            mask.fill_path(&PathBuilder::from_rect(rect), FillRule::Winding, false, Transform::identity());
            Some(mask)
        } else {
            None
        };

        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        let transform = Transform::from_row(
            dw / image.width() as f32,
            0.0,
            0.0,
            dh / image.height() as f32,
            dx,
            dy,
        );
        self.pixmap
            .draw_pixmap(0, 0, image.pixmap.as_ref(), &paint, transform, clip.as_ref());
    }

    /// Straight-alpha color of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let color = self.pixmap.pixel(x, y)?.demultiply();
        Some(Rgba::new(color.red(), color.green(), color.blue(), color.alpha()))
    }

    /// Raw premultiplied RGBA bytes.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Copy the buffer out in the requested channel order.
    pub fn export(&self, format: PixelFormat) -> Vec<u8> {
        let mut out = self.pixmap.data().to_vec();
        if format == PixelFormat::Bgra8 {
            for px in out.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }
        out
    }

    /// Straight-alpha RGBA bytes, as image encoders expect.
    pub fn to_straight_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixmap.data().len());
        for px in self.pixmap.pixels() {
            let c = px.demultiply();
            out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RasterContext {
        RasterContext::new(64, 32, &FontSource::Disabled).unwrap()
    }

    #[test]
    fn fill_rect_paints_only_inside() {
        let mut ctx = ctx();
        ctx.fill_rect(10.0, 10.0, 8.0, 8.0, &Paint::Solid(Rgba::new(255, 0, 0, 255)));
        assert_eq!(ctx.pixel(12, 12), Some(Rgba::new(255, 0, 0, 255)));
        assert_eq!(ctx.pixel(2, 2), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn zero_sized_rect_is_a_no_op() {
        let mut ctx = ctx();
        ctx.fill_rect(0.0, 0.0, 0.0, 10.0, &Paint::Solid(Rgba::WHITE));
        assert!(ctx.data().iter().all(|b| *b == 0));
    }

    #[test]
    fn gradient_runs_from_start_to_end_color() {
        let mut ctx = ctx();
        let paint = Paint::LinearGradient {
            from: Rgba::BLACK,
            to: Rgba::WHITE,
            start: [0.0, 0.0],
            end: [64.0, 0.0],
        };
        ctx.fill_rect(0.0, 0.0, 64.0, 32.0, &paint);
        let left = ctx.pixel(0, 5).unwrap();
        let right = ctx.pixel(63, 5).unwrap();
        assert!(left.r < 20, "left edge should be near black: {left:?}");
        assert!(right.r > 235, "right edge should be near white: {right:?}");
    }

    #[test]
    fn stroke_leaves_interior_empty() {
        let mut ctx = ctx();
        let style = StrokeStyle {
            width: 2.0,
            ..StrokeStyle::default()
        };
        ctx.stroke_rect(4.0, 4.0, 20.0, 20.0, &Paint::Solid(Rgba::WHITE), &style);
        assert_eq!(ctx.pixel(4, 12).map(|c| c.a), Some(255));
        assert_eq!(ctx.pixel(14, 14), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn export_swaps_channels_for_bgra() {
        let mut ctx = ctx();
        ctx.fill_rect(0.0, 0.0, 64.0, 32.0, &Paint::Solid(Rgba::new(10, 20, 30, 255)));
        assert_eq!(&ctx.export(PixelFormat::Rgba8)[..4], &[10, 20, 30, 255]);
        assert_eq!(&ctx.export(PixelFormat::Bgra8)[..4], &[30, 20, 10, 255]);
        assert_eq!(ctx.stride(), 256);
    }

    #[test]
    fn text_without_font_draws_nothing() {
        let mut ctx = ctx();
        let style = TextStyle {
            size: 13.0,
            max_width: 64.0,
            italic: false,
        };
        assert_eq!(ctx.fill_text("hello", 0.0, 20.0, &style, &Paint::default()), 0.0);
        assert!(ctx.data().iter().all(|b| *b == 0));
    }

    #[test]
    fn text_with_system_font_respects_max_width() {
        let Some(glyphs) = GlyphRasterizer::from_system_fonts() else {
            return; // no fonts installed on this machine
        };
        let mut ctx = RasterContext::with_glyphs(200, 40, glyphs).unwrap();
        let style = TextStyle {
            size: 16.0,
            max_width: 30.0,
            italic: true,
        };
        let drawn = ctx.fill_text("a rather long line of text", 5.0, 30.0, &style, &Paint::Solid(Rgba::WHITE));
        assert!(drawn <= 30.5);
        assert!(ctx.data().iter().any(|b| *b != 0));
        for x in 60..200 {
            for y in 0..40 {
                assert_eq!(ctx.pixel(x, y), Some(Rgba::TRANSPARENT));
            }
        }
    }

    #[test]
    fn contain_letterboxes_and_cover_crops() {
        let (origin, size) = calculate_image_fit([0.0, 0.0], [100.0, 50.0], [50.0, 50.0], ImageFitMode::Contain);
        assert_eq!(size, [50.0, 50.0]);
        assert_eq!(origin, [25.0, 0.0]);

        let (origin, size) = calculate_image_fit([10.0, 10.0], [100.0, 50.0], [50.0, 50.0], ImageFitMode::Cover);
        assert_eq!(size, [100.0, 100.0]);
        assert_eq!(origin, [10.0, -15.0]);
    }

    #[test]
    fn cover_blit_is_clipped_to_box() {
        let mut ctx = ctx();
        let image = RasterImage::from_rgba(2, 2, vec![0, 255, 0, 255].repeat(4)).unwrap();
        ctx.draw_image(&image, 10.0, 10.0, 20.0, 10.0, ImageFitMode::Cover);
        assert_eq!(ctx.pixel(15, 15).map(|c| c.g), Some(255));
        assert_eq!(ctx.pixel(15, 5), Some(Rgba::TRANSPARENT));
        assert_eq!(ctx.pixel(15, 25), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn image_buffer_size_is_checked() {
        let err = RasterImage::from_rgba(2, 2, vec![0; 3]).unwrap_err();
        assert!(matches!(err, SurfaceError::BufferSize { expected: 16, actual: 3 }));
    }
}

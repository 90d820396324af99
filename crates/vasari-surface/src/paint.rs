//! Solid and gradient paints in device space.

use tiny_skia::{Color, GradientStop, LinearGradient, Point, SpreadMode, Transform};

/// Straight (non-premultiplied) RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse any CSS color string (`#rgb`, `#rrggbbaa`, `rgb()`, named colors, ...).
    pub fn parse(value: &str) -> Option<Self> {
        let color = csscolorparser::parse(value.trim()).ok()?;
        let [r, g, b, a] = color.to_rgba8();
        Some(Self { r, g, b, a })
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Same color with its alpha scaled by `factor` (0..=1).
    pub fn with_alpha_scaled(self, factor: f32) -> Self {
        let a = (self.a as f32 * factor.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }

    pub(crate) fn to_skia(self) -> Color {
        Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

/// What a fill or stroke is painted with. Gradient points are absolute
/// surface coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Rgba),
    LinearGradient {
        from: Rgba,
        to: Rgba,
        start: [f32; 2],
        end: [f32; 2],
    },
}

impl Default for Paint {
    fn default() -> Self {
        Paint::Solid(Rgba::BLACK)
    }
}

impl Paint {
    pub(crate) fn to_skia(&self) -> tiny_skia::Paint<'static> {
        let mut paint = tiny_skia::Paint {
            anti_alias: true,
            ..tiny_skia::Paint::default()
        };
        match self {
            Paint::Solid(color) => paint.set_color(color.to_skia()),
            Paint::LinearGradient { from, to, start, end } => {
                let shader = LinearGradient::new(
                    Point::from_xy(start[0], start[1]),
                    Point::from_xy(end[0], end[1]),
                    vec![
                        GradientStop::new(0.0, from.to_skia()),
                        GradientStop::new(1.0, to.to_skia()),
                    ],
                    SpreadMode::Pad,
                    Transform::identity(),
                );
                match shader {
                    Some(shader) => paint.shader = shader,
                    // Degenerate axis (start == end): paint the start color.
                    None => paint.set_color(from.to_skia()),
                }
            }
        }
        paint
    }
}

//! Appearance resolution: absolute layout and paint state for one node.
//!
//! Offsets accumulate top-down (`left = parent.left + x`), sizes inherit
//! when unset, and every knob falls back to a default. A numeric attribute
//! that fails to coerce is recorded and replaced by the value it would have
//! had if it were absent.

use crate::attributes::{AttributeValue, Attributes};
use vasari_surface::{LineJoin, Paint, Rgba, StrokeStyle};

/// Style used when neither a node nor any ancestor names one.
pub const DEFAULT_STYLE: &str = "white";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    Fill,
    #[default]
    Stroke,
}

/// Parsed `linear-gradient(from, to, x0, y0, x1, y1)`. Coordinates are
/// relative to the node's box.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientSpec {
    pub from: String,
    pub to: String,
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// What the node is painted with, before color parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleSpec {
    Solid(String),
    Gradient(GradientSpec),
}

impl Default for StyleSpec {
    fn default() -> Self {
        StyleSpec::Solid(DEFAULT_STYLE.to_string())
    }
}

/// Resolved layout and paint state of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Appearance {
    pub draw_mode: DrawMode,
    pub style: StyleSpec,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub max_width: f32,
    pub shadow_color: String,
    pub shadow_blur: f32,
    pub line_join: String,
    pub line_width: f32,
    pub font_size: f32,
    /// Attributes whose values could not be coerced to numbers.
    pub coercion_failures: Vec<String>,
}

impl Appearance {
    /// The implicit parent of a document root: the whole surface.
    pub fn surface(width: f32, height: f32, font_size: f32) -> Self {
        Self {
            draw_mode: DrawMode::Fill,
            style: StyleSpec::default(),
            left: 0.0,
            top: 0.0,
            width,
            height,
            max_width: width,
            shadow_color: "transparent".to_string(),
            shadow_blur: 0.0,
            line_join: "solid".to_string(),
            line_width: 1.0,
            font_size,
            coercion_failures: Vec::new(),
        }
    }

    /// Resolve `attrs` against an already resolved parent.
    pub fn resolve(attrs: &Attributes, parent: &Appearance, surface_width: f32, default_font_size: f32) -> Self {
        let mut failures = Vec::new();
        let mut number = |key: &str| -> Option<f32> {
            match attrs.get(key)? {
                AttributeValue::Text(text) => match text.trim().parse::<f32>() {
                    Ok(value) if value.is_finite() => Some(value),
                    _ => {
                        failures.push(key.to_string());
                        None
                    }
                },
                AttributeValue::Flag => {
                    failures.push(key.to_string());
                    None
                }
            }
        };

        let draw_mode = if attrs.has("fill") { DrawMode::Fill } else { DrawMode::Stroke };
        let left = parent.left + number("x").unwrap_or(0.0);
        let top = parent.top + number("y").unwrap_or(0.0);
        let width = number("width").unwrap_or(parent.width);
        let height = number("height").unwrap_or(parent.height);
        let max_width = number("maxWidth").unwrap_or(surface_width - left);
        let shadow_blur = number("shadowBlur").unwrap_or(0.0);
        let line_width = number("lineWidth").unwrap_or(1.0);
        let font_size = number("size").unwrap_or(default_font_size);

        let style = match attrs.text("style").map(str::trim) {
            Some(style) if style.starts_with("linear-gradient") => {
                StyleSpec::Gradient(parse_gradient(style, width, height, &mut failures))
            }
            Some(style) if !style.is_empty() => StyleSpec::Solid(style.to_string()),
            _ => parent.style.clone(),
        };

        for key in &failures {
            tracing::warn!(attribute = %key, "appearance: value is not a number, using default");
        }

        Self {
            draw_mode,
            style,
            left,
            top,
            width,
            height,
            max_width,
            shadow_color: attrs.text("shadowColor").unwrap_or("transparent").to_string(),
            shadow_blur,
            line_join: attrs.text("lineJoin").unwrap_or("solid").to_string(),
            line_width,
            font_size,
            coercion_failures: failures,
        }
    }

    /// Inclusive containment: points on the box edges are inside.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.left <= x && x <= self.left + self.width && self.top <= y && y <= self.top + self.height
    }

    /// Paint for this node, with gradient points translated into surface space.
    pub fn paint(&self) -> Paint {
        materialize(&self.style, self.left, self.top)
    }

    /// Stroke state applied when the node is in stroke mode.
    pub fn stroke_style(&self) -> StrokeStyle {
        StrokeStyle {
            width: self.line_width,
            join: LineJoin::parse(&self.line_join),
            shadow_color: Rgba::parse(&self.shadow_color).unwrap_or(Rgba::TRANSPARENT),
            shadow_blur: self.shadow_blur,
        }
    }
}

/// Turn a style into a raster paint for a box whose origin is (`left`, `top`).
pub fn materialize(style: &StyleSpec, left: f32, top: f32) -> Paint {
    match style {
        StyleSpec::Solid(color) => Paint::Solid(parse_color(color, Rgba::WHITE)),
        StyleSpec::Gradient(g) => Paint::LinearGradient {
            from: parse_color(&g.from, Rgba::BLACK),
            to: parse_color(&g.to, Rgba::WHITE),
            start: [left + g.x0, top + g.y0],
            end: [left + g.x1, top + g.y1],
        },
    }
}

fn parse_color(value: &str, fallback: Rgba) -> Rgba {
    Rgba::parse(value).unwrap_or_else(|| {
        tracing::warn!(color = value, "appearance: unparseable color");
        fallback
    })
}

/// Parse the argument list of `linear-gradient(...)`.
fn parse_gradient(style: &str, width: f32, height: f32, failures: &mut Vec<String>) -> GradientSpec {
    let body = style
        .trim_start_matches("linear-gradient")
        .trim()
        .trim_start_matches('(');
    let body = body.strip_suffix(')').unwrap_or(body);
    let args = split_top_level(body);
    let arg = |i: usize| args.get(i).map(|s| s.trim()).filter(|s| !s.is_empty());
    let mut coord = |i: usize, name: &str, default: f32| match arg(i) {
        None => default,
        Some(text) => match text.parse::<f32>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                failures.push(format!("style.{name}"));
                default
            }
        },
    };

    GradientSpec {
        from: arg(0).unwrap_or("black").to_string(),
        to: arg(1).unwrap_or("white").to_string(),
        x0: coord(2, "x0", 0.0),
        y0: coord(3, "y0", 0.0),
        x1: coord(4, "x1", width),
        y1: coord(5, "y1", height),
    }
}

/// Split on commas that are not nested inside parentheses.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in body.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::extract;

    fn surface() -> Appearance {
        Appearance::surface(1024.0, 576.0, 13.0)
    }

    #[test]
    fn root_inherits_surface_box() {
        let root = Appearance::resolve(&extract(""), &surface(), 1024.0, 13.0);
        assert_eq!((root.left, root.top, root.width, root.height), (0.0, 0.0, 1024.0, 576.0));
        assert_eq!(root.draw_mode, DrawMode::Stroke);
        assert_eq!(root.max_width, 1024.0);
        assert_eq!(root.shadow_color, "transparent");
        assert_eq!(root.line_join, "solid");
        assert_eq!(root.line_width, 1.0);
        assert_eq!(root.font_size, 13.0);
    }

    #[test]
    fn offsets_accumulate_and_sizes_inherit() {
        let parent = Appearance::resolve(&extract("x={10} y={20} width={300} height={200}"), &surface(), 1024.0, 13.0);
        let child = Appearance::resolve(&extract("fill x={5} y={7} height={50}"), &parent, 1024.0, 13.0);
        assert_eq!((child.left, child.top), (15.0, 27.0));
        assert_eq!((child.width, child.height), (300.0, 50.0));
        assert_eq!(child.max_width, 1024.0 - 15.0);
        assert_eq!(child.draw_mode, DrawMode::Fill);
    }

    #[test]
    fn explicit_zero_size_is_honoured() {
        let node = Appearance::resolve(&extract("width={0}"), &surface(), 1024.0, 13.0);
        assert_eq!(node.width, 0.0);
        assert_eq!(node.height, 576.0);
    }

    #[test]
    fn coercion_failures_fall_back_and_are_recorded() {
        let parent = Appearance::resolve(&extract("x={10} width={300}"), &surface(), 1024.0, 13.0);
        let node = Appearance::resolve(&extract("x=\"abc\" width=\"wide\" size lineWidth={2}"), &parent, 1024.0, 13.0);
        assert_eq!(node.left, 10.0);
        assert_eq!(node.width, 300.0);
        assert_eq!(node.font_size, 13.0);
        assert_eq!(node.line_width, 2.0);
        assert_eq!(node.coercion_failures, vec!["x", "width", "size"]);
    }

    #[test]
    fn gradient_defaults_to_box_diagonal() {
        let node = Appearance::resolve(
            &extract("style=\"linear-gradient(#80088090, #ff000050)\" width={36} height={36}"),
            &surface(),
            1024.0,
            13.0,
        );
        let StyleSpec::Gradient(g) = &node.style else {
            panic!("expected gradient, got {:?}", node.style);
        };
        assert_eq!((g.from.as_str(), g.to.as_str()), ("#80088090", "#ff000050"));
        assert_eq!((g.x0, g.y0, g.x1, g.y1), (0.0, 0.0, 36.0, 36.0));
    }

    #[test]
    fn gradient_with_functional_colors_and_points() {
        let node = Appearance::resolve(
            &extract("x={100} y={50} style={linear-gradient(rgba(0, 0, 0, 0.5), white, 0, 0, 10, 0)}"),
            &surface(),
            1024.0,
            13.0,
        );
        let StyleSpec::Gradient(g) = &node.style else {
            panic!("expected gradient");
        };
        assert_eq!(g.from, "rgba(0, 0, 0, 0.5)");
        assert_eq!((g.x1, g.y1), (10.0, 0.0));
        match node.paint() {
            Paint::LinearGradient { start, end, .. } => {
                assert_eq!(start, [100.0, 50.0]);
                assert_eq!(end, [110.0, 50.0]);
            }
            other => panic!("expected gradient paint, got {other:?}"),
        }
    }

    #[test]
    fn empty_gradient_uses_black_to_white() {
        let node = Appearance::resolve(&extract("style=\"linear-gradient()\""), &surface(), 1024.0, 13.0);
        let StyleSpec::Gradient(g) = &node.style else {
            panic!("expected gradient");
        };
        assert_eq!((g.from.as_str(), g.to.as_str()), ("black", "white"));
    }

    #[test]
    fn style_inherits_from_parent() {
        let parent = Appearance::resolve(&extract("style=\"#ff0000\""), &surface(), 1024.0, 13.0);
        let child = Appearance::resolve(&extract("fill"), &parent, 1024.0, 13.0);
        assert_eq!(child.paint(), Paint::Solid(Rgba::new(255, 0, 0, 255)));
    }

    #[test]
    fn containment_is_inclusive() {
        let node = Appearance::resolve(&extract("x={10} y={10} width={20} height={20}"), &surface(), 1024.0, 13.0);
        assert!(node.contains(10.0, 10.0));
        assert!(node.contains(30.0, 30.0));
        assert!(!node.contains(30.1, 30.0));
        assert!(!node.contains(9.9, 15.0));
    }

    #[test]
    fn stroke_state_parses_knobs() {
        let node = Appearance::resolve(
            &extract("shadowColor=\"#ff000080\" shadowBlur={4} lineJoin=\"round\" lineWidth={3}"),
            &surface(),
            1024.0,
            13.0,
        );
        let stroke = node.stroke_style();
        assert_eq!(stroke.width, 3.0);
        assert_eq!(stroke.join, LineJoin::Round);
        assert_eq!(stroke.shadow_color, Rgba::new(255, 0, 0, 128));
        assert_eq!(stroke.shadow_blur, 4.0);
    }
}

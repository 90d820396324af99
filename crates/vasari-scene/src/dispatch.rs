//! Render pass: walk the document, resolve appearances, register listeners,
//! draw each node and update the component registry.

use crate::appearance::{Appearance, DrawMode};
use crate::attributes::{extract, Attributes};
use crate::components::{Component, ComponentKind, ComponentRegistry, ImageStatus, Upsert};
use crate::data_record::DataRecord;
use crate::error::ScriptError;
use crate::image_cache::{ImageCache, ImageLookup};
use crate::input::InputBuffers;
use crate::listeners::{DefaultAction, EventClass, EventTarget, ListenerEntry, ListenerTable, Slot};
use crate::script::{Effect, ScriptBindings};
use ego_tree::NodeRef;
use vasari_io::ImageDecodeService;
use vasari_markup::{text_content, MarkupNode};
use vasari_surface::{ImageFitMode, Paint, RasterContext, RasterImage, Rgba, TextStyle};

/// Background of a `View` without its own style.
pub const VIEW_BACKGROUND: Rgba = Rgba::new(0x11, 0x11, 0x11, 0xFF);

/// Text color of a hovered link.
pub const LINK_HIGHLIGHT: Rgba = Rgba::new(0x3F, 0x82, 0xF6, 0xFF);

/// Line advance for multi-line draws, as a multiple of font size.
const LINE_SPACING: f32 = 1.4;

/// Counters describing one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderReport {
    /// Elements visited.
    pub nodes: usize,
    /// Components stored anew.
    pub built: usize,
    /// Components whose stored record was unchanged.
    pub reused: usize,
    /// Components dropped because their id disappeared.
    pub removed: usize,
    pub listeners: usize,
    pub coercion_failures: usize,
}

/// Everything a pass reads and writes, borrowed from the runtime.
pub struct PassContext<'a> {
    pub raster: &'a mut RasterContext,
    pub registry: &'a mut ComponentRegistry,
    pub listeners: &'a mut ListenerTable,
    pub inputs: &'a mut InputBuffers,
    pub script: &'a mut ScriptBindings,
    pub images: &'a mut ImageCache,
    pub decoder: &'a mut ImageDecodeService,
    pub focus: Option<&'a str>,
    pub hover: Option<&'a str>,
    pub default_font_size: f32,
}

/// Output of a pass: counters plus effects requested by `Declare` bodies.
#[derive(Debug, Default)]
pub struct PassOutput {
    pub report: RenderReport,
    pub effects: Vec<Effect>,
}

/// Inherited walk state.
struct Scope<'p> {
    appearance: &'p Appearance,
    in_hovered_link: bool,
}

/// Run one full render pass over `document`.
pub fn render(document: &str, ctx: &mut PassContext<'_>) -> Result<PassOutput, ScriptError> {
    ctx.raster.clear();
    ctx.registry.begin_pass();
    ctx.listeners.clear();
    ctx.script.begin_pass();

    let source = ctx.script.state().interpolate(document);
    let tree = vasari_markup::parse(&source);
    let surface = Appearance::surface(
        ctx.raster.width() as f32,
        ctx.raster.height() as f32,
        ctx.default_font_size,
    );
    let scope = Scope {
        appearance: &surface,
        in_hovered_link: false,
    };

    let mut out = PassOutput::default();
    for child in tree.fragment().children() {
        visit(child, &scope, ctx, &mut out)?;
    }

    out.report.removed = ctx.registry.end_pass();
    out.report.listeners = ctx.listeners.len();
    tracing::trace!(report = ?out.report, "dispatch: pass complete");
    Ok(out)
}

fn visit(
    node: NodeRef<'_, MarkupNode>,
    scope: &Scope<'_>,
    ctx: &mut PassContext<'_>,
    out: &mut PassOutput,
) -> Result<(), ScriptError> {
    let MarkupNode::Element(element) = node.value() else {
        return Ok(());
    };
    out.report.nodes += 1;

    let attrs = extract(&element.raw_attributes);
    let tag = element.tag_upper();
    let surface_width = ctx.raster.width() as f32;
    let appearance = Appearance::resolve(&attrs, scope.appearance, surface_width, ctx.default_font_size);
    out.report.coercion_failures += appearance.coercion_failures.len();
    let id = ctx.registry.resolve_id(&element.tag, &attrs);

    match tag.as_str() {
        "EVENT" => return ctx.script.register_event(&id, &text_content(node)),
        "DECLARE" => {
            let effects = ctx.script.declare(&id, &attrs, &text_content(node))?;
            out.effects.extend(effects);
            return Ok(());
        }
        _ => {}
    }

    register_listeners(&id, &tag, &attrs, &appearance, ctx);

    let hovered_link = tag == "LINK" && ctx.hover == Some(id.as_str());
    if let Some(component) = draw(&id, &tag, &attrs, appearance.clone(), node, scope, ctx) {
        match ctx.registry.upsert(component) {
            Upsert::Built => out.report.built += 1,
            Upsert::Reused => out.report.reused += 1,
        }
    }

    let child_scope = Scope {
        appearance: &appearance,
        in_hovered_link: hovered_link || scope.in_hovered_link,
    };
    for child in node.children() {
        visit(child, &child_scope, ctx, out)?;
    }
    Ok(())
}

fn register_listeners(id: &str, tag: &str, attrs: &Attributes, appearance: &Appearance, ctx: &mut PassContext<'_>) {
    let default = match tag {
        "VIEW" => DefaultAction::None,
        _ => DefaultAction::Log,
    };
    let mut entry = ListenerEntry::new(EventTarget {
        id: id.to_string(),
        tag: element_name(tag),
        attributes: attrs.clone(),
        appearance: appearance.clone(),
    });

    for class in [EventClass::Hover, EventClass::Click, EventClass::KeyDown] {
        if attrs.has(class.attribute()) {
            entry.set_slot(
                class,
                Slot {
                    handler: attrs.text(class.attribute()).map(str::to_string),
                    action: default,
                },
            );
        }
    }

    let mut implicit = |class: EventClass, action: DefaultAction| {
        let handler = entry.slot(class).and_then(|slot| slot.handler.clone());
        entry.set_slot(class, Slot { handler, action });
    };
    match tag {
        "INPUT" => {
            implicit(EventClass::Click, DefaultAction::FocusInput);
            if ctx.focus == Some(id) {
                implicit(EventClass::KeyDown, DefaultAction::EditInput);
            }
        }
        "LINK" => {
            implicit(EventClass::Hover, DefaultAction::HoverLink);
            implicit(EventClass::Click, DefaultAction::FollowLink);
        }
        _ => {}
    }

    ctx.listeners.register(entry);
}

/// `RECT` → `Rect`, for log lines and event targets.
fn element_name(tag: &str) -> String {
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn draw(
    id: &str,
    tag: &str,
    attrs: &Attributes,
    appearance: Appearance,
    node: NodeRef<'_, MarkupNode>,
    scope: &Scope<'_>,
    ctx: &mut PassContext<'_>,
) -> Option<Component> {
    let ap = &appearance;
    let kind = match tag {
        "RECT" => {
            let paint = ap.paint();
            match ap.draw_mode {
                DrawMode::Fill => ctx.raster.fill_rect(ap.left, ap.top, ap.width, ap.height, &paint),
                DrawMode::Stroke => ctx
                    .raster
                    .stroke_rect(ap.left, ap.top, ap.width, ap.height, &paint, &ap.stroke_style()),
            }
            ComponentKind::Rect
        }
        "TEXT" => {
            let text = attrs.text("text").map(str::to_string).unwrap_or_else(|| text_content(node));
            let paint = if scope.in_hovered_link {
                Paint::Solid(LINK_HIGHLIGHT)
            } else {
                ap.paint()
            };
            ctx.raster.fill_text(&text, ap.left, ap.top, &text_style(ap, false), &paint);
            ComponentKind::Text { text }
        }
        "DATA" => {
            let record = match DataRecord::parse(attrs.text("list").unwrap_or_default()) {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!(id, %err, "dispatch: data list has no keys");
                    None
                }
            };
            if let Some(record) = &record {
                let paint = ap.paint();
                let style = text_style(ap, false);
                for (i, line) in record.display_lines().iter().enumerate() {
                    let baseline = ap.top + ap.font_size * LINE_SPACING * i as f32;
                    ctx.raster.fill_text(line, ap.left, baseline, &style, &paint);
                }
            }
            ComponentKind::Data { record }
        }
        "IMAGE" => {
            let path = attrs.text("path").unwrap_or_default().to_string();
            let fit = if attrs.has("cover") {
                ImageFitMode::Cover
            } else {
                ImageFitMode::Contain
            };
            let status = if path.is_empty() {
                tracing::warn!(id, "dispatch: image without a path");
                ImageStatus::Failed
            } else {
                match ctx.images.lookup(&path) {
                    ImageLookup::Ready(image) => {
                        blit(ctx.raster, ap, fit, &image);
                        ImageStatus::Ready
                    }
                    ImageLookup::Loading => ImageStatus::Pending,
                    ImageLookup::Failed => ImageStatus::Failed,
                    ImageLookup::Start(request_id) => {
                        ctx.decoder.request(request_id, &path);
                        ImageStatus::Pending
                    }
                }
            };
            ComponentKind::Image { path, fit, status }
        }
        "VIEW" => {
            let paint = if attrs.has("style") {
                ap.paint()
            } else {
                Paint::Solid(VIEW_BACKGROUND)
            };
            ctx.raster.fill_rect(ap.left, ap.top, ap.width, ap.height, &paint);
            ComponentKind::View
        }
        "INPUT" => {
            let value = ctx.inputs.seed(id, attrs.text("value").unwrap_or_default()).to_string();
            let placeholder = attrs.text("placeholder").unwrap_or_default().to_string();
            let focused = ctx.focus == Some(id);
            draw_input(ctx.raster, attrs, ap, &value, &placeholder, focused);
            ComponentKind::Input {
                placeholder,
                value,
                focused,
            }
        }
        "LINK" => ComponentKind::Link {
            href: link_href(attrs, node),
            hovered: ctx.hover == Some(id),
        },
        "AUDIO" | "VIDEO" => {
            let text = format!("{} not yet supported.", element_name(tag));
            let baseline = ap.top + ap.font_size * LINE_SPACING;
            ctx.raster.fill_text(&text, ap.left + 8.0, baseline, &text_style(ap, false), &ap.paint());
            ComponentKind::Placeholder { text }
        }
        _ => return None,
    };
    Some(Component::new(id, appearance, kind))
}

fn text_style(ap: &Appearance, italic: bool) -> TextStyle {
    TextStyle {
        size: ap.font_size,
        max_width: ap.max_width,
        italic,
    }
}

/// Blit a decoded image into a component's box.
pub fn blit(raster: &mut RasterContext, ap: &Appearance, fit: ImageFitMode, image: &RasterImage) {
    raster.draw_image(image, ap.left, ap.top, ap.width, ap.height, fit);
}

fn draw_input(raster: &mut RasterContext, attrs: &Attributes, ap: &Appearance, value: &str, placeholder: &str, focused: bool) {
    raster.fill_rect(ap.left, ap.top, ap.width, ap.height, &ap.paint());

    let text_paint = attrs
        .text("textStyle")
        .and_then(Rgba::parse)
        .map_or(Paint::Solid(Rgba::WHITE), Paint::Solid);
    raster.fill_rect(ap.left, ap.top + ap.height - 1.0, ap.width, 1.0, &text_paint);

    let padding = ap.height / 2.0 + 4.0;
    let x = ap.left + padding / 2.0;
    let baseline = ap.top + padding;
    let style = TextStyle {
        size: ap.font_size,
        max_width: (ap.width - padding).max(0.0),
        italic: false,
    };
    let advance = if value.is_empty() {
        raster.fill_text(
            placeholder,
            x,
            baseline,
            &TextStyle { italic: true, ..style },
            &muted(&text_paint),
        );
        0.0
    } else {
        raster.fill_text(value, x, baseline, &style, &text_paint)
    };

    if focused {
        let caret_x = (x + advance + 1.0).min(ap.left + ap.width - padding / 2.0);
        raster.fill_rect(caret_x, baseline - ap.font_size, 1.0, ap.font_size + 2.0, &text_paint);
    }
}

fn muted(paint: &Paint) -> Paint {
    match *paint {
        Paint::Solid(color) => Paint::Solid(color.with_alpha_scaled(0.5)),
        Paint::LinearGradient { from, to, start, end } => Paint::LinearGradient {
            from: from.with_alpha_scaled(0.5),
            to: to.with_alpha_scaled(0.5),
            start,
            end,
        },
    }
}

/// A link's target: its `href`, else the text of its first `Text` child.
fn link_href(attrs: &Attributes, node: NodeRef<'_, MarkupNode>) -> Option<String> {
    if let Some(href) = attrs.text("href").filter(|h| !h.is_empty()) {
        return Some(href.to_string());
    }
    node.children()
        .filter_map(|child| child.value().as_element())
        .find(|el| el.is("text"))
        .and_then(|el| extract(&el.raw_attributes).text("text").map(str::to_string))
}

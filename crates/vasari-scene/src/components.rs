//! Component registry: typed records that persist across render passes.
//!
//! Each pass resolves an id per node, builds a candidate component and
//! upserts it. Candidates equal to the stored record are reused; anything
//! not seen by the end of the pass is dropped.

use crate::appearance::Appearance;
use crate::attributes::Attributes;
use crate::data_record::DataRecord;
use std::collections::{HashMap, HashSet};
use vasari_surface::ImageFitMode;

/// Decode state of an image component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Pending,
    Ready,
    Failed,
}

/// Kind-specific state of a component.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    Rect,
    Text {
        text: String,
    },
    Data {
        /// `None` when the list had no keys.
        record: Option<DataRecord>,
    },
    Image {
        path: String,
        fit: ImageFitMode,
        status: ImageStatus,
    },
    Input {
        placeholder: String,
        /// Buffer contents when the component was last built.
        value: String,
        focused: bool,
    },
    Link {
        href: Option<String>,
        hovered: bool,
    },
    View,
    /// Stand-in for media the runtime cannot play.
    Placeholder {
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub id: String,
    pub appearance: Appearance,
    pub kind: ComponentKind,
}

impl Component {
    pub fn new(id: impl Into<String>, appearance: Appearance, kind: ComponentKind) -> Self {
        Self {
            id: id.into(),
            appearance,
            kind,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ComponentKind::Rect => "Rect",
            ComponentKind::Text { .. } => "Text",
            ComponentKind::Data { .. } => "Data",
            ComponentKind::Image { .. } => "Image",
            ComponentKind::Input { .. } => "Input",
            ComponentKind::Link { .. } => "Link",
            ComponentKind::View => "View",
            ComponentKind::Placeholder { .. } => "Placeholder",
        }
    }

    /// Links are rebuilt every pass regardless of equality.
    fn always_rebuilt(&self) -> bool {
        matches!(self.kind, ComponentKind::Link { .. })
    }
}

/// Whether an upsert stored a new record or kept the existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Built,
    Reused,
}

#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: HashMap<String, Component>,
    ordinals: HashMap<String, usize>,
    seen: HashSet<String>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-pass bookkeeping. Stored components survive.
    pub fn begin_pass(&mut self) {
        self.ordinals.clear();
        self.seen.clear();
    }

    /// The node's explicit `id`, or `<tag>-<ordinal>` counting unnamed nodes
    /// of the same tag in document order.
    pub fn resolve_id(&mut self, tag: &str, attrs: &Attributes) -> String {
        if let Some(id) = attrs.text("id").map(str::trim).filter(|id| !id.is_empty()) {
            return id.to_string();
        }
        let tag = tag.to_ascii_lowercase();
        let ordinal = self.ordinals.entry(tag.clone()).or_insert(0);
        let id = format!("{tag}-{ordinal}");
        *ordinal += 1;
        id
    }

    /// Store `candidate` unless an equal record already exists.
    pub fn upsert(&mut self, candidate: Component) -> Upsert {
        self.seen.insert(candidate.id.clone());
        match self.components.get(&candidate.id) {
            Some(existing) if *existing == candidate && !candidate.always_rebuilt() => Upsert::Reused,
            _ => {
                self.components.insert(candidate.id.clone(), candidate);
                Upsert::Built
            }
        }
    }

    /// Drop components not seen this pass. Returns how many were removed.
    pub fn end_pass(&mut self) -> usize {
        let before = self.components.len();
        let seen = &self.seen;
        self.components.retain(|id, _| seen.contains(id));
        before - self.components.len()
    }

    pub fn get(&self, id: &str) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Component> {
        self.components.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Component> {
        self.components.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::extract;

    fn rect(id: &str, raw: &str) -> Component {
        let attrs = extract(raw);
        let appearance = Appearance::resolve(&attrs, &Appearance::surface(100.0, 100.0, 13.0), 100.0, 13.0);
        Component::new(id, appearance, ComponentKind::Rect)
    }

    #[test]
    fn generated_ids_count_per_tag() {
        let mut registry = ComponentRegistry::new();
        let none = Attributes::new();
        assert_eq!(registry.resolve_id("Rect", &none), "rect-0");
        assert_eq!(registry.resolve_id("Text", &none), "text-0");
        assert_eq!(registry.resolve_id("Rect", &extract(r#"id="named""#)), "named");
        assert_eq!(registry.resolve_id("RECT", &none), "rect-1");
        registry.begin_pass();
        assert_eq!(registry.resolve_id("Rect", &none), "rect-0");
    }

    #[test]
    fn equal_candidates_are_reused() {
        let mut registry = ComponentRegistry::new();
        registry.begin_pass();
        assert_eq!(registry.upsert(rect("a", "x={1}")), Upsert::Built);
        registry.end_pass();

        registry.begin_pass();
        assert_eq!(registry.upsert(rect("a", "x={1}")), Upsert::Reused);
        registry.end_pass();

        registry.begin_pass();
        assert_eq!(registry.upsert(rect("a", "x={2}")), Upsert::Built);
        assert_eq!(registry.get("a").unwrap().appearance.left, 2.0);
    }

    #[test]
    fn links_are_always_rebuilt() {
        let mut registry = ComponentRegistry::new();
        let link = || {
            Component::new(
                "l",
                Appearance::surface(10.0, 10.0, 13.0),
                ComponentKind::Link {
                    href: Some("a:page:b".into()),
                    hovered: false,
                },
            )
        };
        assert_eq!(registry.upsert(link()), Upsert::Built);
        assert_eq!(registry.upsert(link()), Upsert::Built);
    }

    #[test]
    fn unseen_components_are_removed() {
        let mut registry = ComponentRegistry::new();
        registry.begin_pass();
        registry.upsert(rect("a", ""));
        registry.upsert(rect("b", ""));
        assert_eq!(registry.end_pass(), 0);

        registry.begin_pass();
        registry.upsert(rect("b", ""));
        assert_eq!(registry.end_pass(), 1);
        assert!(registry.get("a").is_none());
        assert_eq!(registry.len(), 1);
    }
}

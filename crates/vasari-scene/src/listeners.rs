//! Listener table: per-pass registry of interactive boxes.
//!
//! Entries are keyed by component id and hold the geometry captured at draw
//! time plus up to three callback slots. The table is rebuilt from scratch
//! on every render pass.

use crate::appearance::Appearance;
use crate::attributes::Attributes;
use std::collections::HashMap;

/// Built-in behaviour a component contributes to an event slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultAction {
    #[default]
    None,
    /// Log the event at debug level (`Rect.onClick` and friends).
    Log,
    /// Give keyboard focus to an `Input`.
    FocusInput,
    /// Apply the key to the focused `Input`'s buffer.
    EditInput,
    /// Mark a `Link` as the hover target.
    HoverLink,
    /// Navigate to a `Link`'s target.
    FollowLink,
}

/// Event classes with their own slot and debounce deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    Hover,
    Click,
    KeyDown,
}

impl EventClass {
    pub fn handler_name(self) -> &'static str {
        match self {
            EventClass::Hover => "onHover",
            EventClass::Click => "onClick",
            EventClass::KeyDown => "onKeyDown",
        }
    }

    /// Attribute naming the script handler for this class.
    pub fn attribute(self) -> &'static str {
        match self {
            EventClass::Hover => "hover",
            EventClass::Click => "click",
            EventClass::KeyDown => "keydown",
        }
    }
}

/// The component an event is delivered to, as it was when drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTarget {
    pub id: String,
    pub tag: String,
    pub attributes: Attributes,
    pub appearance: Appearance,
}

/// One callback slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Slot {
    /// Name of an `Event` script to run first.
    pub handler: Option<String>,
    pub action: DefaultAction,
}

impl Slot {
    pub fn action(action: DefaultAction) -> Self {
        Self { handler: None, action }
    }

    pub fn is_empty(&self) -> bool {
        self.handler.is_none() && self.action == DefaultAction::None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListenerEntry {
    pub target: EventTarget,
    pub on_hover: Option<Slot>,
    pub on_click: Option<Slot>,
    pub on_key_down: Option<Slot>,
}

impl ListenerEntry {
    pub fn new(target: EventTarget) -> Self {
        Self {
            target,
            on_hover: None,
            on_click: None,
            on_key_down: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.target.id
    }

    pub fn slot(&self, class: EventClass) -> Option<&Slot> {
        match class {
            EventClass::Hover => self.on_hover.as_ref(),
            EventClass::Click => self.on_click.as_ref(),
            EventClass::KeyDown => self.on_key_down.as_ref(),
        }
    }

    pub fn set_slot(&mut self, class: EventClass, slot: Slot) {
        let place = match class {
            EventClass::Hover => &mut self.on_hover,
            EventClass::Click => &mut self.on_click,
            EventClass::KeyDown => &mut self.on_key_down,
        };
        *place = Some(slot);
    }

    pub fn has_slots(&self) -> bool {
        self.on_hover.is_some() || self.on_click.is_some() || self.on_key_down.is_some()
    }

    /// Inclusive box containment.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.target.appearance.contains(x, y)
    }
}

/// Listener entries in registration (document) order.
#[derive(Debug, Default)]
pub struct ListenerTable {
    entries: Vec<ListenerEntry>,
    index: HashMap<String, usize>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Insert an entry. A second entry with the same id replaces the first
    /// in place, keeping the earlier registration position.
    pub fn register(&mut self, entry: ListenerEntry) {
        if !entry.has_slots() {
            return;
        }
        match self.index.get(entry.id()) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(entry.id().to_string(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&ListenerEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ListenerEntry> {
        self.entries.iter()
    }

    /// Every entry whose box contains the point and has a `class` slot.
    /// Overlapping entries are all returned.
    pub fn hits(&self, x: f32, y: f32, class: EventClass) -> impl Iterator<Item = &ListenerEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.slot(class).is_some() && entry.contains(x, y))
    }

    /// Every entry with a non-empty key-down slot.
    pub fn key_targets(&self) -> impl Iterator<Item = &ListenerEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.on_key_down.as_ref().is_some_and(|slot| !slot.is_empty()))
    }
}

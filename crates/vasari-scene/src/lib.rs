//! vasari-scene: the retained-mode core of the Vasari runtime.
//!
//! A document is parsed every render pass. Each element's attributes are
//! extracted, its [`Appearance`] is resolved against its parent's, listener
//! entries are registered for interactive nodes, the node is drawn, and a
//! typed [`Component`] record is created or reused. Input is routed against
//! the listener table by the [`EventRouter`]; inline `Event`/`Declare`
//! scripts run on a small command interpreter. [`Runtime`] owns all of it.

pub mod appearance;
pub mod attributes;
pub mod components;
pub mod data_record;
pub mod dispatch;
pub mod error;
pub mod event_router;
pub mod image_cache;
pub mod input;
pub mod listeners;
pub mod navigation;
pub mod runtime;
pub mod script;

pub use appearance::{Appearance, DrawMode, GradientSpec, StyleSpec, DEFAULT_STYLE};
pub use attributes::{extract, AttributeValue, Attributes};
pub use components::{Component, ComponentKind, ComponentRegistry, ImageStatus, Upsert};
pub use data_record::DataRecord;
pub use dispatch::{RenderReport, LINK_HIGHLIGHT, VIEW_BACKGROUND};
pub use error::{DataRecordError, NavigationError, Result, RuntimeError, ScriptError};
pub use event_router::{EventRouter, Invocation, RouteOutcome};
pub use image_cache::{ImageCache, ImageLookup};
pub use input::{InputBuffers, KeyOutcome};
pub use listeners::{DefaultAction, EventClass, EventTarget, ListenerEntry, ListenerTable, Slot};
pub use navigation::{ContentKind, ContentPath, Navigator, CHROME_TEMPLATE, ROOT_PLACEHOLDER};
pub use runtime::{Runtime, RuntimeMessage, RuntimeOptions, Signal};
pub use script::{Capabilities, Effect, EventContext, Program, ScriptBindings, ScriptState, Value};

//! Global event router: debounce, hit-test, collect invocations.
//!
//! Routing never runs callbacks itself. It decides which listener slots an
//! event reaches and hands them back as [`Invocation`]s for the runtime to
//! execute, handler first and default action second.

use crate::listeners::{DefaultAction, EventClass, EventTarget, ListenerTable};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use vasari_surface::{KeyInput, SurfaceEvent};

/// One slot reached by an event.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub class: EventClass,
    pub handler: Option<String>,
    pub action: DefaultAction,
    pub target: EventTarget,
    pub point: Option<(f32, f32)>,
    pub key: Option<KeyInput>,
}

/// What the router did with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Arrived inside the debounce window of its class.
    Debounced,
    /// Accepted: run these (possibly none) and schedule a render.
    Accepted(Vec<Invocation>),
    /// Surface changed size; re-present the current buffer.
    Resized { width: u32, height: u32 },
    /// Accepted without effect (pointer-up).
    Released,
    Close,
}

#[derive(Debug)]
pub struct EventRouter {
    interval: Duration,
    deadlines: HashMap<EventClass, Instant>,
    hover: Option<String>,
}

impl EventRouter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadlines: HashMap::new(),
            hover: None,
        }
    }

    /// Id of the link under the pointer as of the last accepted move.
    pub fn hover_target(&self) -> Option<&str> {
        self.hover.as_deref()
    }

    /// Forget hover state and deadlines (on document change).
    pub fn reset(&mut self) {
        self.hover = None;
        self.deadlines.clear();
    }

    pub fn route(&mut self, table: &ListenerTable, event: &SurfaceEvent, now: Instant) -> RouteOutcome {
        match event {
            SurfaceEvent::Resized { width, height } => RouteOutcome::Resized {
                width: *width,
                height: *height,
            },
            SurfaceEvent::CloseRequested => RouteOutcome::Close,
            SurfaceEvent::PointerUp { .. } => RouteOutcome::Released,
            SurfaceEvent::PointerMoved { x, y } => {
                if !self.accept(EventClass::Hover, now) {
                    return RouteOutcome::Debounced;
                }
                self.hover = table
                    .hits(*x, *y, EventClass::Hover)
                    .filter(|entry| {
                        entry
                            .slot(EventClass::Hover)
                            .is_some_and(|slot| slot.action == DefaultAction::HoverLink)
                    })
                    .last()
                    .map(|entry| entry.id().to_string());
                RouteOutcome::Accepted(pointer_hits(table, EventClass::Hover, *x, *y))
            }
            SurfaceEvent::PointerDown { x, y, .. } => {
                if !self.accept(EventClass::Click, now) {
                    return RouteOutcome::Debounced;
                }
                RouteOutcome::Accepted(pointer_hits(table, EventClass::Click, *x, *y))
            }
            SurfaceEvent::KeyDown(key) => {
                if !self.accept(EventClass::KeyDown, now) {
                    return RouteOutcome::Debounced;
                }
                let invocations = table
                    .key_targets()
                    .filter_map(|entry| {
                        let slot = entry.slot(EventClass::KeyDown)?;
                        Some(Invocation {
                            class: EventClass::KeyDown,
                            handler: slot.handler.clone(),
                            action: slot.action,
                            target: entry.target.clone(),
                            point: None,
                            key: Some(key.clone()),
                        })
                    })
                    .collect();
                RouteOutcome::Accepted(invocations)
            }
        }
    }

    /// Check and advance the deadline for `class`.
    fn accept(&mut self, class: EventClass, now: Instant) -> bool {
        if let Some(deadline) = self.deadlines.get(&class) {
            if now < *deadline {
                tracing::trace!(?class, "router: debounced");
                return false;
            }
        }
        self.deadlines.insert(class, now + self.interval);
        true
    }
}

fn pointer_hits(table: &ListenerTable, class: EventClass, x: f32, y: f32) -> Vec<Invocation> {
    table
        .hits(x, y, class)
        .filter_map(|entry| {
            let slot = entry.slot(class)?;
            Some(Invocation {
                class,
                handler: slot.handler.clone(),
                action: slot.action,
                target: entry.target.clone(),
                point: Some((x, y)),
                key: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::Appearance;
    use crate::attributes::extract;
    use crate::listeners::{ListenerEntry, Slot};
    use vasari_surface::PointerButton;

    fn table() -> ListenerTable {
        let mut table = ListenerTable::new();
        for (id, raw) in [
            ("a", "x={0} y={0} width={50} height={50}"),
            ("b", "x={40} y={40} width={20} height={20}"),
        ] {
            let attributes = extract(raw);
            let appearance = Appearance::resolve(&attributes, &Appearance::surface(100.0, 100.0, 13.0), 100.0, 13.0);
            let mut entry = ListenerEntry::new(EventTarget {
                id: id.into(),
                tag: "Rect".into(),
                attributes,
                appearance,
            });
            entry.set_slot(EventClass::Click, Slot::action(DefaultAction::Log));
            entry.set_slot(EventClass::Hover, Slot::action(DefaultAction::HoverLink));
            table.register(entry);
        }
        table
    }

    fn down(x: f32, y: f32) -> SurfaceEvent {
        SurfaceEvent::PointerDown {
            x,
            y,
            button: PointerButton::Primary,
        }
    }

    fn accepted(outcome: RouteOutcome) -> Vec<Invocation> {
        match outcome {
            RouteOutcome::Accepted(invocations) => invocations,
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[test]
    fn second_click_inside_window_is_debounced() {
        let table = table();
        let mut router = EventRouter::new(Duration::from_millis(30));
        let t0 = Instant::now();
        assert_eq!(accepted(router.route(&table, &down(10.0, 10.0), t0)).len(), 1);
        assert_eq!(
            router.route(&table, &down(10.0, 10.0), t0 + Duration::from_millis(1)),
            RouteOutcome::Debounced
        );
        assert_eq!(accepted(router.route(&table, &down(10.0, 10.0), t0 + Duration::from_millis(30))).len(), 1);
    }

    #[test]
    fn classes_debounce_independently_and_release_bypasses() {
        let table = table();
        let mut router = EventRouter::new(Duration::from_millis(30));
        let t0 = Instant::now();
        accepted(router.route(&table, &down(10.0, 10.0), t0));
        accepted(router.route(&table, &SurfaceEvent::PointerMoved { x: 1.0, y: 1.0 }, t0));
        accepted(router.route(&table, &SurfaceEvent::KeyDown(KeyInput::new("a")), t0));
        let up = SurfaceEvent::PointerUp {
            x: 1.0,
            y: 1.0,
            button: PointerButton::Primary,
        };
        assert_eq!(router.route(&table, &up, t0), RouteOutcome::Released);
        assert_eq!(
            router.route(&table, &SurfaceEvent::Resized { width: 8, height: 9 }, t0),
            RouteOutcome::Resized { width: 8, height: 9 }
        );
    }

    #[test]
    fn overlapping_entries_all_fire() {
        let table = table();
        let mut router = EventRouter::new(Duration::ZERO);
        let ids: Vec<_> = accepted(router.route(&table, &down(45.0, 45.0), Instant::now()))
            .into_iter()
            .map(|inv| inv.target.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn hover_target_is_the_last_registered_hit() {
        let table = table();
        let mut router = EventRouter::new(Duration::ZERO);
        let now = Instant::now();
        router.route(&table, &SurfaceEvent::PointerMoved { x: 45.0, y: 45.0 }, now);
        assert_eq!(router.hover_target(), Some("b"));
        router.route(&table, &SurfaceEvent::PointerMoved { x: 5.0, y: 5.0 }, now);
        assert_eq!(router.hover_target(), Some("a"));
        router.route(&table, &SurfaceEvent::PointerMoved { x: 95.0, y: 95.0 }, now);
        assert_eq!(router.hover_target(), None);
    }

    #[test]
    fn hover_target_skips_plain_hover_handlers_inside_links() {
        let mut table = ListenerTable::new();
        for (id, action) in [("l", DefaultAction::HoverLink), ("text-0", DefaultAction::Log)] {
            let attributes = extract("x={0} y={0} width={30} height={30}");
            let appearance = Appearance::resolve(&attributes, &Appearance::surface(100.0, 100.0, 13.0), 100.0, 13.0);
            let mut entry = ListenerEntry::new(EventTarget {
                id: id.into(),
                tag: "Link".into(),
                attributes,
                appearance,
            });
            entry.set_slot(
                EventClass::Hover,
                Slot {
                    handler: Some("h".into()),
                    action,
                },
            );
            table.register(entry);
        }
        let mut router = EventRouter::new(Duration::ZERO);
        let invocations = accepted(router.route(&table, &SurfaceEvent::PointerMoved { x: 5.0, y: 5.0 }, Instant::now()));
        // both hover handlers still run
        assert_eq!(invocations.len(), 2);
        assert_eq!(router.hover_target(), Some("l"));
    }

    #[test]
    fn misses_still_consume_the_window() {
        let table = table();
        let mut router = EventRouter::new(Duration::from_millis(30));
        let t0 = Instant::now();
        assert!(accepted(router.route(&table, &down(99.0, 99.0), t0)).is_empty());
        assert_eq!(
            router.route(&table, &down(10.0, 10.0), t0 + Duration::from_millis(5)),
            RouteOutcome::Debounced
        );
    }
}

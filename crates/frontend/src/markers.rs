//! Keeps one interactive marker per location.
//!
//! Every pass tears down and rebuilds the marker of every location, so the
//! draggability, cursor and the closures wired to each marker always match the
//! current location record and edit mode.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use atlas_shared::models::{LngLat, Location, LocationType};

use crate::engine::{
    Anchor, Cursor, Glyph, ListenerId, MapEngine, MarkerElement, MarkerEvent, MarkerEventKind,
    MarkerHandle, MarkerOptions, ScreenPoint,
};

/// Glyph box size in pixels.
pub const MARKER_SIZE: f64 = 32.0;

const SETTLEMENT_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 32 32" width="32" height="32"><rect x="3" y="16" width="26" height="12" fill="#8b3a2a" stroke="white" stroke-width="0.5" rx="1"/><path d="M13 28 L13 22 Q16 18 19 22 L19 28 Z" fill="#1a0f00"/><rect x="2" y="10" width="8" height="18" fill="#8b3a2a" stroke="white" stroke-width="0.5" rx="1"/><rect x="22" y="10" width="8" height="18" fill="#8b3a2a" stroke="white" stroke-width="0.5" rx="1"/><rect x="11" y="7" width="10" height="12" fill="#8b3a2a" stroke="white" stroke-width="0.5" rx="1"/><rect x="2" y="7" width="2" height="4" fill="#8b3a2a" stroke="white" stroke-width="0.5"/><rect x="5" y="7" width="2" height="4" fill="#8b3a2a" stroke="white" stroke-width="0.5"/><rect x="8" y="7" width="2" height="4" fill="#8b3a2a" stroke="white" stroke-width="0.5"/><rect x="22" y="7" width="2" height="4" fill="#8b3a2a" stroke="white" stroke-width="0.5"/><rect x="25" y="7" width="2" height="4" fill="#8b3a2a" stroke="white" stroke-width="0.5"/><rect x="28" y="7" width="2" height="4" fill="#8b3a2a" stroke="white" stroke-width="0.5"/><rect x="11" y="4" width="2" height="4" fill="#8b3a2a" stroke="white" stroke-width="0.5"/><rect x="14" y="4" width="2" height="4" fill="#8b3a2a" stroke="white" stroke-width="0.5"/><rect x="17" y="4" width="2" height="4" fill="#8b3a2a" stroke="white" stroke-width="0.5"/><rect x="5" y="13" width="2" height="3" fill="#1a0f00" rx="0.5"/><rect x="25" y="13" width="2" height="3" fill="#1a0f00" rx="0.5"/><rect x="15" y="9" width="2" height="3" fill="#1a0f00" rx="0.5"/></svg>"##;

const OTHER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 32 32" width="32" height="32"><circle cx="16" cy="13" r="9" fill="#4a6fa5" stroke="white" stroke-width="0.8"/><circle cx="16" cy="13" r="3.5" fill="white"/><path d="M16 22 L13 28 L16 26 L19 28 Z" fill="#4a6fa5" stroke="white" stroke-width="0.5"/></svg>"##;

const PENDING_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 32 32" width="32" height="32"><path d="M16 31 C16 31 5 19 5 12 A11 11 0 0 1 27 12 C27 19 16 31 16 31 Z" fill="#e67e22" stroke="white" stroke-width="1"/><circle cx="16" cy="12" r="4" fill="white"/></svg>"##;

pub fn glyph_svg(glyph: Glyph) -> &'static str {
    match glyph {
        Glyph::Settlement => SETTLEMENT_SVG,
        Glyph::Other => OTHER_SVG,
        Glyph::Pending => PENDING_SVG,
    }
}

pub fn marker_element(kind: LocationType, edit_mode: bool) -> MarkerElement {
    MarkerElement {
        glyph: kind.into(),
        cursor: if edit_mode {
            Cursor::Grab
        } else {
            Cursor::Pointer
        },
    }
}

/// What a marker asks the composing layer to do.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerIntent {
    /// Show the location; `pixel` is the top-centre of the glyph.
    View {
        location: Location,
        pixel: ScreenPoint,
    },
    Edit(Location),
    /// The marker was dropped at `coordinates`. The marker itself is not
    /// committed there; the next pass draws it wherever the record says.
    Move { id: String, coordinates: LngLat },
}

pub type IntentSink = Rc<dyn Fn(MarkerIntent)>;

/// Per-marker drag/click disambiguation.
///
/// A drag-end arms the gate with its gesture serial; the click the engine
/// emits for that same gesture is swallowed. Anything else disarms it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DragGate {
    #[default]
    Idle,
    Dragging,
    JustDragged(u64),
}

impl DragGate {
    /// Next state, and whether the click should be handled.
    fn click(self, gesture: u64) -> (DragGate, bool) {
        match self {
            DragGate::JustDragged(g) if g == gesture => (DragGate::Idle, false),
            _ => (DragGate::Idle, true),
        }
    }
}

struct MarkerRecord<M: MarkerHandle> {
    marker: M,
    listeners: Vec<ListenerId>,
}

impl<M: MarkerHandle> MarkerRecord<M> {
    fn teardown(self) {
        for id in self.listeners {
            self.marker.off(id);
        }
        self.marker.remove();
    }
}

pub struct MarkerReconciler<E: MapEngine> {
    records: HashMap<String, MarkerRecord<E::Marker>>,
    sink: IntentSink,
}

impl<E: MapEngine> MarkerReconciler<E> {
    pub fn new(sink: IntentSink) -> Self {
        MarkerReconciler {
            records: HashMap::new(),
            sink,
        }
    }

    /// Bring the live markers on `engine` in line with `locations`.
    pub fn reconcile(&mut self, engine: &E, locations: &[Location], edit_mode: bool) {
        let current: HashSet<&str> = locations.iter().map(|l| l.id.as_str()).collect();

        let stale: Vec<String> = self
            .records
            .keys()
            .filter(|id| !current.contains(id.as_str()))
            .cloned()
            .collect();
        for id in &stale {
            if let Some(record) = self.records.remove(id) {
                record.teardown();
            }
        }

        for location in locations {
            if let Some(record) = self.records.remove(&location.id) {
                record.teardown();
            }
            let record = self.build(engine, location, edit_mode);
            self.records.insert(location.id.clone(), record);
        }

        tracing::debug!(
            markers = self.records.len(),
            removed = stale.len(),
            edit_mode,
            "reconciled markers"
        );
    }

    fn build(&self, engine: &E, location: &Location, edit_mode: bool) -> MarkerRecord<E::Marker> {
        let marker = engine.create_marker(MarkerOptions {
            element: marker_element(location.kind, edit_mode),
            draggable: edit_mode,
            anchor: Anchor::Bottom,
            position: location.coordinates,
        });
        let gate = Rc::new(Cell::new(DragGate::Idle));
        let mut listeners = Vec::with_capacity(3);

        let on_drag_start = {
            let gate = gate.clone();
            move |_: &MarkerEvent| gate.set(DragGate::Dragging)
        };
        listeners.push(marker.on(MarkerEventKind::DragStart, Rc::new(on_drag_start)));

        let on_drag_end = {
            let gate = gate.clone();
            let sink = self.sink.clone();
            let id = location.id.clone();
            move |event: &MarkerEvent| {
                gate.set(DragGate::JustDragged(event.gesture));
                sink(MarkerIntent::Move {
                    id: id.clone(),
                    coordinates: event.lng_lat,
                });
            }
        };
        listeners.push(marker.on(MarkerEventKind::DragEnd, Rc::new(on_drag_end)));

        let on_click = {
            let sink = self.sink.clone();
            let location = location.clone();
            move |event: &MarkerEvent| {
                event.stop_propagation();
                let (next, handle) = gate.get().click(event.gesture);
                gate.set(next);
                if !handle {
                    return;
                }
                if edit_mode {
                    sink(MarkerIntent::Edit(location.clone()));
                } else {
                    sink(MarkerIntent::View {
                        location: location.clone(),
                        pixel: ScreenPoint::new(event.point.x, event.point.y - MARKER_SIZE),
                    });
                }
            }
        };
        listeners.push(marker.on(MarkerEventKind::Click, Rc::new(on_click)));

        MarkerRecord { marker, listeners }
    }

    /// Tear down every tracked marker.
    pub fn clear(&mut self) {
        for (_, record) in self.records.drain() {
            record.teardown();
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn marker(&self, id: &str) -> Option<&E::Marker> {
        self.records.get(id).map(|r| &r.marker)
    }
}

impl<E: MapEngine> Drop for MarkerReconciler<E> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::engine::{MapEvent, MapEventKind, MapOptions, MapStyle};
    use crate::scene::SceneMap;

    fn scene() -> SceneMap {
        let map = SceneMap::new(MapOptions {
            container: "test-map".to_string(),
            style: MapStyle::default(),
            center: LngLat::new(-75.97, 42.187),
            zoom: 9.0,
        });
        map.set_viewport(800.0, 600.0);
        map
    }

    fn loc(id: &str, kind: LocationType, lng: f64) -> Location {
        Location {
            id: id.to_string(),
            coordinates: LngLat::new(lng, 42.2),
            label: format!("Label {}", id),
            link: String::new(),
            kind,
        }
    }

    fn two_locations() -> Vec<Location> {
        vec![
            loc("A", LocationType::Settlement, -76.1),
            loc("B", LocationType::Other, -75.8),
        ]
    }

    fn reconciler() -> (MarkerReconciler<SceneMap>, Rc<RefCell<Vec<MarkerIntent>>>) {
        let intents = Rc::new(RefCell::new(Vec::new()));
        let sink = intents.clone();
        let reconciler = MarkerReconciler::new(Rc::new(move |intent| sink.borrow_mut().push(intent)));
        (reconciler, intents)
    }

    fn marker_id(reconciler: &MarkerReconciler<SceneMap>, id: &str) -> u64 {
        reconciler.marker(id).expect("tracked marker").id()
    }

    #[test]
    fn test_one_marker_per_location() {
        let map = scene();
        let (mut reconciler, _) = reconciler();
        reconciler.reconcile(&map, &two_locations(), false);
        assert_eq!(reconciler.len(), 2);
        assert_eq!(map.marker_count(), 2);
        assert_eq!(map.listener_count(), 6);
    }

    #[test]
    fn test_repeated_pass_does_not_leak() {
        let map = scene();
        let (mut reconciler, _) = reconciler();
        let locations = two_locations();
        reconciler.reconcile(&map, &locations, false);
        reconciler.reconcile(&map, &locations, false);
        assert_eq!(reconciler.len(), 2);
        assert_eq!(map.marker_count(), 2);
        assert_eq!(map.listener_count(), 6);
    }

    #[test]
    fn test_removed_location_is_torn_down() {
        let map = scene();
        let (mut reconciler, _) = reconciler();
        reconciler.reconcile(&map, &two_locations(), false);
        reconciler.reconcile(&map, &[loc("B", LocationType::Other, -75.8)], false);
        assert!(!reconciler.contains("A"));
        assert!(reconciler.contains("B"));
        assert_eq!(map.marker_count(), 1);
        assert_eq!(map.listener_count(), 3);
    }

    #[test]
    fn test_edit_mode_toggle_rebuilds_draggability_and_cursor() {
        let map = scene();
        let (mut reconciler, _) = reconciler();
        let locations = two_locations();

        reconciler.reconcile(&map, &locations, false);
        let view = map.marker_view(marker_id(&reconciler, "A")).unwrap();
        assert!(!view.draggable);
        assert_eq!(view.cursor, Cursor::Pointer);

        reconciler.reconcile(&map, &locations, true);
        assert!(reconciler.contains("A") && reconciler.contains("B"));
        assert_eq!(reconciler.len(), 2);
        let view = map.marker_view(marker_id(&reconciler, "A")).unwrap();
        assert!(view.draggable);
        assert_eq!(view.cursor, Cursor::Grab);
        assert_eq!(view.anchor, Anchor::Bottom);
    }

    #[test]
    fn test_glyph_follows_type() {
        let map = scene();
        let (mut reconciler, _) = reconciler();
        reconciler.reconcile(&map, &two_locations(), false);
        let a = map.marker_view(marker_id(&reconciler, "A")).unwrap();
        let b = map.marker_view(marker_id(&reconciler, "B")).unwrap();
        assert_eq!(a.glyph, Glyph::Settlement);
        assert_eq!(b.glyph, Glyph::Other);
        assert_ne!(glyph_svg(a.glyph), glyph_svg(b.glyph));
    }

    #[test]
    fn test_click_in_view_mode_emits_view_with_glyph_top() {
        let map = scene();
        let (mut reconciler, intents) = reconciler();
        let locations = two_locations();
        reconciler.reconcile(&map, &locations, false);
        let id = marker_id(&reconciler, "B");
        let anchor = map.marker_view(id).unwrap().point;

        map.tap_marker(id);

        match intents.borrow().as_slice() {
            [MarkerIntent::View { location, pixel }] => {
                assert_eq!(location, &locations[1]);
                assert!((pixel.x - anchor.x).abs() < 1e-9);
                assert!((pixel.y - (anchor.y - MARKER_SIZE)).abs() < 1e-9);
            }
            other => panic!("unexpected intents: {:?}", other),
        };
    }

    #[test]
    fn test_click_in_edit_mode_emits_edit() {
        let map = scene();
        let (mut reconciler, intents) = reconciler();
        let locations = two_locations();
        reconciler.reconcile(&map, &locations, true);
        map.tap_marker(marker_id(&reconciler, "A"));
        assert_eq!(*intents.borrow(), vec![MarkerIntent::Edit(locations[0].clone())]);
    }

    #[test]
    fn test_drag_end_then_click_emits_only_move() {
        let map = scene();
        let (mut reconciler, intents) = reconciler();
        reconciler.reconcile(&map, &two_locations(), true);
        let id = marker_id(&reconciler, "A");

        map.drag_marker(id, 30.0, 0.0);
        map.click_marker(id);

        let intents = intents.borrow();
        assert_eq!(intents.len(), 1);
        match &intents[0] {
            MarkerIntent::Move { id, coordinates } => {
                assert_eq!(id, "A");
                assert!(coordinates.lng > -76.1);
            }
            other => panic!("expected move, got {:?}", other),
        }
    }

    #[test]
    fn test_click_after_swallowed_one_is_handled() {
        let map = scene();
        let (mut reconciler, intents) = reconciler();
        let locations = two_locations();
        reconciler.reconcile(&map, &locations, true);
        let id = marker_id(&reconciler, "A");

        map.drag_marker(id, 30.0, 0.0);
        map.tap_marker(id);

        let intents = intents.borrow();
        assert_eq!(intents.len(), 2);
        assert!(matches!(intents[0], MarkerIntent::Move { .. }));
        assert!(matches!(intents[1], MarkerIntent::Edit(_)));
    }

    #[test]
    fn test_drag_does_not_commit_position() {
        let map = scene();
        let (mut reconciler, _) = reconciler();
        let locations = two_locations();
        reconciler.reconcile(&map, &locations, true);
        map.drag_marker(marker_id(&reconciler, "A"), 50.0, 50.0);

        // the owning list was not updated, so the next pass redraws at the record
        reconciler.reconcile(&map, &locations, true);
        let marker = reconciler.marker("A").unwrap();
        assert_eq!(marker.position(), locations[0].coordinates);
    }

    #[test]
    fn test_drag_interrupted_by_leaving_map_still_moves() {
        let map = scene();
        let (mut reconciler, intents) = reconciler();
        reconciler.reconcile(&map, &two_locations(), true);
        let id = marker_id(&reconciler, "A");
        let start = map.marker_view(id).unwrap().point;

        map.press_marker(id, start);
        map.pointer_move(ScreenPoint::new(start.x + 60.0, start.y));
        map.pointer_cancel();

        let dragged = reconciler.marker("A").unwrap().position();
        match intents.borrow().as_slice() {
            [MarkerIntent::Move { id, coordinates }] => {
                assert_eq!(id, "A");
                assert_eq!(*coordinates, dragged);
            }
            other => panic!("expected move, got {:?}", other),
        };

        // the gate is back to idle, so the next tap is a normal click
        map.tap_marker(id);
        assert!(matches!(intents.borrow().last(), Some(MarkerIntent::Edit(_))));
    }

    #[test]
    fn test_marker_click_does_not_reach_map() {
        let map = scene();
        let (mut reconciler, _) = reconciler();
        reconciler.reconcile(&map, &two_locations(), true);
        let map_clicks = Rc::new(Cell::new(0));
        let counter = map_clicks.clone();
        map.on(
            MapEventKind::Click,
            Rc::new(move |_: &MapEvent| counter.set(counter.get() + 1)),
        );
        map.tap_marker(marker_id(&reconciler, "B"));
        assert_eq!(map_clicks.get(), 0);
    }

    #[test]
    fn test_clear_and_drop_release_everything() {
        let map = scene();
        let (mut reconciler, _) = reconciler();
        reconciler.reconcile(&map, &two_locations(), false);
        reconciler.clear();
        assert!(reconciler.is_empty());
        assert_eq!(map.marker_count(), 0);

        reconciler.reconcile(&map, &two_locations(), false);
        drop(reconciler);
        assert_eq!(map.marker_count(), 0);
        assert_eq!(map.listener_count(), 0);
    }

    #[test]
    fn test_switching_engine_rebuilds_on_new_map() {
        let old_map = scene();
        let new_map = scene();
        let (mut reconciler, _) = reconciler();
        reconciler.reconcile(&old_map, &two_locations(), false);
        old_map.remove();
        reconciler.reconcile(&new_map, &two_locations(), false);
        assert_eq!(new_map.marker_count(), 2);
        assert_eq!(reconciler.len(), 2);
    }

    #[test]
    fn test_drag_gate_transitions() {
        assert_eq!(DragGate::JustDragged(4).click(4), (DragGate::Idle, false));
        assert_eq!(DragGate::JustDragged(4).click(5), (DragGate::Idle, true));
        assert_eq!(DragGate::Dragging.click(1), (DragGate::Idle, true));
        assert_eq!(DragGate::Idle.click(1), (DragGate::Idle, true));
    }
}

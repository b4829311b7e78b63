//! In-process map engine.
//!
//! `SceneMap` keeps the camera, image layers, markers and listener tables of one
//! map. The `MapCanvas` component renders its `snapshot()` and feeds pointer
//! input back through the dispatch methods; tests drive the same methods to emit
//! synthetic events.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use atlas_shared::geo;
use atlas_shared::models::LngLat;

use crate::engine::{
    Anchor, Control, Corner, Cursor, EngineError, EngineFactory, Glyph, ImageLayer, ListenerId,
    MapCallback, MapEngine, MapEvent, MapEventKind, MapOptions, MapStyle, MarkerCallback,
    MarkerElement, MarkerEvent, MarkerEventKind, MarkerHandle, MarkerOptions, ScreenPoint,
};

/// Pointer movement below this many pixels still counts as a click.
pub const DRAG_THRESHOLD: f64 = 3.0;

/// Zoom change per wheel notch.
pub const WHEEL_ZOOM_STEP: f64 = 0.25;

/// Zoom change per navigation button press.
pub const NAV_ZOOM_STEP: f64 = 1.0;

/// Viewport assumed until the container reports its size.
const DEFAULT_VIEWPORT: (f64, f64) = (960.0, 640.0);

struct MarkerState {
    id: u64,
    element: MarkerElement,
    draggable: bool,
    anchor: Anchor,
    position: LngLat,
    listeners: Vec<(ListenerId, MarkerEventKind, MarkerCallback)>,
}

enum Gesture {
    Idle,
    Pan {
        start: ScreenPoint,
        start_center: (f64, f64),
        moved: bool,
    },
    Marker {
        marker: u64,
        start: ScreenPoint,
        offset: (f64, f64),
        draggable: bool,
        moved: bool,
    },
}

struct SceneState {
    removed: bool,
    container: String,
    style: MapStyle,
    center: LngLat,
    zoom: f64,
    viewport: (f64, f64),
    cursor: Cursor,
    layers: Vec<ImageLayer>,
    controls: Vec<(Control, Corner)>,
    markers: Vec<MarkerState>,
    listeners: Vec<(ListenerId, MapEventKind, MapCallback)>,
    next_id: u64,
    gesture: Gesture,
    gesture_serial: u64,
    loaded: bool,
    redraw: Option<Rc<dyn Fn()>>,
}

impl SceneState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn center_px(&self) -> (f64, f64) {
        geo::project(self.center, self.zoom)
    }

    fn project(&self, at: LngLat) -> ScreenPoint {
        let (x, y) = geo::project(at, self.zoom);
        let (cx, cy) = self.center_px();
        ScreenPoint::new(
            x - cx + self.viewport.0 / 2.0,
            y - cy + self.viewport.1 / 2.0,
        )
    }

    fn unproject(&self, point: ScreenPoint) -> LngLat {
        let (cx, cy) = self.center_px();
        geo::unproject(
            point.x - self.viewport.0 / 2.0 + cx,
            point.y - self.viewport.1 / 2.0 + cy,
            self.zoom,
        )
    }

    fn marker(&self, id: u64) -> Option<&MarkerState> {
        self.markers.iter().find(|m| m.id == id)
    }

    fn marker_mut(&mut self, id: u64) -> Option<&mut MarkerState> {
        self.markers.iter_mut().find(|m| m.id == id)
    }

    fn map_callbacks(&self, kind: MapEventKind) -> Vec<MapCallback> {
        if self.removed {
            return Vec::new();
        }
        self.listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, cb)| cb.clone())
            .collect()
    }

    fn marker_callbacks(&self, marker: u64, kind: MarkerEventKind) -> Vec<MarkerCallback> {
        self.marker(marker)
            .map(|m| {
                m.listeners
                    .iter()
                    .filter(|(_, k, _)| *k == kind)
                    .map(|(_, _, cb)| cb.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Move the camera so `at` lands on `point` at the current zoom.
    fn place(&mut self, at: LngLat, point: ScreenPoint) {
        let (x, y) = geo::project(at, self.zoom);
        self.center = geo::unproject(
            x - (point.x - self.viewport.0 / 2.0),
            y - (point.y - self.viewport.1 / 2.0),
            self.zoom,
        );
    }
}

/// Positioned image layer, in container pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerView {
    pub layer_id: String,
    pub url: String,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub opacity: f64,
}

/// Positioned marker, in container pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerView {
    pub id: u64,
    pub point: ScreenPoint,
    pub glyph: Glyph,
    pub cursor: Cursor,
    pub anchor: Anchor,
    pub draggable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneSnapshot {
    pub background: String,
    pub cursor: Cursor,
    pub layers: Vec<LayerView>,
    pub markers: Vec<MarkerView>,
    pub controls: Vec<(Control, Corner)>,
}

/// Handle to one in-process map.
#[derive(Clone)]
pub struct SceneMap {
    state: Rc<RefCell<SceneState>>,
}

impl PartialEq for SceneMap {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl std::fmt::Debug for SceneMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.state.borrow();
        f.debug_struct("SceneMap")
            .field("container", &s.container)
            .field("center", &s.center)
            .field("zoom", &s.zoom)
            .field("markers", &s.markers.len())
            .field("removed", &s.removed)
            .finish()
    }
}

impl SceneMap {
    pub fn new(options: MapOptions) -> Self {
        SceneMap {
            state: Rc::new(RefCell::new(SceneState {
                removed: false,
                container: options.container,
                style: options.style,
                center: options.center,
                zoom: options.zoom.clamp(geo::MIN_ZOOM, geo::MAX_ZOOM),
                viewport: DEFAULT_VIEWPORT,
                cursor: Cursor::Default,
                layers: Vec::new(),
                controls: Vec::new(),
                markers: Vec::new(),
                listeners: Vec::new(),
                next_id: 0,
                gesture: Gesture::Idle,
                gesture_serial: 0,
                loaded: false,
                redraw: None,
            })),
        }
    }

    /// Called after every visual change.
    pub fn set_redraw(&self, hook: Rc<dyn Fn()>) {
        self.state.borrow_mut().redraw = Some(hook);
    }

    fn request_redraw(&self) {
        let hook = self.state.borrow().redraw.clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn emit(&self, event: MapEvent) {
        let callbacks = self.state.borrow().map_callbacks(event.kind());
        for cb in callbacks {
            cb(&event);
        }
    }

    fn emit_marker(&self, marker: u64, event: &MarkerEvent) {
        let callbacks = self.state.borrow().marker_callbacks(marker, event.kind);
        for cb in callbacks {
            cb(event);
        }
    }

    pub fn container(&self) -> String {
        self.state.borrow().container.clone()
    }

    pub fn center(&self) -> LngLat {
        self.state.borrow().center
    }

    pub fn zoom(&self) -> f64 {
        self.state.borrow().zoom
    }

    pub fn viewport(&self) -> (f64, f64) {
        self.state.borrow().viewport
    }

    pub fn cursor(&self) -> Cursor {
        self.state.borrow().cursor
    }

    pub fn is_removed(&self) -> bool {
        self.state.borrow().removed
    }

    pub fn is_loaded(&self) -> bool {
        self.state.borrow().loaded
    }

    pub fn marker_count(&self) -> usize {
        self.state.borrow().markers.len()
    }

    /// Listeners registered on the map itself plus on all markers.
    pub fn listener_count(&self) -> usize {
        let s = self.state.borrow();
        s.listeners.len() + s.markers.iter().map(|m| m.listeners.len()).sum::<usize>()
    }

    pub fn marker_view(&self, id: u64) -> Option<MarkerView> {
        let s = self.state.borrow();
        s.marker(id).map(|m| MarkerView {
            id: m.id,
            point: s.project(m.position),
            glyph: m.element.glyph,
            cursor: m.element.cursor,
            anchor: m.anchor,
            draggable: m.draggable,
        })
    }

    pub fn set_viewport(&self, width: f64, height: f64) {
        {
            let mut s = self.state.borrow_mut();
            if s.viewport == (width, height) || width <= 0.0 || height <= 0.0 {
                return;
            }
            s.viewport = (width, height);
        }
        self.request_redraw();
    }

    /// Report that the current frame is on screen: `load` the first time,
    /// `idle` every time.
    pub fn finish_render(&self) {
        let first = {
            let mut s = self.state.borrow_mut();
            if s.removed {
                return;
            }
            !std::mem::replace(&mut s.loaded, true)
        };
        if first {
            self.emit(MapEvent::Load);
        }
        self.emit(MapEvent::Idle);
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        let s = self.state.borrow();
        let layers = s
            .layers
            .iter()
            .map(|layer| {
                let top_left = s.project(layer.corners[0]);
                let bottom_right = s.project(layer.corners[2]);
                LayerView {
                    layer_id: layer.layer_id.clone(),
                    url: layer.url.clone(),
                    left: top_left.x,
                    top: top_left.y,
                    width: bottom_right.x - top_left.x,
                    height: bottom_right.y - top_left.y,
                    opacity: layer.opacity,
                }
            })
            .collect();
        let markers = s
            .markers
            .iter()
            .map(|m| MarkerView {
                id: m.id,
                point: s.project(m.position),
                glyph: m.element.glyph,
                cursor: m.element.cursor,
                anchor: m.anchor,
                draggable: m.draggable,
            })
            .collect();
        SceneSnapshot {
            background: s.style.background.clone(),
            cursor: s.cursor,
            layers,
            markers,
            controls: s.controls.clone(),
        }
    }

    /// Scale bar width and caption for the current camera.
    pub fn scale_bar(&self, max_width_px: f64) -> (f64, String) {
        let s = self.state.borrow();
        geo::scale_bar(s.center.lat, s.zoom, max_width_px)
    }

    // --- pointer dispatch ---

    /// Press on the map background.
    pub fn pointer_down(&self, point: ScreenPoint) {
        let mut s = self.state.borrow_mut();
        if s.removed {
            return;
        }
        s.gesture_serial += 1;
        let start_center = s.center_px();
        s.gesture = Gesture::Pan {
            start: point,
            start_center,
            moved: false,
        };
    }

    /// Press on a marker element.
    pub fn press_marker(&self, marker: u64, point: ScreenPoint) {
        let mut guard = self.state.borrow_mut();
        let s = &mut *guard;
        if s.removed {
            return;
        }
        s.gesture_serial += 1;
        let found = s
            .marker(marker)
            .map(|m| (s.project(m.position), m.draggable));
        s.gesture = match found {
            Some((anchor, draggable)) => Gesture::Marker {
                marker,
                start: point,
                offset: (anchor.x - point.x, anchor.y - point.y),
                draggable,
                moved: false,
            },
            None => Gesture::Idle,
        };
    }

    pub fn pointer_move(&self, point: ScreenPoint) {
        enum Emit {
            Nothing,
            MoveStart,
            DragStart(u64, u64),
        }

        let emit = {
            let mut guard = self.state.borrow_mut();
            let s = &mut *guard;
            let serial = s.gesture_serial;
            let zoom = s.zoom;
            match s.gesture {
                Gesture::Idle => return,
                Gesture::Pan {
                    start,
                    start_center,
                    ref mut moved,
                } => {
                    let mut emit = Emit::Nothing;
                    if !*moved && start.distance(point) > DRAG_THRESHOLD {
                        *moved = true;
                        emit = Emit::MoveStart;
                    }
                    if !*moved {
                        return;
                    }
                    s.center = geo::unproject(
                        start_center.0 - (point.x - start.x),
                        start_center.1 - (point.y - start.y),
                        zoom,
                    );
                    emit
                }
                Gesture::Marker {
                    marker,
                    start,
                    offset,
                    draggable,
                    ref mut moved,
                } => {
                    if !draggable {
                        return;
                    }
                    let mut emit = Emit::Nothing;
                    if !*moved && start.distance(point) > DRAG_THRESHOLD {
                        *moved = true;
                        emit = Emit::DragStart(marker, serial);
                    }
                    if !*moved {
                        return;
                    }
                    let at = s.unproject(ScreenPoint::new(point.x + offset.0, point.y + offset.1));
                    if let Some(m) = s.marker_mut(marker) {
                        m.position = at;
                    }
                    emit
                }
            }
        };

        match emit {
            Emit::Nothing => {}
            Emit::MoveStart => self.emit(MapEvent::MoveStart),
            Emit::DragStart(marker, serial) => {
                let event = self.marker_event(marker, MarkerEventKind::DragStart, serial);
                if let Some(event) = event {
                    self.emit_marker(marker, &event);
                }
            }
        }
        self.request_redraw();
    }

    pub fn pointer_up(&self, point: ScreenPoint) {
        let (gesture, serial) = {
            let mut s = self.state.borrow_mut();
            (
                std::mem::replace(&mut s.gesture, Gesture::Idle),
                s.gesture_serial,
            )
        };
        match gesture {
            Gesture::Idle => {}
            Gesture::Pan { moved: false, .. } => {
                let lng_lat = self.unproject(point);
                self.emit(MapEvent::Click { point, lng_lat });
            }
            Gesture::Pan { moved: true, .. } => self.request_redraw(),
            Gesture::Marker {
                marker,
                moved: true,
                ..
            } => {
                if let Some(event) = self.marker_event(marker, MarkerEventKind::DragEnd, serial) {
                    self.emit_marker(marker, &event);
                }
            }
            Gesture::Marker { moved: false, .. } => {}
        }
    }

    /// Pointer left the container or the gesture was interrupted.
    ///
    /// A marker drag already under way ends where it is, with `dragend`, so the
    /// dragged position is never left unreported.
    pub fn pointer_cancel(&self) {
        let (gesture, serial) = {
            let mut s = self.state.borrow_mut();
            (
                std::mem::replace(&mut s.gesture, Gesture::Idle),
                s.gesture_serial,
            )
        };
        match gesture {
            Gesture::Marker {
                marker,
                moved: true,
                ..
            } => {
                if let Some(event) = self.marker_event(marker, MarkerEventKind::DragEnd, serial) {
                    self.emit_marker(marker, &event);
                }
            }
            Gesture::Pan { moved: true, .. } => self.request_redraw(),
            _ => {}
        }
    }

    /// Click on a marker element. Reaches the map's `click` listeners unless a
    /// marker listener stopped propagation.
    pub fn click_marker(&self, marker: u64) {
        let serial = self.state.borrow().gesture_serial;
        let Some(event) = self.marker_event(marker, MarkerEventKind::Click, serial) else {
            return;
        };
        self.emit_marker(marker, &event);
        if !event.propagation_stopped() {
            self.emit(MapEvent::Click {
                point: event.point,
                lng_lat: event.lng_lat,
            });
        }
    }

    fn marker_event(&self, marker: u64, kind: MarkerEventKind, serial: u64) -> Option<MarkerEvent> {
        let s = self.state.borrow();
        let m = s.marker(marker)?;
        Some(MarkerEvent::new(kind, serial, m.position, s.project(m.position)))
    }

    /// Zoom by one wheel notch, keeping the point under the cursor fixed.
    pub fn wheel(&self, point: ScreenPoint, delta_y: f64) {
        if delta_y == 0.0 {
            return;
        }
        let step = if delta_y < 0.0 {
            WHEEL_ZOOM_STEP
        } else {
            -WHEEL_ZOOM_STEP
        };
        if !self.zoom_around(point, step) {
            return;
        }
        self.emit(MapEvent::MoveStart);
        self.request_redraw();
    }

    /// Zoom around the viewport centre; used by the navigation control.
    pub fn zoom_by(&self, delta: f64) {
        let (w, h) = self.viewport();
        if !self.zoom_around(ScreenPoint::new(w / 2.0, h / 2.0), delta) {
            return;
        }
        self.emit(MapEvent::MoveStart);
        self.request_redraw();
    }

    fn zoom_around(&self, point: ScreenPoint, delta: f64) -> bool {
        let mut s = self.state.borrow_mut();
        if s.removed {
            return false;
        }
        let new_zoom = (s.zoom + delta).clamp(geo::MIN_ZOOM, geo::MAX_ZOOM);
        if (new_zoom - s.zoom).abs() < 1e-9 {
            return false;
        }
        let anchor = s.unproject(point);
        s.zoom = new_zoom;
        s.place(anchor, point);
        true
    }

    // --- synthetic gestures ---

    /// Press and release on the background without moving.
    pub fn tap(&self, point: ScreenPoint) {
        self.pointer_down(point);
        self.pointer_up(point);
    }

    /// Press, release and click on a marker without moving.
    pub fn tap_marker(&self, marker: u64) {
        let Some(view) = self.marker_view(marker) else {
            return;
        };
        self.press_marker(marker, view.point);
        self.pointer_up(view.point);
        self.click_marker(marker);
    }

    /// Drag a marker by `(dx, dy)` pixels and release. No click follows.
    pub fn drag_marker(&self, marker: u64, dx: f64, dy: f64) {
        let Some(view) = self.marker_view(marker) else {
            return;
        };
        let to = ScreenPoint::new(view.point.x + dx, view.point.y + dy);
        self.press_marker(marker, view.point);
        self.pointer_move(to);
        self.pointer_up(to);
    }
}

impl MapEngine for SceneMap {
    type Marker = SceneMarker;

    fn add_image_layer(&self, layer: ImageLayer) -> Result<(), EngineError> {
        {
            let mut s = self.state.borrow_mut();
            if s.removed {
                return Err(EngineError::Removed);
            }
            if s.layers.iter().any(|l| l.layer_id == layer.layer_id) {
                return Err(EngineError::DuplicateLayer(layer.layer_id));
            }
            s.layers.push(layer);
        }
        self.request_redraw();
        Ok(())
    }

    fn has_layer(&self, layer_id: &str) -> bool {
        self.state
            .borrow()
            .layers
            .iter()
            .any(|l| l.layer_id == layer_id)
    }

    fn add_control(&self, control: Control, corner: Corner) {
        let mut s = self.state.borrow_mut();
        if !s.removed {
            s.controls.push((control, corner));
        }
    }

    fn on(&self, kind: MapEventKind, callback: MapCallback) -> ListenerId {
        let mut s = self.state.borrow_mut();
        let id = ListenerId(s.next_id());
        if !s.removed {
            s.listeners.push((id, kind, callback));
        }
        id
    }

    fn off(&self, id: ListenerId) {
        self.state.borrow_mut().listeners.retain(|(l, _, _)| *l != id);
    }

    fn create_marker(&self, options: MarkerOptions) -> SceneMarker {
        let id = {
            let mut s = self.state.borrow_mut();
            let id = s.next_id();
            if !s.removed {
                s.markers.push(MarkerState {
                    id,
                    element: options.element,
                    draggable: options.draggable,
                    anchor: options.anchor,
                    position: options.position,
                    listeners: Vec::new(),
                });
            }
            id
        };
        self.request_redraw();
        SceneMarker {
            id,
            scene: Rc::downgrade(&self.state),
        }
    }

    fn project(&self, at: LngLat) -> ScreenPoint {
        self.state.borrow().project(at)
    }

    fn unproject(&self, point: ScreenPoint) -> LngLat {
        self.state.borrow().unproject(point)
    }

    fn set_cursor(&self, cursor: Cursor) {
        {
            let mut s = self.state.borrow_mut();
            if s.cursor == cursor {
                return;
            }
            s.cursor = cursor;
        }
        self.request_redraw();
    }

    fn remove(&self) {
        {
            let mut s = self.state.borrow_mut();
            if s.removed {
                return;
            }
            s.removed = true;
            s.layers.clear();
            s.controls.clear();
            s.markers.clear();
            s.listeners.clear();
            s.gesture = Gesture::Idle;
        }
        self.request_redraw();
    }
}

/// Marker living in a `SceneMap`. Calls after removal (of the marker or of
/// the whole map) do nothing.
pub struct SceneMarker {
    id: u64,
    scene: Weak<RefCell<SceneState>>,
}

impl SceneMarker {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn scene(&self) -> Option<SceneMap> {
        self.scene.upgrade().map(|state| SceneMap { state })
    }
}

impl MarkerHandle for SceneMarker {
    fn position(&self) -> LngLat {
        let Some(map) = self.scene() else {
            return LngLat::new(0.0, 0.0);
        };
        let s = map.state.borrow();
        s.marker(self.id)
            .map(|m| m.position)
            .unwrap_or(LngLat::new(0.0, 0.0))
    }

    fn set_position(&self, at: LngLat) {
        let Some(map) = self.scene() else { return };
        let changed = match map.state.borrow_mut().marker_mut(self.id) {
            Some(m) => {
                m.position = at;
                true
            }
            None => false,
        };
        if changed {
            map.request_redraw();
        }
    }

    fn screen_position(&self) -> ScreenPoint {
        let Some(map) = self.scene() else {
            return ScreenPoint::default();
        };
        let s = map.state.borrow();
        s.marker(self.id)
            .map(|m| s.project(m.position))
            .unwrap_or_default()
    }

    fn on(&self, kind: MarkerEventKind, callback: MarkerCallback) -> ListenerId {
        let Some(map) = self.scene() else {
            return ListenerId(0);
        };
        let mut s = map.state.borrow_mut();
        let id = ListenerId(s.next_id());
        if let Some(m) = s.marker_mut(self.id) {
            m.listeners.push((id, kind, callback));
        }
        id
    }

    fn off(&self, id: ListenerId) {
        let Some(map) = self.scene() else { return };
        let mut s = map.state.borrow_mut();
        if let Some(m) = s.marker_mut(self.id) {
            m.listeners.retain(|(l, _, _)| *l != id);
        }
    }

    fn remove(&self) {
        let Some(map) = self.scene() else { return };
        let removed = {
            let mut s = map.state.borrow_mut();
            let before = s.markers.len();
            s.markers.retain(|m| m.id != self.id);
            s.markers.len() != before
        };
        if removed {
            map.request_redraw();
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SceneFactory;

impl EngineFactory for SceneFactory {
    type Engine = SceneMap;

    fn construct(&self, options: MapOptions) -> SceneMap {
        SceneMap::new(options)
    }
}

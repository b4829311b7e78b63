//! Capability interface of the map-rendering engine.
//!
//! Core logic (view lifecycle, marker reconciliation, click routing) only ever
//! talks to a map through these traits, so any renderer, or a test double that
//! emits synthetic events, can sit behind them.

use std::cell::Cell;
use std::rc::Rc;

use atlas_shared::models::{LngLat, LocationType};
use thiserror::Error;

/// Pixel position relative to the map container's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        ScreenPoint { x, y }
    }

    pub fn distance(&self, other: ScreenPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("layer {0} already exists")]
    DuplicateLayer(String),
    #[error("map has been removed")]
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
    Grab,
    Grabbing,
    Crosshair,
}

impl Cursor {
    pub fn css(&self) -> &'static str {
        match self {
            Cursor::Default => "",
            Cursor::Pointer => "pointer",
            Cursor::Grab => "grab",
            Cursor::Grabbing => "grabbing",
            Cursor::Crosshair => "crosshair",
        }
    }
}

/// Which point of the marker element sits on the geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    Center,
    #[default]
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Settlement,
    Other,
    /// Placeholder for a location that is still being created.
    Pending,
}

impl From<LocationType> for Glyph {
    fn from(kind: LocationType) -> Self {
        match kind {
            LocationType::Settlement => Glyph::Settlement,
            LocationType::Other => Glyph::Other,
        }
    }
}

/// Visual part of a marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerElement {
    pub glyph: Glyph,
    pub cursor: Cursor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerOptions {
    pub element: MarkerElement,
    pub draggable: bool,
    pub anchor: Anchor,
    pub position: LngLat,
}

/// An image stretched over four geographic corners (TL, TR, BR, BL).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLayer {
    pub source_id: String,
    pub layer_id: String,
    pub url: String,
    pub corners: [LngLat; 4],
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapStyle {
    pub background: String,
}

impl Default for MapStyle {
    /// No base map: only the image overlays are drawn.
    fn default() -> Self {
        MapStyle {
            background: "#1b1f24".to_string(),
        }
    }
}

/// Arguments of `construct`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapOptions {
    pub container: String,
    pub style: MapStyle,
    pub center: LngLat,
    pub zoom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Navigation,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapEventKind {
    Load,
    Idle,
    MoveStart,
    Click,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapEvent {
    Load,
    Idle,
    MoveStart,
    Click { point: ScreenPoint, lng_lat: LngLat },
}

impl MapEvent {
    pub fn kind(&self) -> MapEventKind {
        match self {
            MapEvent::Load => MapEventKind::Load,
            MapEvent::Idle => MapEventKind::Idle,
            MapEvent::MoveStart => MapEventKind::MoveStart,
            MapEvent::Click { .. } => MapEventKind::Click,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerEventKind {
    DragStart,
    DragEnd,
    Click,
}

/// Payload of every marker event.
///
/// `gesture` identifies the pointer interaction (press through release and the
/// click that follows it) the event belongs to.
#[derive(Debug)]
pub struct MarkerEvent {
    pub kind: MarkerEventKind,
    pub gesture: u64,
    pub lng_lat: LngLat,
    pub point: ScreenPoint,
    propagation_stopped: Cell<bool>,
}

impl MarkerEvent {
    pub fn new(kind: MarkerEventKind, gesture: u64, lng_lat: LngLat, point: ScreenPoint) -> Self {
        MarkerEvent {
            kind,
            gesture,
            lng_lat,
            point,
            propagation_stopped: Cell::new(false),
        }
    }

    /// Keep the event from reaching the map's own listeners.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}

pub type MapCallback = Rc<dyn Fn(&MapEvent)>;
pub type MarkerCallback = Rc<dyn Fn(&MarkerEvent)>;

/// A live map. Handles are cheap clones of the same instance.
pub trait MapEngine: Clone + PartialEq + 'static {
    type Marker: MarkerHandle;

    fn add_image_layer(&self, layer: ImageLayer) -> Result<(), EngineError>;
    fn has_layer(&self, layer_id: &str) -> bool;
    fn add_control(&self, control: Control, corner: Corner);

    fn on(&self, kind: MapEventKind, callback: MapCallback) -> ListenerId;
    fn off(&self, id: ListenerId);

    fn create_marker(&self, options: MarkerOptions) -> Self::Marker;

    fn project(&self, at: LngLat) -> ScreenPoint;
    fn unproject(&self, point: ScreenPoint) -> LngLat;

    fn set_cursor(&self, cursor: Cursor);

    /// Drop every layer, marker and listener. Further calls are no-ops.
    fn remove(&self);
}

pub trait MarkerHandle: 'static {
    fn position(&self) -> LngLat;
    fn set_position(&self, at: LngLat);
    /// Anchor point in container pixels.
    fn screen_position(&self) -> ScreenPoint;

    fn on(&self, kind: MarkerEventKind, callback: MarkerCallback) -> ListenerId;
    fn off(&self, id: ListenerId);

    fn remove(&self);
}

/// Builds engine instances; the `construct` capability.
pub trait EngineFactory {
    type Engine: MapEngine;

    fn construct(&self, options: MapOptions) -> Self::Engine;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_event_propagation_flag() {
        let event = MarkerEvent::new(
            MarkerEventKind::Click,
            3,
            LngLat::new(0.0, 0.0),
            ScreenPoint::default(),
        );
        assert!(!event.propagation_stopped());
        event.stop_propagation();
        assert!(event.propagation_stopped());
    }

    #[test]
    fn test_glyph_from_location_type() {
        assert_eq!(Glyph::from(LocationType::Settlement), Glyph::Settlement);
        assert_eq!(Glyph::from(LocationType::Other), Glyph::Other);
    }

    #[test]
    fn test_screen_point_distance() {
        let d = ScreenPoint::new(0.0, 0.0).distance(ScreenPoint::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-9);
    }
}

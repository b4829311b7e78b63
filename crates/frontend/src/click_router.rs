//! Turns clicks on empty map area into pending locations while edit mode is on.

use std::cell::Cell;
use std::rc::Rc;

use atlas_shared::models::LngLat;

use crate::engine::{Cursor, ListenerId, MapEngine, MapEvent, MapEventKind};

/// A position the user picked for a location that is not created yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingLocation {
    pub coordinates: LngLat,
}

pub type PendingSink = Rc<dyn Fn(PendingLocation)>;

struct Attachment<E: MapEngine> {
    engine: E,
    listener: ListenerId,
    // Cleared on detach so a click already being dispatched is dropped.
    active: Rc<Cell<bool>>,
}

pub struct MapClickRouter<E: MapEngine> {
    sink: PendingSink,
    attached: Option<Attachment<E>>,
}

impl<E: MapEngine> MapClickRouter<E> {
    pub fn new(sink: PendingSink) -> Self {
        MapClickRouter {
            sink,
            attached: None,
        }
    }

    /// Attach to `engine` when `edit_mode` is on, detach otherwise.
    pub fn sync(&mut self, engine: &E, edit_mode: bool) {
        let same_engine = matches!(&self.attached, Some(a) if a.engine == *engine);
        if edit_mode && same_engine {
            return;
        }
        self.detach();
        if !edit_mode {
            return;
        }

        let active = Rc::new(Cell::new(true));
        let on_click = {
            let active = active.clone();
            let sink = self.sink.clone();
            move |event: &MapEvent| {
                if !active.get() {
                    return;
                }
                if let MapEvent::Click { lng_lat, .. } = event {
                    tracing::debug!(lng = lng_lat.lng, lat = lng_lat.lat, "map click in edit mode");
                    sink(PendingLocation {
                        coordinates: *lng_lat,
                    });
                }
            }
        };
        let listener = engine.on(MapEventKind::Click, Rc::new(on_click));
        engine.set_cursor(Cursor::Crosshair);
        self.attached = Some(Attachment {
            engine: engine.clone(),
            listener,
            active,
        });
    }

    pub fn detach(&mut self) {
        if let Some(a) = self.attached.take() {
            a.active.set(false);
            a.engine.off(a.listener);
            a.engine.set_cursor(Cursor::Default);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }
}

impl<E: MapEngine> Drop for MapClickRouter<E> {
    fn drop(&mut self) {
        self.detach();
    }
}

//! Lifecycle of the map showing one geo-referenced image.

use std::cell::Cell;
use std::rc::Rc;

use atlas_shared::maps::MapDefinition;

use crate::engine::{
    Control, Corner, EngineError, EngineFactory, ImageLayer, ListenerId, MapEngine, MapEvent,
    MapEventKind, MapOptions, MapStyle,
};

/// Opacity of the raster image over the background.
pub const IMAGE_OPACITY: f64 = 0.85;

#[derive(Debug, Clone, PartialEq)]
pub struct MapViewConfig {
    pub container: String,
    pub style: MapStyle,
}

pub fn image_layer(definition: &MapDefinition) -> ImageLayer {
    ImageLayer {
        source_id: definition.source_id(),
        layer_id: definition.layer_id(),
        url: definition.image_url.to_string(),
        corners: definition.image_coordinates,
        opacity: IMAGE_OPACITY,
    }
}

struct Mounted<E: MapEngine> {
    engine: E,
    map_id: &'static str,
    idle_listener: ListenerId,
    ready: Rc<Cell<bool>>,
}

/// Owns at most one live engine instance.
pub struct GeoImageMapView<F: EngineFactory> {
    factory: F,
    config: MapViewConfig,
    mounted: Option<Mounted<F::Engine>>,
    on_ready: Option<Rc<dyn Fn(&'static str)>>,
}

impl<F: EngineFactory> GeoImageMapView<F> {
    pub fn new(factory: F, config: MapViewConfig) -> Self {
        GeoImageMapView {
            factory,
            config,
            mounted: None,
            on_ready: None,
        }
    }

    /// Called with the map id once the image layer of a mount is in place.
    pub fn set_on_ready(&mut self, hook: Rc<dyn Fn(&'static str)>) {
        self.on_ready = Some(hook);
    }

    /// Replace any live engine with a new one showing `definition`.
    ///
    /// The image layer is added on the first `idle` of the new engine, after
    /// which the view reports ready.
    pub fn mount(&mut self, definition: &'static MapDefinition) -> F::Engine {
        self.unmount();

        let engine = self.factory.construct(MapOptions {
            container: self.config.container.clone(),
            style: self.config.style.clone(),
            center: definition.center,
            zoom: definition.zoom,
        });
        engine.add_control(Control::Navigation, Corner::TopRight);
        engine.add_control(Control::Scale, Corner::BottomLeft);

        let ready = Rc::new(Cell::new(false));
        let on_idle = {
            let ready = ready.clone();
            let handle = engine.clone();
            let hook = self.on_ready.clone();
            let layer = image_layer(definition);
            let map_id = definition.id;
            move |_: &MapEvent| {
                if ready.get() {
                    return;
                }
                match handle.add_image_layer(layer.clone()) {
                    Ok(()) | Err(EngineError::DuplicateLayer(_)) => {}
                    Err(e) => {
                        tracing::warn!(map = map_id, error = %e, "could not add image layer");
                        return;
                    }
                }
                ready.set(true);
                tracing::info!(map = map_id, "map ready");
                if let Some(hook) = &hook {
                    hook(map_id);
                }
            }
        };
        let idle_listener = engine.on(MapEventKind::Idle, Rc::new(on_idle));

        tracing::debug!(map = definition.id, zoom = definition.zoom, "mounted map");
        self.mounted = Some(Mounted {
            engine: engine.clone(),
            map_id: definition.id,
            idle_listener,
            ready,
        });
        engine
    }

    /// Tear down the live engine, if any.
    pub fn unmount(&mut self) {
        if let Some(m) = self.mounted.take() {
            m.engine.off(m.idle_listener);
            m.engine.remove();
            tracing::debug!(map = m.map_id, "unmounted map");
        }
    }

    pub fn engine(&self) -> Option<&F::Engine> {
        self.mounted.as_ref().map(|m| &m.engine)
    }

    pub fn active_map(&self) -> Option<&'static str> {
        self.mounted.as_ref().map(|m| m.map_id)
    }

    pub fn is_ready(&self) -> bool {
        self.mounted.as_ref().is_some_and(|m| m.ready.get())
    }
}

impl<F: EngineFactory> Drop for GeoImageMapView<F> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use atlas_shared::maps::find_map;

    use crate::scene::{SceneFactory, SceneMap};

    fn view() -> (GeoImageMapView<SceneFactory>, Rc<RefCell<Vec<&'static str>>>) {
        let mut view = GeoImageMapView::new(
            SceneFactory,
            MapViewConfig {
                container: "atlas-map".to_string(),
                style: MapStyle::default(),
            },
        );
        let ready = Rc::new(RefCell::new(Vec::new()));
        let sink = ready.clone();
        view.set_on_ready(Rc::new(move |id| sink.borrow_mut().push(id)));
        (view, ready)
    }

    fn kandarian() -> &'static MapDefinition {
        find_map("kandarian").unwrap()
    }

    fn arnen() -> &'static MapDefinition {
        find_map("arnen").unwrap()
    }

    #[test]
    fn test_mount_uses_definition_camera_and_controls() {
        let (mut view, _) = view();
        let engine: SceneMap = view.mount(arnen());
        assert_eq!(engine.container(), "atlas-map");
        assert_eq!(engine.center(), arnen().center);
        assert_eq!(engine.zoom(), 17.0);
        assert_eq!(
            engine.snapshot().controls,
            vec![
                (Control::Navigation, Corner::TopRight),
                (Control::Scale, Corner::BottomLeft)
            ]
        );
        assert_eq!(view.active_map(), Some("arnen"));
    }

    #[test]
    fn test_image_layer_added_on_first_idle() {
        let (mut view, ready) = view();
        let engine = view.mount(kandarian());
        assert!(!view.is_ready());
        assert!(!engine.has_layer("kandarian-layer"));

        engine.finish_render();

        assert!(view.is_ready());
        assert!(engine.has_layer("kandarian-layer"));
        assert_eq!(*ready.borrow(), vec!["kandarian"]);
        let layer = &engine.snapshot().layers[0];
        assert_eq!(layer.opacity, IMAGE_OPACITY);
        assert_eq!(layer.url, kandarian().image_url);
    }

    #[test]
    fn test_later_idles_do_not_add_again() {
        let (mut view, ready) = view();
        let engine = view.mount(kandarian());
        engine.finish_render();
        engine.finish_render();
        engine.finish_render();
        assert_eq!(engine.snapshot().layers.len(), 1);
        assert_eq!(ready.borrow().len(), 1);
    }

    #[test]
    fn test_remount_tears_down_previous_engine() {
        let (mut view, ready) = view();
        let first = view.mount(kandarian());
        first.finish_render();

        let second = view.mount(arnen());
        assert!(first.is_removed());
        assert_eq!(first.listener_count(), 0);
        assert!(!view.is_ready());

        // a stray idle from the old engine does nothing
        first.finish_render();
        assert!(!view.is_ready());

        second.finish_render();
        assert!(view.is_ready());
        assert!(second.has_layer("arnen-layer"));
        assert!(!second.has_layer("kandarian-layer"));
        assert_eq!(*ready.borrow(), vec!["kandarian", "arnen"]);
    }

    #[test]
    fn test_unmount_and_drop_remove_engine() {
        let (mut view, _) = view();
        let engine = view.mount(kandarian());
        view.unmount();
        assert!(engine.is_removed());
        assert!(view.engine().is_none());
        assert!(!view.is_ready());

        let engine = view.mount(kandarian());
        drop(view);
        assert!(engine.is_removed());
    }
}

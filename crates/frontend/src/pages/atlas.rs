use std::cell::RefCell;
use std::rc::Rc;

use atlas_shared::maps::{self, MAPS};
use atlas_shared::models::{LngLat, Location};
use dioxus::core::spawn_forever;
use dioxus::prelude::*;

use crate::api::SiloClient;
use crate::click_router::{MapClickRouter, PendingLocation};
use crate::components::add_location_form::AddLocationForm;
use crate::components::edit_location_form::EditLocationForm;
use crate::components::edit_mode_toggle::EditModeToggle;
use crate::components::label_popover::LabelPopover;
use crate::components::location_panel::LocationPanel;
use crate::components::map_canvas::MapCanvas;
use crate::components::map_switcher::MapSwitcherPanel;
use crate::components::status_badge::StatusBadge;
use crate::config::SiloConfig;
use crate::engine::{MapStyle, ScreenPoint};
use crate::fragment;
use crate::map_view::{GeoImageMapView, MapViewConfig};
use crate::markers::{MarkerIntent, MarkerReconciler};
use crate::scene::{SceneFactory, SceneMap};
use crate::store::{LoadStatus, LocationStore, PersistTask};

const MAP_CONTAINER_ID: &str = "atlas-map-container";

/// At most one overlay is open at a time.
#[derive(Debug, Clone, PartialEq)]
enum Overlay {
    None,
    Adding(LngLat),
    Editing(Location),
    Viewing {
        location: Location,
        pixel: ScreenPoint,
    },
}

// Writes outlive the page: a save issued just before unmount still lands.
fn run(task: PersistTask) {
    spawn_forever(task);
}

#[component]
pub fn Atlas() -> Element {
    let mut active_map = use_signal(|| maps::map_or_default(fragment::current().as_deref()).id);
    let mut edit_mode = use_signal(|| false);
    let mut overlay = use_signal(|| Overlay::None);
    let store_revision = use_signal(|| 0u64);
    let mut engine = use_signal(|| None::<SceneMap>);
    let mut map_ready = use_signal(|| false);

    let store = use_hook(|| {
        let store = LocationStore::new(SiloClient::new(SiloConfig::from_env()));
        store.subscribe(Rc::new(move || {
            let mut revision = store_revision;
            *revision.write() += 1;
        }));
        let loader = store.clone();
        spawn(async move { loader.load().await });
        store
    });
    use_drop({
        let store = store.clone();
        move || store.close()
    });

    let view = use_hook(|| {
        let mut view = GeoImageMapView::new(
            SceneFactory,
            MapViewConfig {
                container: MAP_CONTAINER_ID.to_string(),
                style: MapStyle::default(),
            },
        );
        view.set_on_ready(Rc::new(move |_| {
            let mut ready = map_ready;
            ready.set(true);
        }));
        Rc::new(RefCell::new(view))
    });

    let reconciler = use_hook({
        let store = store.clone();
        move || {
            let on_intent = move |intent: MarkerIntent| {
                let mut overlay = overlay;
                match intent {
                    MarkerIntent::View { location, pixel } => {
                        overlay.set(Overlay::Viewing { location, pixel })
                    }
                    MarkerIntent::Edit(location) => overlay.set(Overlay::Editing(location)),
                    MarkerIntent::Move { id, coordinates } => {
                        let map_id = *active_map.peek();
                        let Some(mut location) = store.location(map_id, &id) else {
                            return;
                        };
                        location.coordinates = coordinates;
                        match store.update(map_id, location) {
                            Ok(task) => run(task),
                            Err(e) => tracing::warn!(error = %e, "rejected marker move"),
                        }
                    }
                }
            };
            Rc::new(RefCell::new(MarkerReconciler::<SceneMap>::new(Rc::new(on_intent))))
        }
    });

    let router = use_hook(|| {
        let on_pending = move |pending: PendingLocation| {
            let mut overlay = overlay;
            overlay.set(Overlay::Adding(pending.coordinates));
        };
        Rc::new(RefCell::new(MapClickRouter::<SceneMap>::new(Rc::new(on_pending))))
    });

    // Switching maps is a full remount of the engine.
    use_effect({
        let view = view.clone();
        move || {
            let definition = maps::map_or_default(Some(active_map()));
            map_ready.set(false);
            let scene = view.borrow_mut().mount(definition);
            engine.set(Some(scene));
            fragment::write(definition.id);
        }
    });

    use_effect({
        let store = store.clone();
        let reconciler = reconciler.clone();
        move || {
            let _ = store_revision.read();
            let editing = edit_mode() && store.status() == LoadStatus::Ready;
            let map_id = active_map();
            let Some(scene) = engine() else { return };
            let locations = store.locations_for(map_id);
            reconciler.borrow_mut().reconcile(&scene, &locations, editing);
        }
    });

    use_effect({
        let router = router.clone();
        let store = store.clone();
        move || {
            let _ = store_revision.read();
            let editing = edit_mode() && store.status() == LoadStatus::Ready;
            match engine() {
                Some(scene) => router.borrow_mut().sync(&scene, editing),
                None => router.borrow_mut().detach(),
            }
        }
    });

    use_drop({
        let view = view.clone();
        let reconciler = reconciler.clone();
        let router = router.clone();
        move || {
            router.borrow_mut().detach();
            reconciler.borrow_mut().clear();
            view.borrow_mut().unmount();
        }
    });

    let _ = store_revision.read();
    let status = store.status();
    let syncing = store.is_syncing();
    let map_id = active_map();
    let writable = status == LoadStatus::Ready;
    let editing = edit_mode() && writable;

    let on_add = {
        let store = store.clone();
        move |location: Location| match store.add(*active_map.peek(), location) {
            Ok(task) => {
                run(task);
                overlay.set(Overlay::None);
            }
            Err(e) => tracing::warn!(error = %e, "rejected new location"),
        }
    };
    let on_save = {
        let store = store.clone();
        move |edited: Location| match store.update_details(*active_map.peek(), edited) {
            Ok(task) => {
                run(task);
                overlay.set(Overlay::None);
            }
            Err(e) => tracing::warn!(error = %e, "rejected location edit"),
        }
    };
    let on_delete = {
        let store = store.clone();
        move |id: String| match store.remove(*active_map.peek(), &id) {
            Ok(task) => {
                run(task);
                overlay.set(Overlay::None);
            }
            Err(e) => tracing::warn!(error = %e, "rejected location removal"),
        }
    };
    let close = move |_: ()| overlay.set(Overlay::None);

    let overlay_view = match overlay() {
        Overlay::None => rsx! {},
        Overlay::Adding(at) => rsx! {
            AddLocationForm {
                key: "{at.lng},{at.lat}",
                scene: engine(),
                coordinates: at,
                on_confirm: on_add,
                on_cancel: close,
            }
        },
        Overlay::Editing(location) => rsx! {
            EditLocationForm {
                key: "{location.id}",
                location,
                on_save,
                on_delete,
                on_cancel: close,
            }
        },
        Overlay::Viewing { location, .. } if location.has_link() => rsx! {
            LocationPanel { location, on_close: close }
        },
        Overlay::Viewing { location, pixel } => rsx! {
            LabelPopover { location, pixel: Some(pixel), on_close: close }
        },
    };

    rsx! {
        div { class: if map_ready() { "atlas ready" } else { "atlas" },
            if let Some(scene) = engine() {
                MapCanvas { key: "{map_id}", scene }
            }
            EditModeToggle {
                edit_mode: editing,
                disabled: !writable,
                on_toggle: move |_| {
                    edit_mode.toggle();
                    // drops a pending location or an open form along with the mode
                    overlay.set(Overlay::None);
                },
            }
            MapSwitcherPanel {
                maps: MAPS,
                active: map_id,
                on_select: move |id: &'static str| {
                    overlay.set(Overlay::None);
                    active_map.set(id);
                },
            }
            StatusBadge { status, syncing }
            {overlay_view}
        }
    }
}

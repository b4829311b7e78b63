use std::cell::RefCell;
use std::rc::Rc;

use atlas_shared::geo::format_lng_lat;
use atlas_shared::models::{LngLat, Location, LocationType};
use dioxus::prelude::*;

use crate::components::type_segment::TypeSegment;
use crate::engine::{Anchor, Cursor, Glyph, MapEngine, MarkerElement, MarkerHandle, MarkerOptions};
use crate::scene::{SceneMap, SceneMarker};

/// Form for a location at a freshly picked point.
///
/// Key it by the coordinates: the ghost marker is placed once per mount and
/// removed when the form goes away.
#[component]
pub fn AddLocationForm(
    scene: Option<SceneMap>,
    coordinates: LngLat,
    on_confirm: EventHandler<Location>,
    on_cancel: EventHandler<()>,
) -> Element {
    let mut label_value = use_signal(String::new);
    let mut link_value = use_signal(String::new);
    let mut kind = use_signal(LocationType::default);

    let ghost = use_hook(|| Rc::new(RefCell::new(None::<SceneMarker>)));
    use_effect({
        let ghost = ghost.clone();
        move || {
            let Some(scene) = scene.as_ref() else { return };
            if ghost.borrow().is_some() {
                return;
            }
            let marker = scene.create_marker(MarkerOptions {
                element: MarkerElement {
                    glyph: Glyph::Pending,
                    cursor: Cursor::Default,
                },
                draggable: false,
                anchor: Anchor::Bottom,
                position: coordinates,
            });
            *ghost.borrow_mut() = Some(marker);
        }
    });
    use_drop(move || {
        if let Some(marker) = ghost.borrow_mut().take() {
            marker.remove();
        }
    });

    let can_submit = !label_value.read().trim().is_empty();
    let readout = format_lng_lat(coordinates);

    rsx! {
        div { class: "location-form",
            p { class: "form-caption", "New location at {readout}" }
            form {
                onsubmit: move |evt: Event<FormData>| {
                    evt.prevent_default();
                    if label_value.read().trim().is_empty() {
                        return;
                    }
                    on_confirm.call(Location::new(coordinates, label_value(), link_value(), kind()));
                },
                label {
                    "Label *"
                    input {
                        r#type: "text",
                        value: "{label_value}",
                        autofocus: true,
                        required: true,
                        placeholder: "e.g. The Iron Fortress",
                        oninput: move |evt: Event<FormData>| label_value.set(evt.value()),
                    }
                }
                label {
                    "Link"
                    input {
                        r#type: "url",
                        value: "{link_value}",
                        placeholder: "https://...",
                        oninput: move |evt: Event<FormData>| link_value.set(evt.value()),
                    }
                }
                div { class: "form-field",
                    span { "Type" }
                    TypeSegment { value: kind(), on_change: move |k| kind.set(k) }
                }
                div { class: "form-actions",
                    button {
                        r#type: "button",
                        class: "secondary",
                        onclick: move |_| on_cancel.call(()),
                        "Cancel"
                    }
                    button { r#type: "submit", disabled: !can_submit, "Add Location" }
                }
            }
        }
    }
}

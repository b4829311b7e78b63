use atlas_shared::models::LocationType;
use dioxus::prelude::*;

#[component]
pub fn TypeSegment(value: LocationType, on_change: EventHandler<LocationType>) -> Element {
    rsx! {
        div { class: "type-segment", role: "radiogroup",
            for kind in LocationType::ALL {
                button {
                    r#type: "button",
                    class: if kind == value { "active" } else { "" },
                    "aria-checked": kind == value,
                    onclick: move |_| on_change.call(kind),
                    "{kind}"
                }
            }
        }
    }
}

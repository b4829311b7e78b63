use atlas_shared::models::Location;
use dioxus::prelude::*;

/// Height of the fixed navbar of the linked wiki pages. The iframe is shifted
/// up by this much so the navbar sits above the clipping edge.
const NAVBAR_HEIGHT: u32 = 60;

#[component]
pub fn LocationPanel(location: Location, on_close: EventHandler<()>) -> Element {
    let frame_style = format!(
        "height: calc(100% + {NAVBAR_HEIGHT}px); margin-top: -{NAVBAR_HEIGHT}px;"
    );
    rsx! {
        aside { class: "location-panel",
            header {
                strong { "{location.label}" }
                button {
                    class: "close",
                    title: "Close",
                    onclick: move |_| on_close.call(()),
                    "\u{00d7}"
                }
            }
            div { class: "location-frame",
                if location.has_link() {
                    iframe {
                        src: "{location.link}",
                        title: "{location.label}",
                        style: "{frame_style}",
                    }
                } else {
                    div { class: "location-empty", "No link provided for this location." }
                }
            }
        }
    }
}

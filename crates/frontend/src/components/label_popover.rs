use atlas_shared::models::Location;
use dioxus::prelude::*;

use crate::engine::ScreenPoint;

/// Gap between the popover and the top of the marker glyph.
const POPOVER_GAP: f64 = 8.0;

#[component]
pub fn LabelPopover(
    location: Location,
    pixel: Option<ScreenPoint>,
    on_close: EventHandler<()>,
) -> Element {
    let style = match pixel {
        Some(p) => format!(
            "left: {}px; top: {}px; transform: translate(-50%, -100%);",
            p.x,
            p.y - POPOVER_GAP
        ),
        None => "bottom: 40px; left: 50%; transform: translateX(-50%);".to_string(),
    };
    rsx! {
        div { class: "label-popover", style: "{style}",
            strong { "{location.label}" }
            button {
                class: "close",
                title: "Close",
                onclick: move |_| on_close.call(()),
                "\u{00d7}"
            }
        }
    }
}

use atlas_shared::maps::MapDefinition;
use dioxus::prelude::*;

#[component]
pub fn MapSwitcherPanel(
    maps: &'static [MapDefinition],
    active: &'static str,
    on_select: EventHandler<&'static str>,
) -> Element {
    rsx! {
        nav { class: "map-switcher",
            for map in maps.iter() {
                button {
                    key: "{map.id}",
                    class: if map.id == active { "active" } else { "" },
                    title: "{map.label}",
                    onclick: move |_| {
                        if map.id != active {
                            on_select.call(map.id);
                        }
                    },
                    "{map.label}"
                }
            }
        }
    }
}

use dioxus::prelude::*;

use crate::store::LoadStatus;

#[component]
pub fn StatusBadge(status: LoadStatus, syncing: bool) -> Element {
    let (class, text) = match (status, syncing) {
        (LoadStatus::Loading, _) => ("status-badge loading", "Loading locations..."),
        (LoadStatus::Error, _) => ("status-badge error", "Could not load locations"),
        (LoadStatus::Ready, true) => ("status-badge syncing", "Saving..."),
        (LoadStatus::Ready, false) => return rsx! {},
    };
    rsx! {
        div { class: "{class}", role: "status", "{text}" }
    }
}

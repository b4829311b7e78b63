use dioxus::prelude::*;

#[component]
pub fn EditModeToggle(edit_mode: bool, disabled: bool, on_toggle: EventHandler<()>) -> Element {
    let (label, title) = if disabled {
        ("Edit Mode", "Editing is available once locations have loaded")
    } else if edit_mode {
        ("Exit Edit Mode", "Exit edit mode")
    } else {
        ("Edit Mode", "Enter edit mode and click the map to add locations")
    };
    rsx! {
        button {
            class: if edit_mode { "edit-toggle active" } else { "edit-toggle" },
            title: "{title}",
            disabled,
            onclick: move |_| on_toggle.call(()),
            "{label}"
        }
    }
}

use atlas_shared::models::Location;
use dioxus::prelude::*;

use crate::components::type_segment::TypeSegment;

#[component]
pub fn EditLocationForm(
    location: Location,
    on_save: EventHandler<Location>,
    on_delete: EventHandler<String>,
    on_cancel: EventHandler<()>,
) -> Element {
    let mut label_value = use_signal(|| location.label.clone());
    let mut link_value = use_signal(|| location.link.clone());
    let mut kind = use_signal(|| location.kind);

    let can_submit = !label_value.read().trim().is_empty();
    let id = location.id.clone();

    rsx! {
        div { class: "location-form",
            p { class: "form-caption", "Edit location" }
            form {
                onsubmit: move |evt: Event<FormData>| {
                    evt.prevent_default();
                    if label_value.read().trim().is_empty() {
                        return;
                    }
                    on_save.call(Location {
                        label: label_value(),
                        link: link_value(),
                        kind: kind(),
                        ..location.clone()
                    });
                },
                label {
                    "Label *"
                    input {
                        r#type: "text",
                        value: "{label_value}",
                        autofocus: true,
                        required: true,
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
                div { class: "form-actions spread",
                    button {
                        r#type: "button",
                        class: "danger",
                        onclick: move |_| on_delete.call(id.clone()),
                        "Delete"
                    }
                    div { class: "form-actions",
                        button {
                            r#type: "button",
                            class: "secondary",
                            onclick: move |_| on_cancel.call(()),
                            "Cancel"
                        }
                        button { r#type: "submit", disabled: !can_submit, "Save" }
                    }
                }
            }
        }
    }
}

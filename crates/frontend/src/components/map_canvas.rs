use std::rc::Rc;

use dioxus::html::geometry::WheelDelta;
use dioxus::html::input_data::MouseButton;
use dioxus::prelude::*;

use crate::engine::{Anchor, Control, Corner, ScreenPoint};
use crate::markers::{glyph_svg, MARKER_SIZE};
use crate::scene::{MarkerView, SceneMap, NAV_ZOOM_STEP};

/// Widest the scale bar may grow, in pixels.
const SCALE_MAX_WIDTH: f64 = 100.0;

fn container_rect(id: &str) -> Option<web_sys::DomRect> {
    let document = web_sys::window()?.document()?;
    let element = document.get_element_by_id(id)?;
    Some(element.get_bounding_client_rect())
}

/// Client coordinates to container pixels.
fn local_point(id: &str, client_x: f64, client_y: f64) -> Option<ScreenPoint> {
    let rect = container_rect(id)?;
    Some(ScreenPoint::new(client_x - rect.left(), client_y - rect.top()))
}

fn sync_viewport(scene: &SceneMap, id: &str) {
    if let Some(rect) = container_rect(id) {
        scene.set_viewport(rect.width(), rect.height());
    }
}

/// Convert a wheel delta (pixels / lines / pages) to a uniform pixel-like value.
fn wheel_delta_y(delta: WheelDelta) -> f64 {
    match delta {
        WheelDelta::Pixels(d) => d.y,
        WheelDelta::Lines(d) => d.y * 40.0,
        WheelDelta::Pages(d) => d.y * 400.0,
    }
}

fn corner_class(corner: Corner) -> &'static str {
    match corner {
        Corner::TopLeft => "map-control top-left",
        Corner::TopRight => "map-control top-right",
        Corner::BottomLeft => "map-control bottom-left",
        Corner::BottomRight => "map-control bottom-right",
    }
}

/// Top-left of the glyph box for a marker anchored at `view.point`.
fn glyph_origin(view: &MarkerView) -> (f64, f64) {
    let half = MARKER_SIZE / 2.0;
    match view.anchor {
        Anchor::Center => (view.point.x - half, view.point.y - half),
        Anchor::Bottom => (view.point.x - half, view.point.y - MARKER_SIZE),
    }
}

/// Renders a `SceneMap` and feeds pointer input back into it.
///
/// Mount with a `key` per engine: the redraw hook is installed once.
#[component]
pub fn MapCanvas(scene: SceneMap) -> Element {
    let revision = use_signal(|| 0u64);
    let container = scene.container();

    use_hook({
        let scene = scene.clone();
        move || {
            scene.set_redraw(Rc::new(move || {
                let mut revision = revision;
                *revision.write() += 1;
            }));
        }
    });

    // Every committed frame reports `idle`, which is where the image layer
    // gets added after a mount.
    use_effect({
        let scene = scene.clone();
        let container = container.clone();
        move || {
            let _ = revision.read();
            sync_viewport(&scene, &container);
            scene.finish_render();
        }
    });

    let _ = revision.read();
    let snapshot = scene.snapshot();
    let container_style = format!(
        "background: {}; cursor: {};",
        snapshot.background,
        snapshot.cursor.css()
    );
    let layers: Vec<(String, String, String)> = snapshot
        .layers
        .iter()
        .map(|l| {
            (
                l.layer_id.clone(),
                l.url.clone(),
                format!(
                    "left: {}px; top: {}px; width: {}px; height: {}px; opacity: {};",
                    l.left, l.top, l.width, l.height, l.opacity
                ),
            )
        })
        .collect();
    let (scale_width, scale_label) = scene.scale_bar(SCALE_MAX_WIDTH);

    let on_wheel = {
        let scene = scene.clone();
        let container = container.clone();
        move |evt: Event<WheelData>| {
            evt.prevent_default();
            let delta_y = wheel_delta_y(evt.data().delta());
            let client = evt.data().client_coordinates();
            if let Some(point) = local_point(&container, client.x, client.y) {
                scene.wheel(point, delta_y);
            }
        }
    };
    let on_mouse_down = {
        let scene = scene.clone();
        let container = container.clone();
        move |evt: Event<MouseData>| {
            if evt.trigger_button() != Some(MouseButton::Primary) {
                return;
            }
            sync_viewport(&scene, &container);
            let client = evt.client_coordinates();
            if let Some(point) = local_point(&container, client.x, client.y) {
                scene.pointer_down(point);
            }
        }
    };
    let on_mouse_move = {
        let scene = scene.clone();
        let container = container.clone();
        move |evt: Event<MouseData>| {
            let client = evt.client_coordinates();
            if let Some(point) = local_point(&container, client.x, client.y) {
                scene.pointer_move(point);
            }
        }
    };
    let on_mouse_up = {
        let scene = scene.clone();
        let container = container.clone();
        move |evt: Event<MouseData>| {
            let client = evt.client_coordinates();
            if let Some(point) = local_point(&container, client.x, client.y) {
                scene.pointer_up(point);
            }
        }
    };
    let on_mouse_leave = {
        let scene = scene.clone();
        move |_: Event<MouseData>| scene.pointer_cancel()
    };

    rsx! {
        div {
            id: "{container}",
            class: "map-container",
            style: "{container_style}",
            onwheel: on_wheel,
            onmousedown: on_mouse_down,
            onmousemove: on_mouse_move,
            onmouseup: on_mouse_up,
            onmouseleave: on_mouse_leave,

            for (layer_id, url, style) in layers {
                img {
                    key: "{layer_id}",
                    class: "map-layer",
                    src: "{url}",
                    draggable: "false",
                    style: "{style}",
                }
            }

            for (marker_id, view) in snapshot.markers.iter().map(|v| (v.id, v.clone())) {
                MarkerPin {
                    key: "{marker_id}",
                    scene: scene.clone(),
                    container: container.clone(),
                    view,
                }
            }

            for (control, corner) in snapshot.controls.iter().copied() {
                {
                    match control {
                        Control::Navigation => rsx! {
                            NavigationControl { scene: scene.clone(), corner }
                        },
                        Control::Scale => rsx! {
                            ScaleControl { corner, width: scale_width, label: scale_label.clone() }
                        },
                    }
                }
            }
        }
    }
}

#[component]
fn MarkerPin(scene: SceneMap, container: String, view: MarkerView) -> Element {
    let (left, top) = glyph_origin(&view);
    let style = format!(
        "left: {}px; top: {}px; width: {}px; height: {}px; cursor: {};",
        left,
        top,
        MARKER_SIZE,
        MARKER_SIZE,
        view.cursor.css()
    );
    let svg = glyph_svg(view.glyph);
    let id = view.id;

    let on_mouse_down = {
        let scene = scene.clone();
        move |evt: Event<MouseData>| {
            evt.stop_propagation();
            if evt.trigger_button() != Some(MouseButton::Primary) {
                return;
            }
            let client = evt.client_coordinates();
            if let Some(point) = local_point(&container, client.x, client.y) {
                scene.press_marker(id, point);
            }
        }
    };
    let on_click = move |evt: Event<MouseData>| {
        evt.stop_propagation();
        scene.click_marker(id);
    };

    rsx! {
        div {
            class: "map-marker",
            style: "{style}",
            onmousedown: on_mouse_down,
            onclick: on_click,
            dangerous_inner_html: "{svg}",
        }
    }
}

#[component]
fn NavigationControl(scene: SceneMap, corner: Corner) -> Element {
    let zoom_in = {
        let scene = scene.clone();
        move |evt: Event<MouseData>| {
            evt.stop_propagation();
            scene.zoom_by(NAV_ZOOM_STEP);
        }
    };
    let zoom_out = move |evt: Event<MouseData>| {
        evt.stop_propagation();
        scene.zoom_by(-NAV_ZOOM_STEP);
    };

    let class = format!("{} nav-control", corner_class(corner));
    rsx! {
        div {
            class: "{class}",
            onmousedown: move |evt: Event<MouseData>| evt.stop_propagation(),
            onmouseup: move |evt: Event<MouseData>| evt.stop_propagation(),
            button { title: "Zoom in", onclick: zoom_in, "+" }
            button { title: "Zoom out", onclick: zoom_out, "\u{2212}" }
        }
    }
}

#[component]
fn ScaleControl(corner: Corner, width: f64, label: String) -> Element {
    let class = format!("{} scale-control", corner_class(corner));
    rsx! {
        div { class: "{class}",
            div { class: "scale-bar", style: "width: {width}px;", "{label}" }
        }
    }
}

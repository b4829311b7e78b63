pub mod add_location_form;
pub mod edit_location_form;
pub mod edit_mode_toggle;
pub mod label_popover;
pub mod location_panel;
pub mod map_canvas;
pub mod map_switcher;
pub mod status_badge;
pub mod type_segment;

//! Web-Mercator geometry for the image overlays.
//!
//! World pixels: the whole world is a square of `TILE_SIZE * 2^zoom` pixels,
//! x growing east from the antimeridian, y growing south from the top edge.

use crate::models::LngLat;

pub const TILE_SIZE: f64 = 512.0;

/// Latitude at which the Mercator square is cut off.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

pub const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.686;

pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 22.0;

/// Side length of the world square at `zoom`, in pixels.
pub fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * 2f64.powf(zoom)
}

/// Convert a geographic position to world pixels.
pub fn project(at: LngLat, zoom: f64) -> (f64, f64) {
    let size = world_size(zoom);
    let lat = at.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let sin = lat.sin();
    let x = (at.lng + 180.0) / 360.0 * size;
    let y = (0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * std::f64::consts::PI)) * size;
    (x, y)
}

/// Convert world pixels back to a geographic position.
pub fn unproject(x: f64, y: f64, zoom: f64) -> LngLat {
    let size = world_size(zoom);
    let lng = x / size * 360.0 - 180.0;
    let n = std::f64::consts::PI - 2.0 * std::f64::consts::PI * y / size;
    let lat = n.sinh().atan().to_degrees();
    LngLat::new(lng, lat)
}

/// Ground distance covered by one screen pixel at `lat`.
pub fn meters_per_pixel(lat: f64, zoom: f64) -> f64 {
    EARTH_CIRCUMFERENCE_M * lat.to_radians().cos() / world_size(zoom)
}

/// Round down to 1, 2, 3 or 5 times a power of ten.
fn round_distance(meters: f64) -> f64 {
    let pow10 = 10f64.powf(meters.log10().floor());
    let d = meters / pow10;
    let nice = if d >= 10.0 {
        10.0
    } else if d >= 5.0 {
        5.0
    } else if d >= 3.0 {
        3.0
    } else if d >= 2.0 {
        2.0
    } else {
        1.0
    };
    nice * pow10
}

/// Width and caption of a scale bar no wider than `max_width_px`.
pub fn scale_bar(lat: f64, zoom: f64, max_width_px: f64) -> (f64, String) {
    let max_meters = meters_per_pixel(lat, zoom) * max_width_px;
    if max_meters >= 1000.0 {
        let km = round_distance(max_meters / 1000.0);
        (max_width_px * km * 1000.0 / max_meters, format!("{} km", km))
    } else {
        let m = round_distance(max_meters);
        (max_width_px * m / max_meters, format!("{} m", m))
    }
}

/// Format a position as `42.1870°N, 75.9700°W`.
pub fn format_lng_lat(at: LngLat) -> String {
    let ns = if at.lat >= 0.0 { 'N' } else { 'S' };
    let ew = if at.lng >= 0.0 { 'E' } else { 'W' };
    format!(
        "{:.4}°{}, {:.4}°{}",
        at.lat.abs(),
        ns,
        at.lng.abs(),
        ew
    )
}

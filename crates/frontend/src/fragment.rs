//! The URL fragment names the active map, so a reload or a shared link opens
//! the same map.

/// Map id carried by a fragment such as `#arnen`.
pub fn parse(hash: &str) -> Option<&str> {
    let id = hash.strip_prefix('#').unwrap_or(hash).trim();
    (!id.is_empty()).then_some(id)
}

pub fn current() -> Option<String> {
    let hash = web_sys::window()?.location().hash().ok()?;
    parse(&hash).map(str::to_string)
}

pub fn write(map_id: &str) {
    let Some(window) = web_sys::window() else {
        return;
    };
    if window.location().set_hash(map_id).is_err() {
        tracing::warn!(map = map_id, "could not update location hash");
    }
}

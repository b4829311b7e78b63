use crate::models::LngLat;

/// A selectable map: one raster image stretched over a geographic quad.
#[derive(Debug, Clone, PartialEq)]
pub struct MapDefinition {
    pub id: &'static str,
    pub label: &'static str,
    pub image_url: &'static str,
    /// Top-left, top-right, bottom-right, bottom-left.
    pub image_coordinates: [LngLat; 4],
    pub center: LngLat,
    pub zoom: f64,
}

impl MapDefinition {
    pub fn source_id(&self) -> String {
        format!("{}-image", self.id)
    }

    pub fn layer_id(&self) -> String {
        format!("{}-layer", self.id)
    }
}

// Image is 6000x4000 (3:2). Lat span 2.125°, lon span corrected for
// Mercator at ~42°N: 2.125 * 1.5 / cos(42°) ≈ 4.289°.
const KANDARIAN: MapDefinition = MapDefinition {
    id: "kandarian",
    label: "Kandarian",
    image_url: "https://vtt-kandarian-world-info.vercel.app/img/user/%D0%9A%D0%B0%D0%BD%D0%B4%D0%B0%D1%80%D0%B8%D0%B0%D0%BD/%D0%93%D0%B5%D0%BE%D0%B3%D1%80%D0%B0%D1%84%D0%B8%D1%8F/kandarian_final_v2.webp",
    image_coordinates: [
        LngLat::new(-78.114, 43.249),
        LngLat::new(-73.826, 43.249),
        LngLat::new(-73.826, 41.124),
        LngLat::new(-78.114, 41.124),
    ],
    center: LngLat::new(-75.97, 42.187),
    zoom: 9.0,
};

// Placeholder bounds: lat span 0.0068°, lon span 0.0136°.
const ARNEN: MapDefinition = MapDefinition {
    id: "arnen",
    label: "Arnen",
    image_url: "https://vtt-kandarian-world-info.vercel.app/img/user/%D0%9A%D0%B0%D0%BD%D0%B4%D0%B0%D1%80%D0%B8%D0%B0%D0%BD/assets/arnen_large.WEBP",
    image_coordinates: [
        LngLat::new(-75.9768, 42.1904),
        LngLat::new(-75.9632, 42.1904),
        LngLat::new(-75.9632, 42.1836),
        LngLat::new(-75.9768, 42.1836),
    ],
    center: LngLat::new(-75.97, 42.187),
    zoom: 17.0,
};

pub const MAPS: &[MapDefinition] = &[KANDARIAN, ARNEN];

/// Map that owns records saved before per-map grouping existed.
pub const DEFAULT_MAP_ID: &str = "kandarian";

pub fn find_map(id: &str) -> Option<&'static MapDefinition> {
    MAPS.iter().find(|m| m.id == id)
}

/// Resolve a requested id, falling back to the default map.
pub fn map_or_default(id: Option<&str>) -> &'static MapDefinition {
    id.and_then(find_map).unwrap_or(&MAPS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map_is_first() {
        assert_eq!(MAPS[0].id, DEFAULT_MAP_ID);
    }

    #[test]
    fn test_map_ids_are_unique() {
        for (i, a) in MAPS.iter().enumerate() {
            for b in &MAPS[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn test_quads_are_ordered_clockwise_from_top_left() {
        for m in MAPS {
            let [tl, tr, br, bl] = m.image_coordinates;
            assert!(tl.lng < tr.lng && bl.lng < br.lng, "{}", m.id);
            assert!(tl.lat > bl.lat && tr.lat > br.lat, "{}", m.id);
            assert!(m.center.is_valid());
        }
    }

    #[test]
    fn test_find_and_fallback() {
        assert_eq!(find_map("arnen").map(|m| m.label), Some("Arnen"));
        assert!(find_map("nowhere").is_none());
        assert_eq!(map_or_default(Some("nowhere")).id, DEFAULT_MAP_ID);
        assert_eq!(map_or_default(None).id, DEFAULT_MAP_ID);
        assert_eq!(map_or_default(Some("arnen")).id, "arnen");
    }

    #[test]
    fn test_layer_ids() {
        assert_eq!(KANDARIAN.source_id(), "kandarian-image");
        assert_eq!(KANDARIAN.layer_id(), "kandarian-layer");
    }
}

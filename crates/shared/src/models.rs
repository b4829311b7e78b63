use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Geographic position. Serialized as the pair `[lon, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        LngLat { lng, lat }
    }

    /// Finite and inside [-180, 180] x [-90, 90].
    pub fn is_valid(&self) -> bool {
        self.lng.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lng)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

impl From<[f64; 2]> for LngLat {
    fn from(pair: [f64; 2]) -> Self {
        LngLat::new(pair[0], pair[1])
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(at: LngLat) -> Self {
        [at.lng, at.lat]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Settlement,
    #[default]
    Other,
}

impl LocationType {
    pub const ALL: [LocationType; 2] = [LocationType::Settlement, LocationType::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Settlement => "settlement",
            LocationType::Other => "other",
        }
    }

    /// Anything but the exact string `"settlement"` falls back to `Other`.
    pub fn from_value(value: &Value) -> Self {
        match value.as_str() {
            Some("settlement") => LocationType::Settlement,
            _ => LocationType::Other,
        }
    }
}

impl std::fmt::Display for LocationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LocationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(LocationType::from_value(&value))
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("label must not be empty")]
    EmptyLabel,
    #[error("coordinates out of range: [{lng}, {lat}]")]
    InvalidCoordinates { lng: f64, lat: f64 },
}

/// A point of interest pinned to one map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub coordinates: LngLat,
    pub label: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub link: String,
    #[serde(default, rename = "type")]
    pub kind: LocationType,
}

impl Location {
    /// Build a location with a freshly generated id.
    #[cfg(feature = "uuid-support")]
    pub fn new(
        coordinates: LngLat,
        label: impl Into<String>,
        link: impl Into<String>,
        kind: LocationType,
    ) -> Self {
        Location {
            id: uuid::Uuid::new_v4().to_string(),
            coordinates,
            label: label.into(),
            link: link.into(),
            kind,
        }
        .normalized()
    }

    /// Trim surrounding whitespace from label and link.
    pub fn normalized(mut self) -> Self {
        let label = self.label.trim();
        if label.len() != self.label.len() {
            self.label = label.to_string();
        }
        let link = self.link.trim();
        if link.len() != self.link.len() {
            self.link = link.to_string();
        }
        self
    }

    pub fn validate(&self) -> Result<(), LocationError> {
        if self.label.trim().is_empty() {
            return Err(LocationError::EmptyLabel);
        }
        if !self.coordinates.is_valid() {
            return Err(LocationError::InvalidCoordinates {
                lng: self.coordinates.lng,
                lat: self.coordinates.lat,
            });
        }
        Ok(())
    }

    pub fn has_link(&self) -> bool {
        !self.link.is_empty()
    }
}

/// Locations saved for a single map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEntry {
    pub map: String,
    pub markers: Vec<Location>,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document is not a sequence")]
    NotASequence,
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The persisted document: one entry per map that has ever had markers saved.
///
/// Every mutation returns a new value and leaves `self` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MapStore {
    entries: Vec<MapEntry>,
}

impl MapStore {
    pub fn new(entries: Vec<MapEntry>) -> Self {
        MapStore { entries }
    }

    /// Decode a fetched document.
    ///
    /// A bare list of locations (the legacy shape) is migrated into a single
    /// entry under `default_map`. Every marker comes out normalized.
    pub fn from_value(value: Value, default_map: &str) -> Result<Self, DocumentError> {
        let Value::Array(items) = value else {
            return Err(DocumentError::NotASequence);
        };

        let grouped = items.iter().all(|item| item.get("markers").is_some());
        let entries = if grouped {
            items
                .into_iter()
                .map(serde_json::from_value::<MapEntry>)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            let markers = items
                .into_iter()
                .map(serde_json::from_value::<Location>)
                .collect::<Result<Vec<_>, _>>()?;
            vec![MapEntry {
                map: default_map.to_string(),
                markers,
            }]
        };

        let entries = entries
            .into_iter()
            .map(|entry| MapEntry {
                map: entry.map,
                markers: entry.markers.into_iter().map(Location::normalized).collect(),
            })
            .collect();
        Ok(MapStore { entries })
    }

    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    pub fn locations_for(&self, map_id: &str) -> &[Location] {
        self.entries
            .iter()
            .find(|e| e.map == map_id)
            .map(|e| e.markers.as_slice())
            .unwrap_or(&[])
    }

    pub fn location(&self, map_id: &str, id: &str) -> Option<&Location> {
        self.locations_for(map_id).iter().find(|l| l.id == id)
    }

    /// Append to the map's list, creating the entry if the map has none yet.
    pub fn with_added(&self, map_id: &str, location: Location) -> Self {
        let mut next = self.clone();
        match next.entries.iter_mut().find(|e| e.map == map_id) {
            Some(entry) => entry.markers.push(location),
            None => next.entries.push(MapEntry {
                map: map_id.to_string(),
                markers: vec![location],
            }),
        }
        next
    }

    /// Replace the record with the same id. Unknown ids leave the store as is.
    pub fn with_updated(&self, map_id: &str, location: Location) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next.entries.iter_mut().find(|e| e.map == map_id) {
            for slot in entry.markers.iter_mut().filter(|l| l.id == location.id) {
                *slot = location.clone();
            }
        }
        next
    }

    pub fn with_removed(&self, map_id: &str, id: &str) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next.entries.iter_mut().find(|e| e.map == map_id) {
            entry.markers.retain(|l| l.id != id);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loc(id: &str, kind: LocationType) -> Location {
        Location {
            id: id.to_string(),
            coordinates: LngLat::new(-75.9, 42.2),
            label: id.to_string(),
            link: String::new(),
            kind,
        }
    }

    fn kandarian_store() -> MapStore {
        MapStore::new(vec![MapEntry {
            map: "kandarian".to_string(),
            markers: vec![loc("A", LocationType::Settlement), loc("B", LocationType::Other)],
        }])
    }

    #[test]
    fn test_lng_lat_serializes_as_pair() {
        let json = serde_json::to_value(LngLat::new(-75.9, 42.2)).unwrap();
        assert_eq!(json, json!([-75.9, 42.2]));
        let back: LngLat = serde_json::from_value(json!([10.5, -3.0])).unwrap();
        assert_eq!(back, LngLat::new(10.5, -3.0));
    }

    #[test]
    fn test_lng_lat_validity() {
        assert!(LngLat::new(180.0, -90.0).is_valid());
        assert!(!LngLat::new(180.5, 0.0).is_valid());
        assert!(!LngLat::new(0.0, 91.0).is_valid());
        assert!(!LngLat::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_missing_or_unknown_type_becomes_other() {
        let doc = json!([
            { "map": "kandarian", "markers": [
                { "id": "a", "coordinates": [1.0, 2.0], "label": "A", "link": "" },
                { "id": "b", "coordinates": [1.0, 2.0], "label": "B", "link": "", "type": "castle" },
                { "id": "c", "coordinates": [1.0, 2.0], "label": "C", "link": "", "type": null },
                { "id": "d", "coordinates": [1.0, 2.0], "label": "D", "link": "", "type": "settlement" }
            ]}
        ]);
        let store = MapStore::from_value(doc, "kandarian").unwrap();
        let kinds: Vec<_> = store.locations_for("kandarian").iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LocationType::Other,
                LocationType::Other,
                LocationType::Other,
                LocationType::Settlement
            ]
        );
    }

    #[test]
    fn test_missing_link_becomes_empty() {
        let doc = json!([
            { "map": "arnen", "markers": [
                { "id": "a", "coordinates": [1.0, 2.0], "label": "A" },
                { "id": "b", "coordinates": [1.0, 2.0], "label": "B", "link": null }
            ]}
        ]);
        let store = MapStore::from_value(doc, "kandarian").unwrap();
        assert!(store.locations_for("arnen").iter().all(|l| l.link.is_empty()));
    }

    #[test]
    fn test_legacy_flat_array_is_migrated() {
        let doc = json!([
            { "id": "a", "coordinates": [-75.0, 42.0], "label": " Keep ", "link": "https://x" },
            { "id": "b", "coordinates": [-76.0, 41.5], "label": "Ford" }
        ]);
        let store = MapStore::from_value(doc, "kandarian").unwrap();
        assert_eq!(store.entries().len(), 1);
        assert_eq!(store.entries()[0].map, "kandarian");
        let markers = store.locations_for("kandarian");
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].label, "Keep");
        assert_eq!(markers[0].kind, LocationType::Other);
        assert_eq!(markers[1].link, "");
    }

    #[test]
    fn test_empty_array_is_empty_store() {
        let store = MapStore::from_value(json!([]), "kandarian").unwrap();
        assert!(store.entries().is_empty());
        assert!(store.locations_for("kandarian").is_empty());
    }

    #[test]
    fn test_non_array_document_is_rejected() {
        let err = MapStore::from_value(json!({ "markers": [] }), "kandarian").unwrap_err();
        assert!(matches!(err, DocumentError::NotASequence));
    }

    #[test]
    fn test_record_without_id_is_malformed() {
        let doc = json!([{ "coordinates": [1.0, 2.0], "label": "no id" }]);
        let err = MapStore::from_value(doc, "kandarian").unwrap_err();
        assert!(matches!(err, DocumentError::Malformed(_)));
    }

    #[test]
    fn test_remove_from_one_map_leaves_others_empty() {
        let store = kandarian_store();
        let next = store.with_removed("kandarian", "A");
        let ids: Vec<_> = next.locations_for("kandarian").iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["B"]);
        assert!(next.locations_for("arnen").is_empty());
        // the previous snapshot is untouched
        assert_eq!(store.locations_for("kandarian").len(), 2);
    }

    #[test]
    fn test_add_creates_entry_for_new_map() {
        let next = kandarian_store().with_added("arnen", loc("Z", LocationType::Other));
        assert_eq!(next.entries().len(), 2);
        assert_eq!(next.entries()[1].map, "arnen");
        assert_eq!(next.locations_for("arnen")[0].id, "Z");
    }

    #[test]
    fn test_update_replaces_matching_id_only() {
        let mut moved = loc("B", LocationType::Other);
        moved.coordinates = LngLat::new(-74.0, 42.9);
        let next = kandarian_store().with_updated("kandarian", moved);
        assert_eq!(next.location("kandarian", "B").unwrap().coordinates.lng, -74.0);
        assert_eq!(next.location("kandarian", "A").unwrap().coordinates.lng, -75.9);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let store = kandarian_store();
        assert_eq!(store.with_updated("kandarian", loc("Q", LocationType::Other)), store);
        assert_eq!(store.with_updated("arnen", loc("A", LocationType::Other)), store);
    }

    #[test]
    fn test_store_serializes_grouped_shape() {
        let json = serde_json::to_value(kandarian_store()).unwrap();
        assert_eq!(json[0]["map"], "kandarian");
        assert_eq!(json[0]["markers"][0]["type"], "settlement");
        assert_eq!(json[0]["markers"][1]["type"], "other");
        assert_eq!(json[0]["markers"][0]["coordinates"], json!([-75.9, 42.2]));
    }

    #[test]
    fn test_new_location_is_trimmed_and_has_id() {
        let location = Location::new(
            LngLat::new(-75.9, 42.2),
            "  Fort  ",
            " https://wiki ",
            LocationType::Settlement,
        );
        assert_eq!(location.label, "Fort");
        assert_eq!(location.link, "https://wiki");
        assert!(!location.id.is_empty());
    }

    #[test]
    fn test_validate() {
        let mut location = loc("A", LocationType::Other);
        assert!(location.validate().is_ok());
        location.label = "   ".to_string();
        assert_eq!(location.validate(), Err(LocationError::EmptyLabel));
        location.label = "A".to_string();
        location.coordinates = LngLat::new(200.0, 0.0);
        assert!(matches!(
            location.validate(),
            Err(LocationError::InvalidCoordinates { .. })
        ));
    }
}

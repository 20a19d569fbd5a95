//! GeoJSON `Feature` and `FeatureCollection` payloads.

use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;

/// Attribute map of a feature (population, income, name, year, ...).
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// One geographic entity: geometry plus year-scoped attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    /// The boundary or location. `None` for attribute-only rows.
    pub geometry: Option<Geometry>,
    /// Attributes keyed by column name.
    #[serde(default)]
    pub properties: Properties,
}

impl Feature {
    /// Create a feature from a geometry and properties.
    pub const fn new(geometry: Option<Geometry>, properties: Properties) -> Self {
        Self {
            geometry,
            properties,
        }
    }

    /// The `name` property, if present and a string.
    pub fn name(&self) -> Option<&str> {
        self.properties
            .get("name")
            .and_then(serde_json::Value::as_str)
    }

    /// The `year` property, if present and an integer.
    pub fn year(&self) -> Option<i32> {
        self.properties
            .get("year")
            .and_then(serde_json::Value::as_i64)
            .and_then(|y| i32::try_from(y).ok())
    }
}

/// An ordered set of features. The first feature is authoritative when a
/// lookup matched more than one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    /// Matched features in store order.
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Create a collection from features.
    pub const fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Whether the collection has no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// The authoritative (first) feature.
    pub fn first(&self) -> Option<&Feature> {
        self.features.first()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn collection_serializes_as_geojson() {
        let mut properties = Properties::new();
        properties.insert(String::from("name"), serde_json::json!("Austin"));
        properties.insert(String::from("year"), serde_json::json!(2023));
        let collection = FeatureCollection::new(vec![Feature::new(
            Some(Geometry::Point(vec![-97.74, 30.27])),
            properties,
        )]);

        let value = serde_json::to_value(&collection).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["type"], "Feature");
        assert_eq!(value["features"][0]["geometry"]["type"], "Point");
        assert_eq!(value["features"][0]["properties"]["name"], "Austin");

        let back: FeatureCollection = serde_json::from_value(value).unwrap();
        assert_eq!(back, collection);
        assert_eq!(back.first().unwrap().name(), Some("Austin"));
        assert_eq!(back.first().unwrap().year(), Some(2023));
    }

    #[test]
    fn null_geometry_is_allowed() {
        let value = serde_json::json!({
            "type": "Feature",
            "geometry": null,
            "properties": {"name": "Nowhere"}
        });
        let feature: Feature = serde_json::from_value(value).unwrap();
        assert!(feature.geometry.is_none());
    }
}

//! Canonical GeoJSON feature model returned by every backend.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// GeoJSON geometry as `{type, coordinates}`.
///
/// Coordinates are kept as raw JSON so that every geometry type passes
/// through without re-encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Value,
}

impl Geometry {
    /// Point geometry at the given coordinates.
    pub fn point(x: f64, y: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: Value::from(vec![x, y]),
        }
    }
}

impl Default for Geometry {
    /// Placeholder used for features whose source geometry is unusable.
    fn default() -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: Value::from(vec![0, 0]),
        }
    }
}

/// Feature identity as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::Text(text) => f.write_str(text),
            FeatureId::Number(number) => write!(f, "{}", number),
        }
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        FeatureId::Text(value.to_string())
    }
}

impl From<i64> for FeatureId {
    fn from(value: i64) -> Self {
        FeatureId::Number(value.into())
    }
}

/// A single GeoJSON feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// The literal `"Feature"` GeoJSON tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    #[default]
    Feature,
}

/// The literal `"FeatureCollection"` GeoJSON tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionKind {
    #[default]
    FeatureCollection,
}

/// Provenance and diagnostics attached to every collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_level: Option<String>,
    /// Set when the upstream payload was empty or malformed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Set when transforming the upstream payload failed outright.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Any additional keys carried over from the upstream payload.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Canonical GeoJSON feature collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: CollectionKind,
    pub features: Vec<Feature>,
    pub metadata: CollectionMetadata,
}

impl FeatureCollection {
    /// An empty collection with empty metadata.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collection_serializes_as_geojson() {
        let mut properties = Map::new();
        properties.insert("name".to_string(), json!("HQ"));
        let collection = FeatureCollection {
            kind: CollectionKind::FeatureCollection,
            features: vec![Feature {
                kind: FeatureKind::Feature,
                id: Some(FeatureId::from("bldg-001")),
                geometry: Geometry::point(116.4, 39.9),
                properties,
            }],
            metadata: CollectionMetadata {
                count: Some(1),
                resource_id: Some("buildings".to_string()),
                ..CollectionMetadata::default()
            },
        };

        let value = serde_json::to_value(&collection).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["type"], "Feature");
        assert_eq!(value["features"][0]["id"], "bldg-001");
        assert_eq!(value["features"][0]["geometry"]["type"], "Point");
        assert_eq!(value["metadata"]["resourceId"], "buildings");
        assert_eq!(value["metadata"]["count"], 1);
        assert!(value["metadata"].get("warning").is_none());
    }

    #[test]
    fn absent_id_is_not_serialized() {
        let feature = Feature {
            kind: FeatureKind::Feature,
            id: None,
            geometry: Geometry::default(),
            properties: Map::new(),
        };
        let value = serde_json::to_value(&feature).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["geometry"]["coordinates"], json!([0, 0]));
    }

    #[test]
    fn numeric_ids_round_trip_unchanged() {
        let id: FeatureId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(id.to_string(), "42");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!(42));
    }
}

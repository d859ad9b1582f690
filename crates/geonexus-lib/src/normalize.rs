//! Conversion of backend payloads into canonical feature collections.
//!
//! Upstream data is not trusted: missing feature lists produce an empty
//! collection with a warning, unusable geometries are replaced by a point at
//! the origin, and a structurally broken payload yields an empty collection
//! carrying an error description. The caller is never failed.

use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::feature::{
    CollectionKind, CollectionMetadata, Feature, FeatureCollection, FeatureId, FeatureKind,
    Geometry,
};

/// Warning attached when the payload carries no feature list.
pub const EMPTY_PAYLOAD_WARNING: &str = "input payload is empty or has no feature list";

/// Normalize a backend payload into a [`FeatureCollection`].
pub fn normalize_payload(payload: Option<&Value>) -> FeatureCollection {
    let Some(features) = payload
        .and_then(|p| p.get("features"))
        .and_then(Value::as_array)
    else {
        warn!("{}; returning empty feature collection", EMPTY_PAYLOAD_WARNING);
        return FeatureCollection {
            metadata: CollectionMetadata {
                warning: Some(EMPTY_PAYLOAD_WARNING.to_string()),
                ..CollectionMetadata::default()
            },
            ..FeatureCollection::empty()
        };
    };

    match transform_features(features) {
        Ok(features) => FeatureCollection {
            kind: CollectionKind::FeatureCollection,
            features,
            metadata: upstream_metadata(payload),
        },
        Err(message) => {
            error!(error = %message, "feature transformation failed");
            FeatureCollection {
                metadata: CollectionMetadata {
                    error: Some(format!("feature transformation failed: {}", message)),
                    ..CollectionMetadata::default()
                },
                ..FeatureCollection::empty()
            }
        }
    }
}

fn transform_features(source: &[Value]) -> Result<Vec<Feature>, String> {
    source
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let object = entry
                .as_object()
                .ok_or_else(|| format!("feature at index {} is not an object", index))?;
            Ok(transform_feature(object))
        })
        .collect()
}

fn transform_feature(source: &Map<String, Value>) -> Feature {
    let id = source.get("id").and_then(|raw| match raw {
        Value::String(text) => Some(FeatureId::Text(text.clone())),
        Value::Number(number) => Some(FeatureId::Number(number.clone())),
        Value::Null => None,
        other => {
            warn!(id = %other, "ignoring feature id that is neither string nor number");
            None
        }
    });

    let geometry = source
        .get("geometry")
        .and_then(parse_geometry)
        .unwrap_or_else(|| {
            let shown = id.as_ref().map(ToString::to_string);
            warn!(
                feature_id = shown.as_deref().unwrap_or("unknown"),
                "feature lacks a usable geometry; substituting point at origin"
            );
            Geometry::default()
        });

    let properties = source
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    Feature {
        kind: FeatureKind::Feature,
        id,
        geometry,
        properties,
    }
}

fn parse_geometry(raw: &Value) -> Option<Geometry> {
    let kind = raw.get("type")?.as_str().filter(|k| !k.is_empty())?;
    let coordinates = raw.get("coordinates").filter(|c| !c.is_null())?;
    Some(Geometry {
        kind: kind.to_string(),
        coordinates: coordinates.clone(),
    })
}

fn upstream_metadata(payload: Option<&Value>) -> CollectionMetadata {
    let mut metadata = CollectionMetadata::default();
    let Some(source) = payload
        .and_then(|p| p.get("metadata"))
        .and_then(Value::as_object)
    else {
        return metadata;
    };

    for (key, value) in source {
        let lifted = match key.as_str() {
            "provider" => lift_text(value, &mut metadata.provider),
            "timestamp" => lift_text(value, &mut metadata.timestamp),
            "queryTime" => lift_text(value, &mut metadata.query_time),
            "resourceId" => lift_text(value, &mut metadata.resource_id),
            "source" => lift_text(value, &mut metadata.source),
            "securityLevel" => lift_text(value, &mut metadata.security_level),
            "warning" => lift_text(value, &mut metadata.warning),
            "error" => lift_text(value, &mut metadata.error),
            "count" => match value.as_u64().and_then(|n| usize::try_from(n).ok()) {
                Some(count) => {
                    metadata.count = Some(count);
                    true
                }
                None => false,
            },
            _ => {
                metadata.extra.insert(key.clone(), value.clone());
                continue;
            }
        };
        if !lifted {
            warn!(key = %key, value = %value, "ignoring upstream metadata field with unexpected type");
        }
    }
    metadata
}

fn lift_text(value: &Value, slot: &mut Option<String>) -> bool {
    match value.as_str() {
        Some(text) => {
            *slot = Some(text.to_string());
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_and_empty_payloads_have_the_same_shape() {
        let from_none = normalize_payload(None);
        let from_null = normalize_payload(Some(&Value::Null));
        let from_empty = normalize_payload(Some(&json!({})));

        for collection in [&from_none, &from_null, &from_empty] {
            assert!(collection.is_empty());
            assert_eq!(
                collection.metadata.warning.as_deref(),
                Some(EMPTY_PAYLOAD_WARNING)
            );
            assert!(collection.metadata.error.is_none());
        }
        assert_eq!(from_none, from_empty);
    }

    #[test]
    fn non_array_feature_list_is_treated_as_missing() {
        let collection = normalize_payload(Some(&json!({ "features": { "a": 1 } })));
        assert!(collection.is_empty());
        assert!(collection.metadata.warning.is_some());
    }

    #[test]
    fn missing_geometry_defaults_to_origin_point() {
        let payload = json!({
            "features": [
                { "id": "a", "properties": { "name": "no geometry" } },
                { "id": "b", "geometry": { "type": "Point" } },
                { "id": "c", "geometry": { "coordinates": [1, 2] } },
                { "id": "d", "geometry": null },
            ]
        });
        let collection = normalize_payload(Some(&payload));

        assert_eq!(collection.len(), 4, "features must not be dropped");
        for feature in &collection.features {
            assert_eq!(feature.geometry.kind, "Point");
            assert_eq!(feature.geometry.coordinates, json!([0, 0]));
        }
        assert_eq!(
            collection.features[0].properties.get("name"),
            Some(&json!("no geometry"))
        );
    }

    #[test]
    fn valid_features_pass_through() {
        let payload = json!({
            "features": [
                {
                    "id": 7,
                    "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1]] },
                    "properties": { "lanes": 2 }
                },
                {
                    "geometry": { "type": "Point", "coordinates": [116.4, 39.9] }
                }
            ]
        });
        let collection = normalize_payload(Some(&payload));

        assert_eq!(collection.len(), 2);
        assert_eq!(
            collection.features[0].id,
            Some(FeatureId::Number(7.into()))
        );
        assert_eq!(collection.features[0].geometry.kind, "LineString");
        assert!(collection.features[1].id.is_none());
        assert!(collection.features[1].properties.is_empty());
        assert!(collection.metadata.warning.is_none());
    }

    #[test]
    fn broken_feature_entry_yields_error_collection() {
        let payload = json!({ "features": [ { "id": "ok" }, 42 ] });
        let collection = normalize_payload(Some(&payload));

        assert!(collection.is_empty());
        let error = collection.metadata.error.expect("error recorded");
        assert!(error.contains("index 1"));
    }

    #[test]
    fn upstream_metadata_is_preserved() {
        let payload = json!({
            "features": [],
            "metadata": { "sceneVersion": "3.2", "count": 99 }
        });
        let collection = normalize_payload(Some(&payload));
        assert_eq!(collection.metadata.extra.get("sceneVersion"), Some(&json!("3.2")));
        assert_eq!(collection.metadata.count, Some(99));
    }

    #[test]
    fn mistyped_upstream_metadata_keeps_other_keys() {
        let payload = json!({
            "features": [],
            "metadata": { "sceneVersion": "3.2", "count": "many", "timestamp": 17, "provider": "dts" }
        });
        let collection = normalize_payload(Some(&payload));
        let metadata = &collection.metadata;
        assert_eq!(metadata.extra.get("sceneVersion"), Some(&json!("3.2")));
        assert_eq!(metadata.provider.as_deref(), Some("dts"));
        assert!(metadata.count.is_none());
        assert!(metadata.timestamp.is_none());
        assert!(!metadata.extra.contains_key("count"));
    }
}

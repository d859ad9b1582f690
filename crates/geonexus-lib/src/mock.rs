//! Deterministic synthetic scene data for development environments.
//!
//! Payloads have the same shape as DTS API responses so they travel through
//! the normal normalization and enrichment pipeline.

use serde_json::{json, Value};
use tracing::info;

/// Scene identifiers with dedicated mock payloads.
pub const KNOWN_SCENES: &[&str] = &["buildings", "pois"];

/// Synthetic DTS payload for `scene_id`.
///
/// Unknown scenes receive a single default point feature.
pub fn supply(scene_id: &str) -> Value {
    info!(scene = scene_id, "serving mock scene data");
    match scene_id {
        "buildings" => buildings(),
        "pois" => pois(),
        _ => default_scene(),
    }
}

fn buildings() -> Value {
    json!({
        "featureCount": 2,
        "features": [
            {
                "id": "bldg-001",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[116.4, 39.9], [116.41, 39.9], [116.41, 39.91], [116.4, 39.91], [116.4, 39.9]]]
                },
                "properties": {
                    "name": "GeoNexus Headquarters",
                    "height": 120,
                    "floors": 30,
                    "status": "active",
                    "asset_ids": ["asset1", "asset2"]
                }
            },
            {
                "id": "bldg-002",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[116.42, 39.92], [116.43, 39.92], [116.43, 39.93], [116.42, 39.93], [116.42, 39.92]]]
                },
                "properties": {
                    "name": "GeoNexus R&D Center",
                    "height": 80,
                    "floors": 20,
                    "status": "inactive",
                    "asset_ids": ["asset3"]
                }
            }
        ]
    })
}

fn pois() -> Value {
    json!({
        "featureCount": 2,
        "features": [
            {
                "id": "poi-001",
                "geometry": { "type": "Point", "coordinates": [116.4, 39.9] },
                "properties": {
                    "name": "GeoNexus Cafe",
                    "category": "restaurant",
                    "rating": 4.8,
                    "status": "active",
                    "asset_ids": ["asset4", "asset5"]
                }
            },
            {
                "id": "poi-002",
                "geometry": { "type": "Point", "coordinates": [116.42, 39.92] },
                "properties": {
                    "name": "GeoNexus Fitness Center",
                    "category": "fitness",
                    "rating": 4.5,
                    "status": "active",
                    "asset_ids": ["asset6"]
                }
            }
        ]
    })
}

fn default_scene() -> Value {
    json!({
        "featureCount": 1,
        "features": [
            {
                "id": "default-001",
                "geometry": { "type": "Point", "coordinates": [116.4, 39.9] },
                "properties": {
                    "name": "Default feature 1",
                    "status": "active",
                    "asset_ids": ["asset7"]
                }
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature_count(payload: &Value) -> usize {
        payload["features"].as_array().map(Vec::len).unwrap_or(0)
    }

    #[test]
    fn known_scenes_have_two_features() {
        for scene in KNOWN_SCENES {
            assert_eq!(feature_count(&supply(scene)), 2, "scene {}", scene);
        }
        assert_eq!(supply("buildings")["features"][0]["id"], "bldg-001");
        assert_eq!(supply("pois")["features"][1]["id"], "poi-002");
    }

    #[test]
    fn unknown_scene_gets_default_payload() {
        let payload = supply("no-such-scene");
        assert_eq!(feature_count(&payload), 1);
        assert_eq!(payload["features"][0]["id"], "default-001");
    }

    #[test]
    fn payloads_are_deterministic() {
        assert_eq!(supply("buildings"), supply("buildings"));
        assert_eq!(supply("x"), supply("y"));
    }
}

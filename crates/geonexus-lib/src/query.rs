//! Query parameter normalization.
//!
//! Turns the raw, untyped query string of an incoming request into a
//! [`QueryDescriptor`]. Malformed values never fail the request: they are
//! replaced by defaults (and, for bounding boxes, logged and dropped).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Raw query parameters as received from the caller.
///
/// Keys are kept in sorted order so that serialized audit entries are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy in tests and the CLI.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize the parameters as a JSON object string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// First non-blank value among `keys`, in order of preference.
    fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.get(key))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}

impl From<BTreeMap<String, String>> for QueryParams {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self(value)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Axis-aligned bounding box in the backend's coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Parse a `minX,minY,maxX,maxY` string.
    ///
    /// Returns `None` unless the value splits into exactly four finite numbers.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<f64> = raw
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .ok()?;

        match parts.as_slice() {
            [min_x, min_y, max_x, max_y] if parts.iter().all(|v| v.is_finite()) => Some(Self {
                min_x: *min_x,
                min_y: *min_y,
                max_x: *max_x,
                max_y: *max_y,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// Field projection requested by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSelection {
    /// Every property is returned (`outFields=*` or no `outFields`).
    #[default]
    All,
    /// Only the listed properties, in request order.
    Only(Vec<String>),
}

impl FieldSelection {
    /// Parse an `outFields` value.
    pub fn parse(raw: &str) -> Self {
        let mut fields: Vec<String> = Vec::new();
        for field in raw.split(',').map(str::trim) {
            if field.is_empty() || field == "*" {
                continue;
            }
            if !fields.iter().any(|existing| existing == field) {
                fields.push(field.to_string());
            }
        }

        if fields.is_empty() || raw.split(',').any(|field| field.trim() == "*") {
            FieldSelection::All
        } else {
            FieldSelection::Only(fields)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, FieldSelection::All)
    }

    /// Whether a property named `name` survives the projection.
    pub fn includes(&self, name: &str) -> bool {
        match self {
            FieldSelection::All => true,
            FieldSelection::Only(fields) => fields.iter().any(|field| field == name),
        }
    }
}

impl fmt::Display for FieldSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSelection::All => f.write_str("*"),
            FieldSelection::Only(fields) => f.write_str(&fields.join(",")),
        }
    }
}

/// Per-backend defaults used while normalizing a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefaults {
    /// Resource queried when the route does not name one.
    pub default_resource: String,
    /// Upper bound (and default) for `limit`.
    pub max_records: u32,
}

/// Validated, backend-independent description of a feature query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub resource_id: String,
    pub bbox: Option<BoundingBox>,
    pub attribute_filter: Option<String>,
    pub limit: u32,
    pub offset: u32,
    pub fields: FieldSelection,
}

impl QueryDescriptor {
    /// Normalize raw request parameters into a descriptor.
    ///
    /// `path_resource` is the identifier taken from the request route; blank or
    /// missing identifiers fall back to `defaults.default_resource`.
    pub fn from_params(
        path_resource: Option<&str>,
        params: &QueryParams,
        defaults: &QueryDefaults,
    ) -> Self {
        let resource_id = path_resource
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(&defaults.default_resource)
            .to_string();

        let limit = params
            .first_of(&["limit", "resultRecordCount"])
            .and_then(parse_integer)
            .map(|requested| clamp_limit(requested, defaults.max_records))
            .unwrap_or(defaults.max_records);

        let offset = params
            .first_of(&["resultOffset", "offset"])
            .and_then(parse_integer)
            .map(|requested| requested.clamp(0, i64::from(u32::MAX)) as u32)
            .unwrap_or(0);

        let bbox = params.first_of(&["bbox"]).and_then(|raw| {
            let parsed = BoundingBox::parse(raw);
            if parsed.is_none() {
                warn!(bbox = raw, resource = %resource_id, "ignoring malformed bbox parameter");
            }
            parsed
        });

        let attribute_filter = params.first_of(&["where"]).map(str::to_string);

        let fields = params
            .first_of(&["outFields"])
            .map(FieldSelection::parse)
            .unwrap_or_default();

        let descriptor = Self {
            resource_id,
            bbox,
            attribute_filter,
            limit,
            offset,
            fields,
        };
        debug!(?descriptor, "normalized query parameters");
        descriptor
    }
}

fn parse_integer(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok()
}

/// Clamp a requested limit into `[0, max_records]`.
pub fn clamp_limit(requested: i64, max_records: u32) -> u32 {
    requested.clamp(0, i64::from(max_records)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> QueryDefaults {
        QueryDefaults {
            default_resource: "default".to_string(),
            max_records: 5000,
        }
    }

    fn descriptor(params: QueryParams) -> QueryDescriptor {
        QueryDescriptor::from_params(Some("buildings"), &params, &defaults())
    }

    #[test]
    fn missing_resource_falls_back_to_default() {
        let params = QueryParams::new();
        let d = QueryDescriptor::from_params(None, &params, &defaults());
        assert_eq!(d.resource_id, "default");

        let d = QueryDescriptor::from_params(Some("  "), &params, &defaults());
        assert_eq!(d.resource_id, "default");
    }

    #[test]
    fn empty_params_use_defaults() {
        let d = descriptor(QueryParams::new());
        assert_eq!(d.resource_id, "buildings");
        assert_eq!(d.limit, 5000);
        assert_eq!(d.offset, 0);
        assert!(d.bbox.is_none());
        assert!(d.attribute_filter.is_none());
        assert!(d.fields.is_all());
    }

    #[test]
    fn limit_prefers_limit_over_alias() {
        let d = descriptor(
            QueryParams::new()
                .with("limit", "10")
                .with("resultRecordCount", "20"),
        );
        assert_eq!(d.limit, 10);

        let d = descriptor(QueryParams::new().with("resultRecordCount", "20"));
        assert_eq!(d.limit, 20);
    }

    #[test]
    fn limit_is_clamped_to_max_records() {
        let d = descriptor(QueryParams::new().with("limit", "999999"));
        assert_eq!(d.limit, 5000);

        let d = descriptor(QueryParams::new().with("limit", "-5"));
        assert_eq!(d.limit, 0);
    }

    #[test]
    fn unparseable_limit_falls_back_to_default() {
        let d = descriptor(QueryParams::new().with("limit", "lots"));
        assert_eq!(d.limit, 5000);

        let d = descriptor(
            QueryParams::new()
                .with("limit", "")
                .with("resultRecordCount", "25"),
        );
        assert_eq!(d.limit, 25);
    }

    #[test]
    fn offset_accepts_both_names() {
        let d = descriptor(QueryParams::new().with("offset", "7"));
        assert_eq!(d.offset, 7);

        let d = descriptor(QueryParams::new().with("resultOffset", "10"));
        assert_eq!(d.offset, 10);

        let d = descriptor(QueryParams::new().with("offset", "abc"));
        assert_eq!(d.offset, 0);

        let d = descriptor(QueryParams::new().with("offset", "-3"));
        assert_eq!(d.offset, 0);
    }

    #[test]
    fn malformed_bboxes_are_dropped() {
        for raw in [
            "1,2,3",
            "1,2,3,4,5",
            "a,b,c,d",
            "1,2,,4",
            "",
            "1;2;3;4",
            "NaN,0,1,1",
            "inf,0,1,1",
        ] {
            let d = descriptor(QueryParams::new().with("bbox", raw));
            assert!(d.bbox.is_none(), "bbox {:?} should be discarded", raw);
        }
    }

    #[test]
    fn valid_bbox_is_parsed() {
        let d = descriptor(QueryParams::new().with("bbox", "116.3, 39.8,116.5,40.0"));
        assert_eq!(
            d.bbox,
            Some(BoundingBox {
                min_x: 116.3,
                min_y: 39.8,
                max_x: 116.5,
                max_y: 40.0,
            })
        );
    }

    #[test]
    fn out_fields_star_means_all() {
        let d = descriptor(QueryParams::new().with("outFields", "*"));
        assert_eq!(d.fields, FieldSelection::All);

        let d = descriptor(QueryParams::new().with("outFields", "name, height,name,,"));
        assert_eq!(
            d.fields,
            FieldSelection::Only(vec!["name".to_string(), "height".to_string()])
        );
        assert!(d.fields.includes("height"));
        assert!(!d.fields.includes("floors"));
    }

    #[test]
    fn blank_where_is_absent() {
        let d = descriptor(QueryParams::new().with("where", "   "));
        assert!(d.attribute_filter.is_none());

        let d = descriptor(QueryParams::new().with("where", "status = 'active'"));
        assert_eq!(d.attribute_filter.as_deref(), Some("status = 'active'"));
    }

    #[test]
    fn params_serialize_as_sorted_object() {
        let params = QueryParams::new().with("where", "1=1").with("limit", "5");
        assert_eq!(params.to_json(), r#"{"limit":"5","where":"1=1"}"#);
    }
}

//! Provenance metadata attached to outgoing collections.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};

use crate::feature::FeatureCollection;

/// Source label reported for synthetic development data.
pub const MOCK_SOURCE: &str = "mock";

/// Inputs for [`enrich`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    /// Human-readable name of the serving provider.
    pub provider: String,
    pub resource_id: String,
    /// Time spent serving the request so far.
    pub elapsed: Duration,
    /// Where the data came from (upstream service name or [`MOCK_SOURCE`]).
    pub source: String,
    pub security_level: Option<String>,
}

/// Attach provenance metadata to `collection`.
///
/// `count` is recomputed from the features actually present; any upstream
/// value is overwritten. Warning, error and extra keys already on the
/// collection are kept. Calling this repeatedly with the same inputs only
/// changes `timestamp`.
pub fn enrich(mut collection: FeatureCollection, info: &Enrichment) -> FeatureCollection {
    let metadata = &mut collection.metadata;
    metadata.provider = Some(info.provider.clone());
    metadata.timestamp = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
    metadata.query_time = Some(format!("{}ms", info.elapsed.as_millis()));
    metadata.resource_id = Some(info.resource_id.clone());
    metadata.source = Some(info.source.clone());
    if let Some(level) = &info.security_level {
        metadata.security_level = Some(level.clone());
    }
    metadata.count = Some(collection.features.len());
    collection
}

//! The seam between the gateway pipeline and concrete feature sources.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde_json::Value;

use crate::error::Result;
use crate::query::{QueryDefaults, QueryDescriptor};

/// Which family of backend a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Dts,
    SpatialDb,
}

impl BackendKind {
    /// Short name used in routes, logs and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Dts => "dts",
            BackendKind::SpatialDb => "postgis",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dts" => Ok(BackendKind::Dts),
            "postgis" | "spatial-db" | "spatial_db" => Ok(BackendKind::SpatialDb),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

/// Static facts about a backend that the pipeline needs around each call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendProfile {
    pub kind: BackendKind,
    /// Human-readable provider name reported in collection metadata.
    pub provider: String,
    pub max_records: u32,
    /// Resource used when the request names none. Empty when a path segment is required.
    pub default_resource: String,
    pub security_level: Option<String>,
}

impl BackendProfile {
    pub fn query_defaults(&self) -> QueryDefaults {
        QueryDefaults {
            default_resource: self.default_resource.clone(),
            max_records: self.max_records,
        }
    }
}

/// Raw payload returned by a backend call, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    /// DTS-shaped JSON (`{"features": [...]}`).
    pub payload: Value,
    /// Where the payload came from (`mock` for synthetic data).
    pub source: String,
}

/// A feature source.
///
/// `translate` is pure and runs before any I/O; `execute` performs the call.
/// Both are only reached after the access policy has allowed the resource.
pub trait FeatureBackend: Send + Sync {
    type Request: Send;

    fn profile(&self) -> &BackendProfile;

    fn translate(&self, query: &QueryDescriptor) -> Result<Self::Request>;

    fn execute(&self, request: Self::Request) -> impl Future<Output = Result<Fetched>> + Send;
}

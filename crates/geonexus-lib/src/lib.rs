//! GeoNexus feature-query gateway.
//!
//! This crate turns loosely-typed query parameters into validated requests
//! against heterogeneous geospatial backends (the DTS scene API and the
//! enterprise spatial database), enforces a per-backend allow-list with audit
//! logging, and normalizes whatever comes back into a canonical GeoJSON
//! [`FeatureCollection`]. The CLI and the HTTP service should only depend on
//! the items exported here.

#![deny(warnings)]

pub mod audit;
pub mod backend;
pub mod config;
pub mod dts;
pub mod error;
pub mod feature;
pub mod gateway;
pub mod metadata;
pub mod mock;
pub mod normalize;
pub mod policy;
pub mod query;
pub mod spatial_db;
pub mod translate;

pub use audit::{
    AuditRecord, AuditRecorder, AuditSink, CallerIdentity, JsonLinesAuditSink, SqliteAuditSink,
};
pub use backend::{BackendKind, BackendProfile, FeatureBackend, Fetched};
pub use config::{
    AuditConfig, AuditDestination, DtsConfig, Environment, GatewayConfig, SpatialDbConfig,
};
pub use dts::DtsBackend;
pub use error::{Error, Result};
pub use feature::{CollectionMetadata, Feature, FeatureCollection, FeatureId, Geometry};
pub use gateway::{GatedBackend, Gateway};
pub use metadata::{enrich, Enrichment};
pub use normalize::normalize_payload;
pub use policy::{AccessDecision, AccessPolicy};
pub use query::{BoundingBox, FieldSelection, QueryDefaults, QueryDescriptor, QueryParams};
pub use spatial_db::SpatialDbBackend;
pub use translate::{translate_dts, translate_sql, DtsRequest, SqlRequest, TableRef};

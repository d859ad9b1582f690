//! Shared infrastructure for GeoNexus HTTP microservices.
//!
//! This crate provides the HTTP glue around `geonexus-lib`:
//!
//! - [`AppState`]: the configured [`Gateway`](geonexus_lib::Gateway), shared by all handlers
//! - [`health`]: Health check handlers for Kubernetes liveness/readiness probes
//! - [`ProblemDetails`]: RFC 9457 Problem Details for consistent error responses
//! - [`GeoJsonResponse`]: `application/geo+json` success responses
//! - [`metrics`]: Prometheus metrics infrastructure
//! - [`logging`]: Structured JSON logging setup
//! - [`middleware`]: Request tracking and metrics middleware
//! - [`Caller`] and [`FeatureParams`]: request extraction
//!
//! # Architecture
//!
//! Handlers stay thin; policy, translation and normalization live in
//! `geonexus-lib`:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  axum Handler                                               │
//! │  - Extract path, query string and caller identity           │
//! │  - Call Gateway::query                                      │
//! │  - Record business metrics                                  │
//! │  - Format GeoJSON or problem details                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing Support
//!
//! The [`test_utils`] module provides a temporary spatial database and a
//! ready-made state for handler testing. Enable the `test-utils` feature to
//! access it from dependent crates.

#![deny(warnings)]

mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
mod problem;
mod request;
mod response;
mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use health::{health_live, health_ready, HealthStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    init_metrics, metrics_handler, record_access_denied, record_backend_failure,
    record_features_returned, record_features_served, record_unrestricted_access, MetricsConfig,
    MetricsError,
};
pub use middleware::{
    extract_or_generate_request_id, MetricsLayer, RequestId, REQUEST_ID_HEADER,
};
pub use problem::{
    from_lib_error, ProblemDetails, PROBLEM_BACKEND_NOT_CONFIGURED, PROBLEM_BACKEND_TIMEOUT,
    PROBLEM_BACKEND_UNAVAILABLE, PROBLEM_FORBIDDEN, PROBLEM_INTERNAL_ERROR,
    PROBLEM_INVALID_REQUEST,
};
pub use request::{caller_identity, Caller, FeatureParams, USER_ID_HEADER};
pub use response::{GeoJsonResponse, GEOJSON_CONTENT_TYPE};
pub use state::{AppState, AppStateError};

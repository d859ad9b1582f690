//! Prometheus metrics for GeoNexus microservices.
//!
//! This module provides:
//! - [`MetricsConfig`]: Configuration for the metrics system
//! - [`init_metrics`]: Initialize the Prometheus metrics recorder
//! - [`metrics_handler`]: Axum handler for `/metrics` endpoint
//! - Business metric helpers for the feature gateway
//!
//! # Example
//!
//! ```no_run
//! use geonexus_service_shared::metrics::{MetricsConfig, init_metrics, metrics_handler};
//! use axum::{Router, routing::get};
//!
//! let config = MetricsConfig::default();
//! init_metrics(&config).expect("failed to initialize metrics");
//!
//! let app: Router = Router::new()
//!     .route("/metrics", get(metrics_handler));
//! ```

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Configuration for the metrics system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Path for the metrics endpoint (e.g., "/metrics").
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl MetricsConfig {
    /// Create configuration from environment variables.
    ///
    /// - `METRICS_ENABLED`: "true" or "false" (default: true)
    /// - `METRICS_PATH`: Path for metrics endpoint (default: "/metrics")
    pub fn from_env() -> Self {
        let enabled = std::env::var("METRICS_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let path = std::env::var("METRICS_PATH").unwrap_or_else(|_| "/metrics".to_string());

        Self { enabled, path }
    }
}

/// Install the Prometheus recorder. Subsequent calls fail with
/// [`MetricsError::AlreadyInitialized`].
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Err(MetricsError::Disabled);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)?;

    Ok(())
}

/// Returns `None` if [`init_metrics`] has not been called.
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Axum handler for the `/metrics` endpoint (Prometheus exposition format).
pub async fn metrics_handler() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_else(|| "# Metrics not initialized\n".to_string())
}

/// Errors that can occur during metrics initialization.
#[derive(Debug, Clone)]
pub enum MetricsError {
    Disabled,
    AlreadyInitialized,
    InstallFailed(String),
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsError::Disabled => write!(f, "metrics are disabled"),
            MetricsError::AlreadyInitialized => write!(f, "metrics recorder already initialized"),
            MetricsError::InstallFailed(e) => {
                write!(f, "failed to install metrics recorder: {}", e)
            }
        }
    }
}

impl std::error::Error for MetricsError {}

// =============================================================================
// Business Metrics Helpers
// =============================================================================

/// Increments `geonexus_features_served_total`.
///
/// * `backend` - "dts" or "postgis"
/// * `source` - where the payload came from (e.g. "mock")
pub fn record_features_served(backend: &str, source: &str) {
    metrics::counter!(
        "geonexus_features_served_total",
        "backend" => backend.to_string(),
        "source" => source.to_string()
    )
    .increment(1);
}

/// Records the feature count of a response to the `geonexus_features_returned` histogram.
pub fn record_features_returned(count: usize, backend: &str) {
    metrics::histogram!(
        "geonexus_features_returned",
        "backend" => backend.to_string()
    )
    .record(count as f64);
}

/// Increments `geonexus_access_denied_total`.
pub fn record_access_denied(backend: &str) {
    metrics::counter!(
        "geonexus_access_denied_total",
        "backend" => backend.to_string()
    )
    .increment(1);
}

/// Increments `geonexus_unrestricted_access_total` for queries served
/// while the backend's allow-list is empty.
pub fn record_unrestricted_access(backend: &str) {
    metrics::counter!(
        "geonexus_unrestricted_access_total",
        "backend" => backend.to_string()
    )
    .increment(1);
}

/// Increments `geonexus_backend_failures_total`.
///
/// * `reason` - the library error's reason code (e.g. "backend_timeout")
pub fn record_backend_failure(backend: &str, reason: &str) {
    metrics::counter!(
        "geonexus_backend_failures_total",
        "backend" => backend.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

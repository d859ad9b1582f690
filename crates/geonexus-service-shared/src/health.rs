//! Health check handlers for Kubernetes probes.
//!
//! Provides `/health/live` and `/health/ready` endpoints that return JSON
//! status responses for Kubernetes liveness and readiness probes.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use geonexus_lib::BackendKind;

use crate::AppState;

/// Health status response for liveness and readiness probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "ok" or "not_ready: <reason>".
    pub status: String,

    pub service: String,

    pub version: String,

    /// Backends configured on this deployment (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backends: Option<Vec<String>>,

    /// Whether DTS queries are answered from mock data (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dts_mock: Option<bool>,
}

impl HealthStatus {
    pub fn alive(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            backends: None,
            dts_mock: None,
        }
    }

    pub fn ready(service: &str, version: &str, backends: Vec<String>, dts_mock: bool) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            backends: Some(backends),
            dts_mock: Some(dts_mock),
        }
    }

    pub fn not_ready(service: &str, version: &str, reason: &str) -> Self {
        Self {
            status: format!("not_ready: {}", reason),
            service: service.to_string(),
            version: version.to_string(),
            backends: None,
            dts_mock: None,
        }
    }
}

/// Liveness probe handler.
///
/// ```text
/// GET /health/live
/// {"status":"ok","service":"geonexus-service-shared","version":"0.1.0"}
/// ```
pub async fn health_live() -> impl IntoResponse {
    let status = HealthStatus::alive(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    (StatusCode::OK, Json(status))
}

/// Readiness probe handler.
///
/// Not ready while a configured spatial database file is missing.
///
/// ```text
/// GET /health/ready
/// {"status":"ok","service":"geonexus-service-shared","version":"0.1.0","backends":["dts","postgis"],"dts_mock":false}
/// ```
pub async fn health_ready(State(state): State<AppState>) -> Response {
    let service = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");
    let gateway = state.gateway();

    if let Some(spatial) = &gateway.config().spatial_db {
        if !spatial.database_path.exists() {
            let reason = format!(
                "spatial database not found at {}",
                spatial.database_path.display()
            );
            let status = HealthStatus::not_ready(service, version, &reason);
            return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
        }
    }

    let backends = [BackendKind::Dts, BackendKind::SpatialDb]
        .into_iter()
        .filter(|kind| gateway.has_backend(*kind))
        .map(|kind| kind.to_string())
        .collect();
    let dts_mock = gateway.dts().backend().uses_mock();

    let status = HealthStatus::ready(service, version, backends, dts_mock);
    (StatusCode::OK, Json(status)).into_response()
}

//! GeoNexus feature-query HTTP microservice.
//!
//! # Endpoints
//!
//! - `GET /api/v1/dts/features` - Query the default DTS scene
//! - `GET /api/v1/dts/{scene_id}/features` - Query a DTS scene
//! - `GET /api/v1/postgis/{table}/features` - Query a spatial database table
//! - `GET /health/live` - Kubernetes liveness probe
//! - `GET /health/ready` - Kubernetes readiness probe
//! - `GET /metrics` - Prometheus metrics
//!
//! Every feature endpoint accepts the same query string (`bbox`, `where`,
//! `limit`/`resultRecordCount`, `resultOffset`/`offset`, `outFields`) and the
//! optional `X-User-Id` header. Successful responses are
//! `application/geo+json`; failures are RFC 9457 problem documents.

use axum::{
    Router,
    extract::{Path, State},
    http::Method,
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use geonexus_lib::{BackendKind, Error as LibError};
use geonexus_service_shared::{
    AppState, Caller, FeatureParams, GeoJsonResponse, MetricsLayer, RequestId, from_lib_error,
    health_live, health_ready, metrics_handler, record_access_denied, record_backend_failure,
    record_features_returned, record_features_served, record_unrestricted_access,
};

/// Build the service router around `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/dts/features", get(default_scene_handler))
        .route("/api/v1/dts/{scene_id}/features", get(scene_handler))
        .route("/api/v1/postgis/{table}/features", get(table_handler))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(MetricsLayer)
        .with_state(state)
}

/// Handle GET /api/v1/dts/features requests.
async fn default_scene_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    Caller(caller): Caller,
    FeatureParams(params): FeatureParams,
) -> Response {
    serve_features(&state, BackendKind::Dts, None, &params, &caller, &request_id).await
}

/// Handle GET /api/v1/dts/{scene_id}/features requests.
async fn scene_handler(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
    request_id: RequestId,
    Caller(caller): Caller,
    FeatureParams(params): FeatureParams,
) -> Response {
    serve_features(
        &state,
        BackendKind::Dts,
        Some(&scene_id),
        &params,
        &caller,
        &request_id,
    )
    .await
}

/// Handle GET /api/v1/postgis/{table}/features requests.
async fn table_handler(
    State(state): State<AppState>,
    Path(table): Path<String>,
    request_id: RequestId,
    Caller(caller): Caller,
    FeatureParams(params): FeatureParams,
) -> Response {
    serve_features(
        &state,
        BackendKind::SpatialDb,
        Some(&table),
        &params,
        &caller,
        &request_id,
    )
    .await
}

async fn serve_features(
    state: &AppState,
    kind: BackendKind,
    path_resource: Option<&str>,
    params: &geonexus_lib::QueryParams,
    caller: &geonexus_lib::CallerIdentity,
    request_id: &RequestId,
) -> Response {
    let gateway = state.gateway();
    let backend = kind.as_str();

    match gateway.query(kind, path_resource, params, caller).await {
        Ok(collection) => {
            let source = collection.metadata.source.as_deref().unwrap_or("unknown");
            record_features_served(backend, source);
            record_features_returned(collection.len(), backend);
            if gateway
                .policy(kind)
                .map(|policy| policy.is_unrestricted())
                .unwrap_or(false)
            {
                record_unrestricted_access(backend);
            }

            info!(
                request_id = %request_id,
                backend,
                count = collection.len(),
                "feature query completed"
            );
            GeoJsonResponse(collection).into_response()
        }
        Err(err) => {
            match &err {
                LibError::Forbidden { .. } => record_access_denied(backend),
                LibError::BackendUnavailable { .. } | LibError::BackendTimeout { .. } => {
                    record_backend_failure(backend, err.reason_code())
                }
                _ => {}
            }

            warn!(
                request_id = %request_id,
                backend,
                reason = err.reason_code(),
                error = %err,
                "feature query failed"
            );
            from_lib_error(&err, request_id.as_str()).into_response()
        }
    }
}

//! GeoNexus feature-query HTTP microservice.
//!
//! # Configuration
//!
//! - `GEONEXUS_CONFIG` - Optional JSON configuration file
//! - `GEONEXUS_*` - Individual overrides (see `geonexus_lib::config`)
//! - `RUST_LOG` - Log filter (default: the configured `log_level`)
//! - `LOG_FORMAT` - `json` (default) or `text`
//! - `SERVICE_PORT` - HTTP port (default: 8080)

use std::env;
use std::net::SocketAddr;

use tracing::{error, info, warn};

use geonexus_service_shared::{
    AppState, LoggingConfig, MetricsConfig, init_logging, init_metrics,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::load();

    let default_level = state
        .as_ref()
        .map(|s| s.gateway().config().log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(&LoggingConfig::from_env(&default_level).with_service("features"));

    let metrics_config = MetricsConfig::from_env();
    if let Err(e) = init_metrics(&metrics_config) {
        warn!(error = %e, "metrics disabled");
    }

    let state = state.map_err(|e| {
        error!(error = %e, "failed to load application state");
        e
    })?;

    let port: u16 = env::var("SERVICE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    info!(port, state = ?state, "starting features service");

    let app = geonexus_service_features::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "listening on");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

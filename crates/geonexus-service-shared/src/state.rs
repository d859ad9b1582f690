//! Application state for HTTP microservices.
//!
//! Handlers reach the [`Gateway`] through axum's `State` extractor.

use std::sync::Arc;

use geonexus_lib::{Error as LibError, Gateway, GatewayConfig};

/// Error during application state initialization.
#[derive(Debug)]
pub enum AppStateError {
    /// The configuration file or environment could not be read.
    ConfigLoad(LibError),

    /// The gateway rejected the configuration or a backend failed to start.
    GatewayInit(LibError),
}

impl std::fmt::Display for AppStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigLoad(e) => write!(f, "failed to load configuration: {}", e),
            Self::GatewayInit(e) => write!(f, "failed to initialize gateway: {}", e),
        }
    }
}

impl std::error::Error for AppStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigLoad(e) | Self::GatewayInit(e) => Some(e),
        }
    }
}

/// Shared application state for all axum handlers.
///
/// Cheap to clone; every clone shares one [`Gateway`].
///
/// # Example
///
/// ```ignore
/// use axum::{Router, routing::get, extract::State};
/// use geonexus_service_shared::AppState;
///
/// async fn handler(State(state): State<AppState>) {
///     let policy = state.gateway().dts().policy();
/// }
///
/// let state = AppState::load().unwrap();
/// let app = Router::new()
///     .route("/api/v1/dts/features", get(handler))
///     .with_state(state);
/// ```
#[derive(Clone)]
pub struct AppState {
    gateway: Arc<Gateway>,
}

impl AppState {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }

    /// Build the gateway from an explicit configuration.
    pub fn from_config(config: GatewayConfig) -> Result<Self, AppStateError> {
        let gateway = Gateway::from_config(config).map_err(AppStateError::GatewayInit)?;
        Ok(Self::new(gateway))
    }

    /// Load configuration from `GEONEXUS_CONFIG` and `GEONEXUS_*` variables.
    pub fn load() -> Result<Self, AppStateError> {
        let config = GatewayConfig::load().map_err(AppStateError::ConfigLoad)?;
        tracing::info!(
            environment = ?config.environment,
            dts_url = %config.dts.base_url,
            spatial_db = config.spatial_db.is_some(),
            "gateway configuration loaded"
        );
        Self::from_config(config)
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.gateway.config().environment)
            .field("dts_mock", &self.gateway.dts().backend().uses_mock())
            .field(
                "spatial_db",
                &self
                    .gateway
                    .has_backend(geonexus_lib::BackendKind::SpatialDb),
            )
            .finish()
    }
}

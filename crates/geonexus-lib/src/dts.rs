//! Digital-twin scene (DTS) HTTP backend.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{BackendKind, BackendProfile, FeatureBackend, Fetched};
use crate::config::{DtsConfig, Environment};
use crate::error::{Error, Result};
use crate::metadata::MOCK_SOURCE;
use crate::mock;
use crate::query::QueryDescriptor;
use crate::translate::{translate_dts, DtsRequest};

/// Provider name reported in collection metadata.
pub const DTS_PROVIDER: &str = "GeoNexus Feature Engine DTS Data Service";
/// Source reported for payloads fetched from the live API.
pub const DTS_SOURCE: &str = "GeoNexus DTS API";

/// A translated DTS call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DtsCall {
    Remote(DtsRequest),
    /// Served from [`mock::supply`] without touching the network.
    Mock { scene_id: String },
}

/// Scene API client.
///
/// Without an API key and outside production, every call is answered with
/// deterministic mock data instead.
#[derive(Debug, Clone)]
pub struct DtsBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    use_mock: bool,
    profile: BackendProfile,
}

impl DtsBackend {
    pub fn new(config: &DtsConfig, environment: Environment) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(user_agent())
            .build()
            .map_err(Error::Http)?;

        let use_mock = config.api_key.is_none() && !environment.is_production();
        if use_mock {
            info!("no DTS API key configured; serving mock scene data");
        } else if config.api_key.is_none() {
            warn!("no DTS API key configured in production; requests are sent unauthenticated");
        }

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout(),
            use_mock,
            profile: BackendProfile {
                kind: BackendKind::Dts,
                provider: DTS_PROVIDER.to_string(),
                max_records: config.max_records,
                default_resource: config.default_scene_id.clone(),
                security_level: config.security_level.clone(),
            },
        })
    }

    pub fn uses_mock(&self) -> bool {
        self.use_mock
    }

    async fn fetch(&self, request: DtsRequest) -> Result<Fetched> {
        debug!(url = %request.url, "requesting DTS features");

        let mut builder = self
            .client
            .get(request.url)
            .header(ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(Error::BackendUnavailable {
                backend: BackendKind::Dts.to_string(),
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let payload = serde_json::from_str::<Value>(&body).unwrap_or_else(|e| {
            warn!(error = %e, "DTS response body is not JSON");
            Value::Null
        });

        Ok(Fetched {
            payload,
            source: DTS_SOURCE.to_string(),
        })
    }

    fn transport_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::BackendTimeout {
                backend: BackendKind::Dts.to_string(),
                after: self.timeout,
            }
        } else {
            Error::BackendUnavailable {
                backend: BackendKind::Dts.to_string(),
                status: error.status().map(|s| s.as_u16()),
                message: error.to_string(),
            }
        }
    }
}

impl FeatureBackend for DtsBackend {
    type Request = DtsCall;

    fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    fn translate(&self, query: &QueryDescriptor) -> Result<DtsCall> {
        if self.use_mock {
            return Ok(DtsCall::Mock {
                scene_id: query.resource_id.clone(),
            });
        }
        translate_dts(&self.base_url, self.profile.max_records, query).map(DtsCall::Remote)
    }

    async fn execute(&self, request: DtsCall) -> Result<Fetched> {
        match request {
            DtsCall::Mock { scene_id } => Ok(Fetched {
                payload: mock::supply(&scene_id),
                source: MOCK_SOURCE.to_string(),
            }),
            DtsCall::Remote(request) => self.fetch(request).await,
        }
    }
}

fn user_agent() -> String {
    format!("geonexus-lib/{}", env!("CARGO_PKG_VERSION"))
}

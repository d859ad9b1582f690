//! The feature-query pipeline.
//!
//! [`GatedBackend`] wraps any [`FeatureBackend`] with the access policy and the
//! audit recorder, then runs the normalize and enrich stages over whatever the
//! backend returns:
//!
//! ```text
//! params -> QueryDescriptor -> policy (deny stops here) -> audit
//!        -> translate -> execute -> normalize -> enrich
//! ```
//!
//! [`Gateway`] owns one gated backend per configured backend kind.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::audit::{AuditRecorder, CallerIdentity};
use crate::backend::{BackendKind, BackendProfile, FeatureBackend};
use crate::config::GatewayConfig;
use crate::dts::DtsBackend;
use crate::error::{Error, Result};
use crate::feature::FeatureCollection;
use crate::metadata::{enrich, Enrichment};
use crate::normalize::normalize_payload;
use crate::policy::{AccessDecision, AccessPolicy};
use crate::query::{QueryDescriptor, QueryParams};
use crate::spatial_db::SpatialDbBackend;

/// A backend behind the access gate.
#[derive(Debug)]
pub struct GatedBackend<B> {
    backend: B,
    policy: AccessPolicy,
    audit: AuditRecorder,
}

impl<B: FeatureBackend> GatedBackend<B> {
    pub fn new(backend: B, policy: AccessPolicy, audit: AuditRecorder) -> Self {
        Self {
            backend,
            policy,
            audit,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn profile(&self) -> &BackendProfile {
        self.backend.profile()
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Normalize `params` for this backend without running the query.
    pub fn describe(&self, path_resource: Option<&str>, params: &QueryParams) -> QueryDescriptor {
        QueryDescriptor::from_params(path_resource, params, &self.profile().query_defaults())
    }

    /// Run one query through the whole pipeline.
    ///
    /// A denied resource fails with [`Error::Forbidden`] before anything is
    /// audited, translated or sent to the backend.
    pub async fn query(
        &self,
        path_resource: Option<&str>,
        params: &QueryParams,
        caller: &CallerIdentity,
    ) -> Result<FeatureCollection> {
        let started = Instant::now();
        let kind = self.profile().kind;
        let descriptor = self.describe(path_resource, params);
        let resource = descriptor.resource_id.clone();

        if self.policy.evaluate(&resource) == AccessDecision::Denied {
            warn!(
                backend = %kind,
                resource = %resource,
                caller = caller.id_or_default(),
                "access denied"
            );
            return Err(Error::Forbidden { resource });
        }

        self.audit.record(&resource, params, caller).await;

        let request = self.backend.translate(&descriptor)?;
        let fetched = self.backend.execute(request).await?;
        let collection = normalize_payload(Some(&fetched.payload));

        let profile = self.profile();
        let enriched = enrich(
            collection,
            &Enrichment {
                provider: profile.provider.clone(),
                resource_id: resource.clone(),
                elapsed: started.elapsed(),
                source: fetched.source,
                security_level: profile.security_level.clone(),
            },
        );

        info!(
            backend = %kind,
            resource = %resource,
            count = enriched.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "served feature query"
        );
        Ok(enriched)
    }
}

/// All configured backends of one deployment.
#[derive(Debug)]
pub struct Gateway {
    config: Arc<GatewayConfig>,
    dts: GatedBackend<DtsBackend>,
    spatial_db: Option<GatedBackend<SpatialDbBackend>>,
}

impl Gateway {
    /// Build every backend described by `config`.
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let dts = GatedBackend::new(
            DtsBackend::new(&config.dts, config.environment)?,
            AccessPolicy::new(&config.dts.allowed_scenes),
            AuditRecorder::from_config(&config.dts.audit, config.spatial_db.as_ref())?,
        );

        let spatial_db = match &config.spatial_db {
            Some(spatial) => Some(GatedBackend::new(
                SpatialDbBackend::new(spatial),
                AccessPolicy::new(&spatial.allowed_tables),
                AuditRecorder::from_config(&spatial.audit, Some(spatial))?,
            )),
            None => None,
        };

        debug!(
            environment = ?config.environment,
            spatial_db = spatial_db.is_some(),
            "gateway initialized"
        );
        Ok(Self {
            config,
            dts,
            spatial_db,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn dts(&self) -> &GatedBackend<DtsBackend> {
        &self.dts
    }

    pub fn spatial_db(&self) -> Result<&GatedBackend<SpatialDbBackend>> {
        self.spatial_db
            .as_ref()
            .ok_or_else(|| Error::BackendNotConfigured {
                backend: BackendKind::SpatialDb.to_string(),
            })
    }

    pub fn has_backend(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Dts => true,
            BackendKind::SpatialDb => self.spatial_db.is_some(),
        }
    }

    /// Access policy of the backend named by `kind`.
    pub fn policy(&self, kind: BackendKind) -> Result<&AccessPolicy> {
        match kind {
            BackendKind::Dts => Ok(self.dts.policy()),
            BackendKind::SpatialDb => Ok(self.spatial_db()?.policy()),
        }
    }

    /// Route a query to the backend named by `kind`.
    pub async fn query(
        &self,
        kind: BackendKind,
        path_resource: Option<&str>,
        params: &QueryParams,
        caller: &CallerIdentity,
    ) -> Result<FeatureCollection> {
        match kind {
            BackendKind::Dts => self.dts.query(path_resource, params, caller).await,
            BackendKind::SpatialDb => {
                self.spatial_db()?
                    .query(path_resource, params, caller)
                    .await
            }
        }
    }
}

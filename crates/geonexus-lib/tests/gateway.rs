use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use geonexus_lib::{
    AccessPolicy, AuditRecord, AuditRecorder, AuditSink, BackendKind, BackendProfile,
    CallerIdentity, DtsBackend, DtsConfig, Environment, FeatureBackend, Fetched, GatedBackend,
    Gateway, GatewayConfig, QueryDescriptor, QueryParams, Result,
};
use serde_json::json;

#[derive(Default)]
struct CountingSink {
    records: std::sync::Mutex<Vec<AuditRecord>>,
}

impl AuditSink for CountingSink {
    fn append(&self, record: &AuditRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

struct CountingBackend {
    profile: BackendProfile,
    translated: AtomicUsize,
    executed: AtomicUsize,
}

impl CountingBackend {
    fn new() -> Self {
        Self {
            profile: BackendProfile {
                kind: BackendKind::SpatialDb,
                provider: "counting".to_string(),
                max_records: 10,
                default_resource: String::new(),
                security_level: Some("enterprise".to_string()),
            },
            translated: AtomicUsize::new(0),
            executed: AtomicUsize::new(0),
        }
    }
}

impl FeatureBackend for CountingBackend {
    type Request = QueryDescriptor;

    fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    fn translate(&self, query: &QueryDescriptor) -> Result<QueryDescriptor> {
        self.translated.fetch_add(1, Ordering::SeqCst);
        Ok(query.clone())
    }

    async fn execute(&self, request: QueryDescriptor) -> Result<Fetched> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(Fetched {
            payload: json!({
                "features": [
                    { "id": 1, "geometry": null, "properties": { "limit": request.limit } }
                ],
                "metadata": { "upstream": "counting" }
            }),
            source: "counting".to_string(),
        })
    }
}

fn counting_gate(allow: &[&str]) -> (GatedBackend<CountingBackend>, Arc<CountingSink>) {
    let sink = Arc::new(CountingSink::default());
    let gated = GatedBackend::new(
        CountingBackend::new(),
        AccessPolicy::new(allow),
        AuditRecorder::new(sink.clone(), Duration::from_secs(1)),
    );
    (gated, sink)
}

#[tokio::test]
async fn mock_buildings_end_to_end() {
    let gateway = Gateway::from_config(GatewayConfig::default()).unwrap();
    assert!(gateway.dts().backend().uses_mock());

    let params = QueryParams::new()
        .with("limit", "100")
        .with("resultOffset", "10");
    let collection = gateway
        .query(
            BackendKind::Dts,
            Some("buildings"),
            &params,
            &CallerIdentity::default(),
        )
        .await
        .unwrap();

    assert_eq!(collection.len(), 2);
    assert_eq!(collection.metadata.count, Some(2));
    assert_eq!(collection.metadata.source.as_deref(), Some("mock"));
    assert_eq!(collection.metadata.resource_id.as_deref(), Some("buildings"));
    assert!(collection.metadata.timestamp.is_some());
    assert!(collection
        .metadata
        .query_time
        .as_deref()
        .is_some_and(|t| t.ends_with("ms")));
}

#[tokio::test]
async fn dts_default_scene_is_used_without_path_segment() {
    let gateway = Gateway::from_config(GatewayConfig::default()).unwrap();
    let collection = gateway
        .query(
            BackendKind::Dts,
            None,
            &QueryParams::new(),
            &CallerIdentity::default(),
        )
        .await
        .unwrap();
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.metadata.resource_id.as_deref(), Some("default"));
}

#[tokio::test]
async fn denied_resource_is_not_audited_or_fetched() {
    let (gated, sink) = counting_gate(&["public.buildings", "pois"]);

    let err = gated
        .query(
            Some("public.secret_table"),
            &QueryParams::new(),
            &CallerIdentity::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.reason_code(), "forbidden");
    assert_eq!(err.resource(), Some("public.secret_table"));
    assert!(sink.records.lock().unwrap().is_empty());
    assert_eq!(gated.backend().translated.load(Ordering::SeqCst), 0);
    assert_eq!(gated.backend().executed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn allowed_resource_is_audited_then_fetched() {
    let (gated, sink) = counting_gate(&["public.buildings", "pois"]);
    let caller = CallerIdentity::new(Some("u-1".to_string()), "10.1.2.3".parse().ok());

    let collection = gated
        .query(
            Some("archive.pois"),
            &QueryParams::new().with("limit", "500"),
            &caller,
        )
        .await
        .unwrap();

    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].resource_id, "archive.pois");
    assert_eq!(records[0].caller_id, "u-1");
    assert_eq!(records[0].caller_address, "10.1.2.3");
    assert_eq!(gated.backend().executed.load(Ordering::SeqCst), 1);

    assert_eq!(collection.features[0].properties["limit"], json!(10));
    assert_eq!(collection.features[0].geometry.kind, "Point");
    assert_eq!(collection.metadata.provider.as_deref(), Some("counting"));
    assert_eq!(collection.metadata.extra["upstream"], json!("counting"));
}

#[tokio::test]
async fn unrestricted_policy_allows_everything() {
    let (gated, sink) = counting_gate(&[]);
    assert!(gated.policy().is_unrestricted());

    gated
        .query(
            Some("anything.at_all"),
            &QueryParams::new(),
            &CallerIdentity::default(),
        )
        .await
        .unwrap();
    assert_eq!(sink.records.lock().unwrap()[0].caller_id, "anonymous");
}

#[tokio::test]
async fn production_without_key_never_serves_mock_data() {
    let config = DtsConfig {
        base_url: "http://127.0.0.1:9/dts".to_string(),
        timeout_ms: 500,
        ..DtsConfig::default()
    };
    let backend = DtsBackend::new(&config, Environment::Production).unwrap();
    assert!(!backend.uses_mock());

    let gated = GatedBackend::new(backend, AccessPolicy::unrestricted(), AuditRecorder::disabled());
    let err = gated
        .query(Some("buildings"), &QueryParams::new(), &CallerIdentity::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err.reason_code(),
        "backend_unavailable" | "backend_timeout"
    ));
}

#[tokio::test]
async fn spatial_backend_missing_from_config() {
    let gateway = Gateway::from_config(GatewayConfig::default()).unwrap();
    let err = gateway
        .query(
            BackendKind::SpatialDb,
            Some("buildings"),
            &QueryParams::new(),
            &CallerIdentity::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), "backend_not_configured");
}

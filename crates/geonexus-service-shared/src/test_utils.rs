//! Test utilities for microservice handler testing.
//!
//! [`TestGateway`] owns a temporary spatial database and audit log, and an
//! [`AppState`] wired to them. DTS queries are served from mock data.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use geonexus_lib::spatial_db::{create_feature_table, insert_feature};
use geonexus_lib::{
    AuditConfig, AuditDestination, AuditRecord, DtsConfig, Environment, GatewayConfig,
    SpatialDbConfig, TableRef,
};
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;

use crate::state::AppState;

/// Resources the fixture gateway allows.
pub mod fixture_resources {
    pub const BUILDINGS_SCENE: &str = "buildings";
    pub const POIS_SCENE: &str = "pois";
    pub const BUILDINGS_TABLE: &str = "public.buildings";
    /// Present in the database but not on the allow-list.
    pub const SECRET_TABLE: &str = "public.secret_table";
}

/// A gateway backed by temporary files.
pub struct TestGateway {
    dir: TempDir,
    state: AppState,
}

impl TestGateway {
    /// Panics if the fixture cannot be created.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create fixture dir");
        let database_path = dir.path().join("features.db");
        seed_database(&database_path);

        let audit = AuditConfig {
            enabled: true,
            destination: AuditDestination::JsonLines {
                path: dir.path().join("audit.jsonl"),
            },
            timeout_ms: Some(1_000),
        };

        let config = GatewayConfig {
            environment: Environment::Development,
            log_level: "debug".to_string(),
            dts: DtsConfig {
                allowed_scenes: vec![
                    fixture_resources::BUILDINGS_SCENE.to_string(),
                    fixture_resources::POIS_SCENE.to_string(),
                    "default".to_string(),
                ],
                audit: audit.clone(),
                ..DtsConfig::default()
            },
            spatial_db: Some(SpatialDbConfig {
                database_path,
                allowed_tables: vec![fixture_resources::BUILDINGS_TABLE.to_string()],
                max_records: 100,
                audit,
                ..SpatialDbConfig::default()
            }),
        };

        let state = AppState::from_config(config)
            .unwrap_or_else(|e| panic!("failed to build test gateway: {}", e));
        Self { dir, state }
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.dir.path().join("audit.jsonl")
    }

    /// Audit records written so far, oldest first.
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        let contents = std::fs::read_to_string(self.audit_log_path()).unwrap_or_default();
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).expect("audit line is valid JSON"))
            .collect()
    }
}

impl Default for TestGateway {
    fn default() -> Self {
        Self::new()
    }
}

static TEST_GATEWAY: OnceLock<TestGateway> = OnceLock::new();

/// Shared fixture state for tests that do not inspect the audit log.
pub fn test_state() -> AppState {
    TEST_GATEWAY.get_or_init(TestGateway::new).state()
}

/// Generate a unique request ID for testing.
pub fn test_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test-{}", timestamp)
}

fn seed_database(path: &Path) {
    let conn = Connection::open(path).expect("open fixture db");

    let buildings = TableRef::parse(fixture_resources::BUILDINGS_TABLE).unwrap();
    create_feature_table(&conn, &buildings, "public").expect("create buildings");
    let rows = [
        (json!(1), [116.40, 39.90], json!({ "name": "Headquarters", "height": 120, "status": "active" })),
        (json!(2), [116.42, 39.92], json!({ "name": "R&D Center", "height": 80, "status": "inactive" })),
        (json!(3), [116.60, 40.10], json!({ "name": "Depot", "height": 15, "status": "active" })),
    ];
    for (id, [x, y], properties) in rows {
        let geometry = json!({ "type": "Point", "coordinates": [x, y] });
        insert_feature(&conn, &buildings, "public", &id, &geometry, &properties)
            .expect("insert building");
    }

    let secret = TableRef::parse(fixture_resources::SECRET_TABLE).unwrap();
    create_feature_table(&conn, &secret, "public").expect("create secret table");
    insert_feature(
        &conn,
        &secret,
        "public",
        &json!(1),
        &json!({ "type": "Point", "coordinates": [0.0, 0.0] }),
        &json!({ "classified": true }),
    )
    .expect("insert secret");
}

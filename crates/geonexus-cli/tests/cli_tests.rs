//! Integration tests for the `query` and `check-access` commands.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use geonexus_lib::spatial_db::{create_feature_table, insert_feature};
use geonexus_lib::TableRef;
use predicates::prelude::*;
use rusqlite::Connection;
use serde_json::{json, Value};
use tempfile::TempDir;

/// A temporary database plus a configuration file pointing at it.
struct TestEnv {
    _temp_dir: TempDir,
    config_path: PathBuf,
    audit_path: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let db_path = temp_dir.path().join("features.db");
        let audit_path = temp_dir.path().join("audit.jsonl");
        let config_path = temp_dir.path().join("geonexus.json");

        let conn = Connection::open(&db_path).expect("open db");
        let table = TableRef::parse("public.parcels").unwrap();
        create_feature_table(&conn, &table, "public").expect("create table");
        for (id, x, owner) in [(1, 10.0, "city"), (2, 20.0, "county"), (3, 30.0, "city")] {
            insert_feature(
                &conn,
                &table,
                "public",
                &json!(id),
                &json!({ "type": "Point", "coordinates": [x, x] }),
                &json!({ "owner": owner, "area": x * 100.0 }),
            )
            .expect("insert parcel");
        }
        drop(conn);

        let config = json!({
            "environment": "development",
            "dts": { "allowed_scenes": ["buildings"] },
            "spatial_db": {
                "database_path": db_path,
                "allowed_tables": ["parcels"],
                "audit": {
                    "enabled": true,
                    "destination": { "kind": "json_lines", "path": audit_path }
                }
            }
        });
        fs::write(&config_path, config.to_string()).expect("write config");

        Self {
            _temp_dir: temp_dir,
            config_path,
            audit_path,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("geonexus-cli").expect("binary exists");
        cmd.env_remove("GEONEXUS_CONFIG")
            .env_remove("GEONEXUS_DTS_API_KEY")
            .env_remove("GEONEXUS_ENV")
            .arg("--config")
            .arg(&self.config_path);
        cmd
    }
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn query_table_prints_geojson() {
    let env = TestEnv::new();
    let output = env
        .cmd()
        .args([
            "query",
            "--backend",
            "postgis",
            "--resource",
            "public.parcels",
            "--where",
            "owner = 'city'",
            "--out-fields",
            "owner",
        ])
        .output()
        .expect("run cli");
    assert!(output.status.success());

    let body = stdout_json(&output);
    assert_eq!(body["type"], "FeatureCollection");
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[1]["id"], 3);
    assert!(features[0]["properties"].get("area").is_none());
    assert_eq!(body["metadata"]["resourceId"], "public.parcels");

    let audit = fs::read_to_string(&env.audit_path).expect("audit log written");
    assert_eq!(audit.lines().count(), 1);
    assert!(audit.contains("public.parcels"));
}

#[test]
fn query_mock_scene_without_credentials() {
    let env = TestEnv::new();
    let output = env
        .cmd()
        .args(["query", "--backend", "dts", "--resource", "buildings", "--limit", "1"])
        .output()
        .expect("run cli");
    assert!(output.status.success());

    let body = stdout_json(&output);
    assert_eq!(body["metadata"]["source"], "mock");
    assert_eq!(body["features"].as_array().unwrap().len(), 2);
}

#[test]
fn denied_query_fails_without_output() {
    let env = TestEnv::new();
    env.cmd()
        .args(["query", "--backend", "dts", "--resource", "restricted"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("not permitted"));
}

#[test]
fn check_access_reports_decisions() {
    let env = TestEnv::new();
    env.cmd()
        .args(["check-access", "--backend", "postgis", "archive.parcels"])
        .assert()
        .success()
        .stdout(predicate::str::contains("allowed"));

    env.cmd()
        .args(["check-access", "--backend", "postgis", "public.secret_table"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("denied"));
}

#[test]
fn unknown_backend_is_rejected() {
    let env = TestEnv::new();
    env.cmd()
        .args(["check-access", "--backend", "oracle", "parcels"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown backend"));
}

#[test]
fn missing_config_file_is_reported() {
    Command::cargo_bin("geonexus-cli")
        .expect("binary exists")
        .args(["--config", "/nonexistent/geonexus.json", "check-access", "--backend", "dts", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read configuration"));
}

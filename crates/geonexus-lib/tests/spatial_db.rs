mod common;

use std::time::Duration;

use common::SpatialFixture;
use geonexus_lib::{
    AccessPolicy, AuditRecorder, CallerIdentity, FeatureBackend, FeatureId, GatedBackend,
    QueryDescriptor, QueryParams, SpatialDbBackend, SpatialDbConfig, SqliteAuditSink, TableRef,
};
use geonexus_lib::spatial_db::create_feature_table;
use rusqlite::Connection;
use std::sync::Arc;

fn descriptor(backend: &SpatialDbBackend, table: &str, params: &QueryParams) -> QueryDescriptor {
    QueryDescriptor::from_params(Some(table), params, &backend.profile().query_defaults())
}

async fn fetch(backend: &SpatialDbBackend, table: &str, params: QueryParams) -> serde_json::Value {
    let request = backend
        .translate(&descriptor(backend, table, &params))
        .expect("translate");
    backend.execute(request).await.expect("execute").payload
}

fn ids(payload: &serde_json::Value) -> Vec<serde_json::Value> {
    payload["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].clone())
        .collect()
}

#[tokio::test]
async fn reads_every_row_in_insertion_order() {
    let fixture = SpatialFixture::new();
    let backend = SpatialDbBackend::new(&fixture.config);

    let payload = fetch(&backend, "public.buildings", QueryParams::new()).await;
    assert_eq!(
        ids(&payload),
        vec![
            serde_json::json!(1),
            serde_json::json!(2),
            serde_json::json!(3),
            serde_json::json!("b-4"),
            serde_json::json!(5)
        ]
    );
}

#[tokio::test]
async fn bbox_filter_and_pagination_apply() {
    let fixture = SpatialFixture::new();
    let backend = SpatialDbBackend::new(&fixture.config);

    let inside = fetch(
        &backend,
        "buildings",
        QueryParams::new().with("bbox", "116.3,39.8,116.5,40.0"),
    )
    .await;
    assert_eq!(ids(&inside), vec![serde_json::json!(1), serde_json::json!(2)]);

    let active = fetch(
        &backend,
        "buildings",
        QueryParams::new()
            .with("where", "status = 'active' AND height > 10")
            .with("outFields", "name"),
    )
    .await;
    assert_eq!(ids(&active), vec![serde_json::json!(1), serde_json::json!(3)]);
    assert_eq!(
        active["features"][1]["properties"],
        serde_json::json!({ "name": "O'Neill Depot" })
    );

    let quoted = fetch(
        &backend,
        "buildings",
        QueryParams::new().with("where", "name = 'O''Neill Depot'"),
    )
    .await;
    assert_eq!(ids(&quoted), vec![serde_json::json!(3)]);

    let paged = fetch(
        &backend,
        "buildings",
        QueryParams::new().with("limit", "2").with("resultOffset", "1"),
    )
    .await;
    assert_eq!(ids(&paged), vec![serde_json::json!(2), serde_json::json!(3)]);

    let closed = fetch(
        &backend,
        "buildings",
        QueryParams::new().with("where", "open = FALSE"),
    )
    .await;
    assert_eq!(ids(&closed), vec![serde_json::json!(2)]);

    let missing = fetch(
        &backend,
        "buildings",
        QueryParams::new().with("where", "open = NULL"),
    )
    .await;
    assert_eq!(ids(&missing), vec![serde_json::json!("b-4"), serde_json::json!(5)]);
}

#[tokio::test]
async fn attached_schemas_are_queryable() {
    let fixture = SpatialFixture::new();
    let backend = SpatialDbBackend::new(&fixture.config);

    let payload = fetch(&backend, "archive.roads", QueryParams::new()).await;
    assert_eq!(ids(&payload), vec![serde_json::json!("r-1")]);
}

#[tokio::test]
async fn unknown_table_is_backend_unavailable() {
    let fixture = SpatialFixture::new();
    let backend = SpatialDbBackend::new(&fixture.config);

    let request = backend
        .translate(&descriptor(&backend, "public.nope", &QueryParams::new()))
        .unwrap();
    let err = backend.execute(request).await.unwrap_err();
    assert_eq!(err.reason_code(), "backend_unavailable");
}

#[tokio::test]
async fn gated_query_normalizes_enriches_and_audits() {
    let fixture = SpatialFixture::new();
    let mut config = fixture.config.clone();
    config.allowed_tables = vec!["buildings".to_string()];

    let audit_db = fixture.path("audit.db");
    let sink = SqliteAuditSink::with_connection(
        Connection::open(&audit_db).unwrap(),
        "public.data_access_logs",
        "public",
    )
    .unwrap();
    let gated = GatedBackend::new(
        SpatialDbBackend::new(&config),
        AccessPolicy::new(&config.allowed_tables),
        AuditRecorder::new(Arc::new(sink), Duration::from_secs(5)),
    );

    let caller = CallerIdentity::new(Some("analyst".to_string()), "192.168.1.20".parse().ok());
    let collection = gated
        .query(
            Some("public.buildings"),
            &QueryParams::new().with("where", "status = 'broken'"),
            &caller,
        )
        .await
        .unwrap();

    assert_eq!(collection.len(), 1);
    let broken = &collection.features[0];
    assert_eq!(broken.id, Some(FeatureId::from(5_i64)));
    assert_eq!(broken.geometry.kind, "Point");
    assert_eq!(broken.geometry.coordinates, serde_json::json!([0, 0]));
    assert_eq!(collection.metadata.count, Some(1));
    assert_eq!(collection.metadata.security_level.as_deref(), Some("enterprise"));
    assert_eq!(collection.metadata.resource_id.as_deref(), Some("public.buildings"));

    let conn = Connection::open(&audit_db).unwrap();
    let (table, user, ip, params): (String, String, String, String) = conn
        .query_row(
            "SELECT table_name, user_id, user_ip, query_params FROM data_access_logs",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .unwrap();
    assert_eq!(table, "public.buildings");
    assert_eq!(user, "analyst");
    assert_eq!(ip, "192.168.1.20");
    assert!(params.contains("status = 'broken'"));

    let err = gated
        .query(Some("public.secret_table"), &QueryParams::new(), &caller)
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), "forbidden");
    let audited: i64 = conn
        .query_row("SELECT COUNT(*) FROM data_access_logs", [], |row| row.get(0))
        .unwrap();
    assert_eq!(audited, 1);
}

#[tokio::test]
async fn injection_attempts_never_reach_the_database() {
    let fixture = SpatialFixture::new();
    let backend = SpatialDbBackend::new(&fixture.config);

    let err = backend
        .translate(&descriptor(
            &backend,
            "buildings; DROP TABLE buildings",
            &QueryParams::new(),
        ))
        .unwrap_err();
    assert_eq!(err.reason_code(), "invalid_identifier");

    let err = backend
        .translate(&descriptor(
            &backend,
            "buildings",
            &QueryParams::new().with("where", "1=1; DELETE FROM buildings"),
        ))
        .unwrap_err();
    assert_eq!(err.reason_code(), "invalid_filter");

    let payload = fetch(&backend, "buildings", QueryParams::new()).await;
    assert_eq!(ids(&payload).len(), 5);
}

#[tokio::test]
async fn slow_query_times_out_as_distinct_failure() {
    let fixture = SpatialFixture::new();
    let db_path = fixture.path("large.db");
    let conn = Connection::open(&db_path).unwrap();
    let table = TableRef::parse("public.parcels").unwrap();
    create_feature_table(&conn, &table, "public").unwrap();
    conn.execute_batch(
        "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 400000)
         INSERT INTO parcels (id, geometry, properties, min_x, min_y, max_x, max_y)
         SELECT i, '{\"type\":\"Point\",\"coordinates\":[0,0]}',
                json_object('area', i), 0, 0, 0, 0
         FROM n",
    )
    .unwrap();
    drop(conn);

    let config = SpatialDbConfig {
        database_path: db_path,
        timeout_ms: 5,
        ..SpatialDbConfig::default()
    };
    let backend = SpatialDbBackend::new(&config);
    let request = backend
        .translate(&descriptor(
            &backend,
            "parcels",
            &QueryParams::new().with("where", "area > 10000000"),
        ))
        .unwrap();

    let err = backend.execute(request).await.unwrap_err();
    assert_eq!(err.reason_code(), "backend_timeout");
}

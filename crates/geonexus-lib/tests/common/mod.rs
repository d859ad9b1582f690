#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use geonexus_lib::spatial_db::{create_feature_table, insert_feature};
use geonexus_lib::{SpatialDbConfig, TableRef};
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;

/// A temporary spatial database with a `public` and an attached `archive` schema.
pub struct SpatialFixture {
    pub dir: TempDir,
    pub config: SpatialDbConfig,
}

impl SpatialFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let main_path = dir.path().join("features.db");
        let archive_path = dir.path().join("archive.db");

        seed_public(&main_path);
        seed_archive(&archive_path);

        let mut attached = BTreeMap::new();
        attached.insert("archive".to_string(), archive_path);

        let config = SpatialDbConfig {
            database_path: main_path,
            attached_schemas: attached,
            ..SpatialDbConfig::default()
        };
        Self { dir, config }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn seed_public(path: &Path) {
    let conn = Connection::open(path).expect("open main db");
    let buildings = TableRef::parse("public.buildings").unwrap();
    create_feature_table(&conn, &buildings, "public").expect("create buildings");

    let rows = [
        (json!(1), [116.40, 39.90], json!({ "name": "Headquarters", "height": 120, "status": "active", "open": true })),
        (json!(2), [116.42, 39.92], json!({ "name": "R&D Center", "height": 80, "status": "inactive", "open": false })),
        (json!(3), [116.60, 40.10], json!({ "name": "O'Neill Depot", "height": 15, "status": "active", "open": true })),
        (json!("b-4"), [117.00, 40.50], json!({ "name": "Warehouse", "height": 9, "status": "active" })),
    ];
    for (id, [x, y], properties) in rows {
        let geometry = json!({
            "type": "Polygon",
            "coordinates": [[[x, y], [x + 0.01, y], [x + 0.01, y + 0.01], [x, y + 0.01], [x, y]]]
        });
        insert_feature(&conn, &buildings, "public", &id, &geometry, &properties)
            .expect("insert building");
    }

    let secret = TableRef::parse("secret_table").unwrap();
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

    conn.execute(
        "INSERT INTO buildings (id, geometry, properties, min_x, min_y, max_x, max_y) \
         VALUES (5, 'not geojson', '{\"name\":\"Broken\",\"status\":\"broken\"}', 0, 0, 0, 0)",
        [],
    )
    .expect("insert broken row");
}

fn seed_archive(path: &Path) {
    let conn = Connection::open(path).expect("open archive db");
    let table = TableRef::parse("roads").unwrap();
    create_feature_table(&conn, &table, "public").expect("create roads");
    insert_feature(
        &conn,
        &table,
        "public",
        &json!("r-1"),
        &json!({ "type": "LineString", "coordinates": [[116.0, 39.0], [116.5, 39.5]] }),
        &json!({ "name": "Ring Road" }),
    )
    .expect("insert road");
}

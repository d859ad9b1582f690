//! Enterprise spatial database backend.
//!
//! Feature tables live in SQLite database files. The configured default schema
//! (`public`) is the main database file; every other schema is a separate file
//! attached under its own name when a connection is opened.
//!
//! A feature table has the columns
//!
//! | column       | type    | contents                          |
//! |--------------|---------|-----------------------------------|
//! | `id`         | any     | feature identifier                |
//! | `geometry`   | TEXT    | GeoJSON geometry object           |
//! | `properties` | TEXT    | JSON object of attributes         |
//! | `min_x` ...  | REAL    | envelope of the geometry          |

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, InterruptHandle, OpenFlags};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::backend::{BackendKind, BackendProfile, FeatureBackend, Fetched};
use crate::config::SpatialDbConfig;
use crate::error::{Error, Result};
use crate::query::{FieldSelection, QueryDescriptor};
use crate::translate::{translate_sql, SqlRequest, TableRef};

/// Provider name reported in collection metadata.
pub const SPATIAL_DB_PROVIDER: &str = "GeoNexus Feature Engine PostGIS Data Service";
/// Source reported for payloads read from the database.
pub const SPATIAL_DB_SOURCE: &str = "GeoNexus spatial database";

/// Read-only access to feature tables.
#[derive(Debug, Clone)]
pub struct SpatialDbBackend {
    database_path: PathBuf,
    default_schema: String,
    attached_schemas: BTreeMap<String, PathBuf>,
    timeout: Duration,
    profile: BackendProfile,
}

impl SpatialDbBackend {
    pub fn new(config: &SpatialDbConfig) -> Self {
        Self {
            database_path: config.database_path.clone(),
            default_schema: config.default_schema.clone(),
            attached_schemas: config.attached_schemas.clone(),
            timeout: config.timeout(),
            profile: BackendProfile {
                kind: BackendKind::SpatialDb,
                provider: SPATIAL_DB_PROVIDER.to_string(),
                max_records: config.max_records,
                default_resource: String::new(),
                security_level: config.security_level.clone(),
            },
        }
    }

    fn unavailable(message: impl Into<String>) -> Error {
        Error::BackendUnavailable {
            backend: BackendKind::SpatialDb.to_string(),
            status: None,
            message: message.into(),
        }
    }
}

impl FeatureBackend for SpatialDbBackend {
    type Request = SqlRequest;

    fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    fn translate(&self, query: &QueryDescriptor) -> Result<SqlRequest> {
        translate_sql(&self.default_schema, self.profile.max_records, query)
    }

    async fn execute(&self, request: SqlRequest) -> Result<Fetched> {
        let interrupt = Arc::new(Mutex::new(InterruptSlot::default()));
        let slot = Arc::clone(&interrupt);
        let database_path = self.database_path.clone();
        let attached = self.attached_schemas.clone();
        let table = request.table.to_string();
        let started = std::time::Instant::now();

        let task = tokio::task::spawn_blocking(move || -> Result<Value> {
            let conn = open_connection(&database_path, &attached)?;
            if let Ok(mut guard) = slot.lock() {
                if !guard.arm(conn.get_interrupt_handle()) {
                    return Err(Self::unavailable("query cancelled before it started"));
                }
            }
            run_query(&conn, &request)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(payload))) => {
                debug!(
                    table = %table,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "spatial database query finished"
                );
                Ok(Fetched {
                    payload,
                    source: SPATIAL_DB_SOURCE.to_string(),
                })
            }
            Ok(Ok(Err(Error::Sqlite(e)))) => Err(Self::unavailable(e.to_string())),
            Ok(Ok(Err(other))) => Err(other),
            Ok(Err(join)) => Err(Self::unavailable(format!("query task failed: {}", join))),
            Err(_) => {
                if let Ok(mut guard) = interrupt.lock() {
                    guard.cancel();
                }
                warn!(
                    table = %table,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "spatial database query timed out"
                );
                Err(Error::BackendTimeout {
                    backend: BackendKind::SpatialDb.to_string(),
                    after: self.timeout,
                })
            }
        }
    }
}

/// Shared between a query task and its deadline.
///
/// The deadline sets `cancelled`; a task that has not yet stored its handle
/// checks the flag and stops before running the query.
#[derive(Default)]
struct InterruptSlot {
    handle: Option<InterruptHandle>,
    cancelled: bool,
}

impl InterruptSlot {
    /// Store `handle`, returning `false` if the deadline already passed.
    fn arm(&mut self, handle: InterruptHandle) -> bool {
        if self.cancelled {
            return false;
        }
        self.handle = Some(handle);
        true
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        if let Some(handle) = self.handle.as_ref() {
            handle.interrupt();
        }
    }
}

/// Open a read-only connection with every configured schema attached.
pub fn open_connection(
    database_path: &Path,
    attached_schemas: &BTreeMap<String, PathBuf>,
) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        database_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    attach_schemas(&conn, attached_schemas)?;
    Ok(conn)
}

/// Attach each schema's database file to `conn` under the schema name.
pub fn attach_schemas(
    conn: &Connection,
    attached_schemas: &BTreeMap<String, PathBuf>,
) -> Result<()> {
    for (schema, path) in attached_schemas {
        TableRef::validate_segment(schema).map_err(|reason| {
            Error::config(format!("invalid schema name '{}': {}", schema, reason))
        })?;
        conn.execute(
            &format!("ATTACH DATABASE ?1 AS \"{}\"", schema),
            params![path.to_string_lossy().into_owned()],
        )?;
    }
    Ok(())
}

fn run_query(conn: &Connection, request: &SqlRequest) -> Result<Value> {
    let mut stmt = conn.prepare(&request.sql)?;
    let rows = stmt.query_map(params_from_iter(request.params.iter()), |row| {
        Ok((
            row.get::<_, SqlValue>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<String>>(2)?,
        ))
    })?;

    let mut features = Vec::new();
    for row in rows {
        let (id, geometry, properties) = row?;
        features.push(row_to_feature(id, geometry, properties, &request.fields));
    }

    Ok(json!({ "features": features }))
}

fn row_to_feature(
    id: SqlValue,
    geometry: Option<String>,
    properties: Option<String>,
    fields: &FieldSelection,
) -> Value {
    let geometry = geometry
        .and_then(|text| match serde_json::from_str::<Value>(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "stored geometry is not valid JSON");
                None
            }
        })
        .unwrap_or(Value::Null);

    let properties: Map<String, Value> = properties
        .and_then(|text| match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) | Err(_) => {
                warn!("stored properties are not a JSON object");
                None
            }
        })
        .unwrap_or_default()
        .into_iter()
        .filter(|(key, _)| fields.includes(key))
        .collect();

    let mut feature = Map::new();
    match id {
        SqlValue::Integer(i) => {
            feature.insert("id".to_string(), Value::from(i));
        }
        SqlValue::Real(r) => {
            feature.insert("id".to_string(), Value::from(r));
        }
        SqlValue::Text(text) => {
            feature.insert("id".to_string(), Value::String(text));
        }
        SqlValue::Null | SqlValue::Blob(_) => {}
    }
    feature.insert("geometry".to_string(), geometry);
    feature.insert("properties".to_string(), Value::Object(properties));
    Value::Object(feature)
}

/// Create a feature table (if missing) in a writable connection.
pub fn create_feature_table(
    conn: &Connection,
    table: &TableRef,
    default_schema: &str,
) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id,
            geometry TEXT NOT NULL,
            properties TEXT NOT NULL DEFAULT '{{}}',
            min_x REAL NOT NULL,
            min_y REAL NOT NULL,
            max_x REAL NOT NULL,
            max_y REAL NOT NULL
        )",
        table.to_sql(default_schema)
    ))?;
    Ok(())
}

/// Insert one feature, deriving its envelope from the geometry coordinates.
pub fn insert_feature(
    conn: &Connection,
    table: &TableRef,
    default_schema: &str,
    id: &Value,
    geometry: &Value,
    properties: &Value,
) -> Result<()> {
    let (min_x, min_y, max_x, max_y) = envelope(&geometry["coordinates"]).ok_or_else(|| {
        Error::config(format!("geometry for feature {} has no coordinates", id))
    })?;

    let id = match id {
        Value::Number(n) if n.is_i64() => SqlValue::Integer(n.as_i64().unwrap_or_default()),
        Value::Number(n) => SqlValue::Real(n.as_f64().unwrap_or_default()),
        Value::String(s) => SqlValue::Text(s.clone()),
        _ => SqlValue::Null,
    };

    conn.execute(
        &format!(
            "INSERT INTO {} (id, geometry, properties, min_x, min_y, max_x, max_y)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            table.to_sql(default_schema)
        ),
        params![
            id,
            geometry.to_string(),
            properties.to_string(),
            min_x,
            min_y,
            max_x,
            max_y
        ],
    )?;
    Ok(())
}

/// Bounding envelope of a (possibly nested) GeoJSON coordinate array.
fn envelope(coordinates: &Value) -> Option<(f64, f64, f64, f64)> {
    let items = coordinates.as_array()?;
    if let (Some(x), Some(y)) = (
        items.first().and_then(Value::as_f64),
        items.get(1).and_then(Value::as_f64),
    ) {
        return Some((x, y, x, y));
    }
    items
        .iter()
        .filter_map(envelope)
        .reduce(|a, b| (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3)))
}

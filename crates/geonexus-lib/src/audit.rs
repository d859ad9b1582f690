//! Best-effort access auditing.
//!
//! Every allowed query on an audited backend produces one [`AuditRecord`],
//! written through an [`AuditSink`] before the backend is called. Audit
//! failures are logged and never reach the caller.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::{AuditConfig, AuditDestination, SpatialDbConfig};
use crate::error::{Error, Result};
use crate::query::QueryParams;
use crate::spatial_db::attach_schemas;
use crate::translate::TableRef;

/// Recorded when the caller supplied no identity.
pub const ANONYMOUS_CALLER: &str = "anonymous";

/// Who issued a request, as far as the transport knows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    pub id: Option<String>,
    pub address: Option<IpAddr>,
}

impl CallerIdentity {
    pub fn new(id: Option<String>, address: Option<IpAddr>) -> Self {
        Self {
            id: id.filter(|id| !id.trim().is_empty()),
            address,
        }
    }

    pub fn id_or_default(&self) -> &str {
        self.id.as_deref().unwrap_or(ANONYMOUS_CALLER)
    }

    pub fn address_or_default(&self) -> IpAddr {
        self.address.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

/// One audit entry. Records are only ever appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub resource_id: String,
    /// Raw request parameters, serialized as JSON.
    pub query_params: String,
    pub caller_id: String,
    pub caller_address: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(resource_id: &str, params: &QueryParams, caller: &CallerIdentity) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            query_params: params.to_json(),
            caller_id: caller.id_or_default().to_string(),
            caller_address: caller.address_or_default().to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: &AuditRecord) -> Result<()>;
}

/// Writes audit records into a table of the spatial database.
pub struct SqliteAuditSink {
    conn: Mutex<Connection>,
    insert_sql: String,
}

impl SqliteAuditSink {
    /// Open `table` in the database described by `spatial`, creating the table if needed.
    pub fn open(spatial: &SpatialDbConfig, table: &str) -> Result<Self> {
        let conn = Connection::open(&spatial.database_path)?;
        attach_schemas(&conn, &spatial.attached_schemas)?;
        Self::with_connection(conn, table, &spatial.default_schema)
    }

    /// Use an already-open connection.
    pub fn with_connection(conn: Connection, table: &str, default_schema: &str) -> Result<Self> {
        let table = TableRef::parse(table)?;
        let target = table.to_sql(default_schema);
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                table_name TEXT NOT NULL,
                query_params TEXT NOT NULL,
                user_id TEXT NOT NULL,
                user_ip TEXT NOT NULL,
                access_time TEXT NOT NULL
            )",
            target
        ))?;
        debug!(table = %table, "audit table ready");

        Ok(Self {
            conn: Mutex::new(conn),
            insert_sql: format!(
                "INSERT INTO {} (table_name, query_params, user_id, user_ip, access_time) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                target
            ),
        })
    }
}

impl AuditSink for SqliteAuditSink {
    fn append(&self, record: &AuditRecord) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::config("audit connection lock poisoned"))?;
        conn.execute(
            &self.insert_sql,
            params![
                record.resource_id,
                record.query_params,
                record.caller_id,
                record.caller_address,
                record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            ],
        )?;
        Ok(())
    }
}

/// Appends audit records as JSON lines to a file.
pub struct JsonLinesAuditSink {
    file: Mutex<File>,
}

impl JsonLinesAuditSink {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for JsonLinesAuditSink {
    fn append(&self, record: &AuditRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = self
            .file
            .lock()
            .map_err(|_| Error::config("audit file lock poisoned"))?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

/// Records access events for one backend.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Option<Arc<dyn AuditSink>>,
    timeout: Duration,
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("enabled", &self.is_enabled())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AuditRecorder {
    pub fn disabled() -> Self {
        Self {
            sink: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn new(sink: Arc<dyn AuditSink>, timeout: Duration) -> Self {
        Self {
            sink: Some(sink),
            timeout,
        }
    }

    /// Build the recorder described by `audit`. Table destinations live in `spatial`.
    pub fn from_config(audit: &AuditConfig, spatial: Option<&SpatialDbConfig>) -> Result<Self> {
        if !audit.enabled {
            return Ok(Self::disabled());
        }
        let sink: Arc<dyn AuditSink> = match &audit.destination {
            AuditDestination::Table { name } => {
                let spatial = spatial.ok_or_else(|| {
                    Error::config(format!(
                        "audit table '{}' requires a spatial_db section",
                        name
                    ))
                })?;
                Arc::new(SqliteAuditSink::open(spatial, name)?)
            }
            AuditDestination::JsonLines { path } => Arc::new(JsonLinesAuditSink::open(path)?),
        };
        Ok(Self::new(sink, audit.timeout()))
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Append one record. Never fails; problems are logged.
    pub async fn record(&self, resource_id: &str, params: &QueryParams, caller: &CallerIdentity) {
        let Some(sink) = self.sink.clone() else {
            return;
        };

        let record = AuditRecord::new(resource_id, params, caller);
        let task = tokio::task::spawn_blocking(move || sink.append(&record));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(()))) => debug!(resource = resource_id, "audit record written"),
            Ok(Ok(Err(e))) => {
                error!(resource = resource_id, error = %e, "failed to write audit record")
            }
            Ok(Err(e)) => error!(resource = resource_id, error = %e, "audit task failed"),
            Err(_) => error!(
                resource = resource_id,
                timeout_ms = self.timeout.as_millis() as u64,
                "audit write timed out"
            ),
        }
    }
}

//! Gateway configuration.
//!
//! A single immutable [`GatewayConfig`] is assembled at startup (from a JSON
//! file, environment variables, or both) and passed by reference to every
//! component. Nothing in the request path reads configuration globally.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::translate::TableRef;

/// Environment variable naming a JSON configuration file.
pub const CONFIG_FILE_ENV: &str = "GEONEXUS_CONFIG";

const ENVIRONMENT_ENV: &str = "GEONEXUS_ENV";
const LOG_LEVEL_ENV: &str = "GEONEXUS_LOG_LEVEL";
const DTS_API_URL_ENV: &str = "GEONEXUS_DTS_API_URL";
const DTS_API_KEY_ENV: &str = "GEONEXUS_DTS_API_KEY";
const DTS_DEFAULT_SCENE_ENV: &str = "GEONEXUS_DTS_DEFAULT_SCENE_ID";
const DTS_TIMEOUT_ENV: &str = "GEONEXUS_DTS_TIMEOUT_MS";
const DTS_MAX_RECORDS_ENV: &str = "GEONEXUS_DTS_MAX_RECORDS";
const DTS_ALLOWED_SCENES_ENV: &str = "GEONEXUS_DTS_ALLOWED_SCENES";
const SPATIAL_DB_PATH_ENV: &str = "GEONEXUS_SPATIAL_DB_PATH";
const SPATIAL_DB_TIMEOUT_ENV: &str = "GEONEXUS_SPATIAL_DB_TIMEOUT_MS";
const SPATIAL_DB_MAX_RECORDS_ENV: &str = "GEONEXUS_SPATIAL_DB_MAX_RECORDS";
const SPATIAL_DB_ALLOWED_TABLES_ENV: &str = "GEONEXUS_SPATIAL_DB_ALLOWED_TABLES";
const AUDIT_ENABLED_ENV: &str = "GEONEXUS_AUDIT_ENABLED";
const AUDIT_TABLE_ENV: &str = "GEONEXUS_AUDIT_TABLE";

/// Deployment environment. Mock data is only ever served outside production.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Parse an environment name. Anything other than `production`/`prod`
    /// counts as a non-production environment.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Where audit records are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditDestination {
    /// A table in the spatial database.
    Table { name: String },
    /// A JSON-lines file.
    JsonLines { path: PathBuf },
}

impl Default for AuditDestination {
    fn default() -> Self {
        AuditDestination::Table {
            name: "public.data_access_logs".to_string(),
        }
    }
}

/// Audit settings for one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub destination: AuditDestination,
    /// Upper bound for a single audit write.
    pub timeout_ms: Option<u64>,
}

impl AuditConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(5_000))
    }
}

/// Settings for the digital-twin scene (DTS) HTTP backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DtsConfig {
    pub base_url: String,
    /// Bearer credential. Without one, non-production environments serve mock data.
    pub api_key: Option<String>,
    pub default_scene_id: String,
    pub timeout_ms: u64,
    pub max_records: u32,
    pub allowed_scenes: Vec<String>,
    pub security_level: Option<String>,
    pub audit: AuditConfig,
}

impl Default for DtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.geonexus.com/dts".to_string(),
            api_key: None,
            default_scene_id: "default".to_string(),
            timeout_ms: 30_000,
            max_records: 5_000,
            allowed_scenes: Vec::new(),
            security_level: None,
            audit: AuditConfig::default(),
        }
    }
}

impl DtsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Settings for the enterprise spatial database backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialDbConfig {
    pub database_path: PathBuf,
    /// Schema that maps onto the main database file.
    pub default_schema: String,
    /// Additional schemas, each backed by its own database file.
    pub attached_schemas: BTreeMap<String, PathBuf>,
    pub timeout_ms: u64,
    pub max_records: u32,
    pub allowed_tables: Vec<String>,
    pub security_level: Option<String>,
    pub audit: AuditConfig,
}

impl Default for SpatialDbConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/geonexus.db"),
            default_schema: "public".to_string(),
            attached_schemas: BTreeMap::new(),
            timeout_ms: 30_000,
            max_records: 1_000,
            allowed_tables: Vec::new(),
            security_level: Some("enterprise".to_string()),
            audit: AuditConfig::default(),
        }
    }
}

impl SpatialDbConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub log_level: String,
    pub dts: DtsConfig,
    pub spatial_db: Option<SpatialDbConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            log_level: "info".to_string(),
            dts: DtsConfig::default(),
            spatial_db: None,
        }
    }
}

impl GatewayConfig {
    /// Read a JSON configuration file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            Error::config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "loaded gateway configuration file");
        Ok(config)
    }

    /// Defaults overridden by `GEONEXUS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Load the file named by `GEONEXUS_CONFIG` (if any), apply environment
    /// overrides, and validate the result.
    pub fn load() -> Result<Self> {
        let mut config = match env::var_os(CONFIG_FILE_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENVIRONMENT_ENV) {
            self.environment = Environment::parse(&value);
        }
        if let Some(value) = lookup(LOG_LEVEL_ENV) {
            self.log_level = value;
        }

        if let Some(value) = lookup(DTS_API_URL_ENV) {
            self.dts.base_url = value;
        }
        if let Some(value) = lookup(DTS_API_KEY_ENV).filter(|v| !v.is_empty()) {
            self.dts.api_key = Some(value);
        }
        if let Some(value) = lookup(DTS_DEFAULT_SCENE_ENV) {
            self.dts.default_scene_id = value;
        }
        if let Some(value) = lookup(DTS_TIMEOUT_ENV) {
            self.dts.timeout_ms = parse_number(DTS_TIMEOUT_ENV, &value)?;
        }
        if let Some(value) = lookup(DTS_MAX_RECORDS_ENV) {
            self.dts.max_records = parse_number(DTS_MAX_RECORDS_ENV, &value)?;
        }
        if let Some(value) = lookup(DTS_ALLOWED_SCENES_ENV) {
            self.dts.allowed_scenes = split_list(&value);
        }

        if let Some(value) = lookup(SPATIAL_DB_PATH_ENV) {
            self.spatial_db
                .get_or_insert_with(SpatialDbConfig::default)
                .database_path = PathBuf::from(value);
        }
        if let Some(spatial) = self.spatial_db.as_mut() {
            if let Some(value) = lookup(SPATIAL_DB_TIMEOUT_ENV) {
                spatial.timeout_ms = parse_number(SPATIAL_DB_TIMEOUT_ENV, &value)?;
            }
            if let Some(value) = lookup(SPATIAL_DB_MAX_RECORDS_ENV) {
                spatial.max_records = parse_number(SPATIAL_DB_MAX_RECORDS_ENV, &value)?;
            }
            if let Some(value) = lookup(SPATIAL_DB_ALLOWED_TABLES_ENV) {
                spatial.allowed_tables = split_list(&value);
            }
            if let Some(value) = lookup(AUDIT_ENABLED_ENV) {
                spatial.audit.enabled = parse_flag(&value);
            }
            if let Some(value) = lookup(AUDIT_TABLE_ENV) {
                spatial.audit.destination = AuditDestination::Table { name: value };
            }
        }

        Ok(())
    }

    /// Reject configurations that cannot serve requests.
    pub fn validate(&self) -> Result<()> {
        if self.dts.base_url.trim().is_empty() {
            return Err(Error::config("dts.base_url must not be empty"));
        }
        if self.dts.max_records == 0 {
            return Err(Error::config("dts.max_records must be at least 1"));
        }
        if self.dts.timeout_ms == 0 {
            return Err(Error::config("dts.timeout_ms must be at least 1"));
        }
        self.validate_audit("dts", &self.dts.audit)?;

        if let Some(spatial) = &self.spatial_db {
            if spatial.max_records == 0 {
                return Err(Error::config("spatial_db.max_records must be at least 1"));
            }
            if spatial.timeout_ms == 0 {
                return Err(Error::config("spatial_db.timeout_ms must be at least 1"));
            }
            for schema in spatial
                .attached_schemas
                .keys()
                .chain(std::iter::once(&spatial.default_schema))
            {
                TableRef::validate_segment(schema).map_err(|reason| {
                    Error::config(format!("invalid schema name '{}': {}", schema, reason))
                })?;
            }
            self.validate_audit("spatial_db", &spatial.audit)?;
        }

        Ok(())
    }

    fn validate_audit(&self, section: &str, audit: &AuditConfig) -> Result<()> {
        if !audit.enabled {
            return Ok(());
        }
        if audit.timeout_ms == Some(0) {
            return Err(Error::config(format!(
                "{}.audit.timeout_ms must be at least 1",
                section
            )));
        }
        match &audit.destination {
            AuditDestination::Table { name } => {
                if self.spatial_db.is_none() {
                    return Err(Error::config(format!(
                        "{}.audit writes to table '{}' but no spatial_db is configured",
                        section, name
                    )));
                }
                TableRef::parse(name).map_err(|e| {
                    Error::config(format!("{}.audit table is invalid: {}", section, e))
                })?;
            }
            AuditDestination::JsonLines { path } => {
                if path.as_os_str().is_empty() {
                    return Err(Error::config(format!(
                        "{}.audit file path must not be empty",
                        section
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| Error::config(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

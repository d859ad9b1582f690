//! Translation of query descriptors into backend-native requests.
//!
//! Each backend kind has its own translator:
//!
//! - [`dts`]: builds the scene API URL and query string.
//! - [`sql`]: builds a parameterized `SELECT` against a validated table.
//!
//! Translators are pure functions; nothing here performs I/O.

pub mod dts;
mod filter;
pub mod sql;

use std::fmt;

use crate::error::{Error, Result};
use crate::policy::NAMESPACE_SEPARATOR;

pub use dts::{translate_dts, DtsRequest};
pub use filter::{parse_filter, Comparison, FilterLiteral, FilterOp};
pub use sql::{translate_sql, SqlRequest};

/// Longest identifier segment accepted (PostgreSQL's `NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// A validated `[schema.]table` reference.
///
/// Only references produced by [`TableRef::parse`] are ever rendered into SQL
/// text; every segment is restricted to `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    schema: Option<String>,
    name: String,
}

impl TableRef {
    /// Parse and validate a table identifier.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidIdentifier {
            identifier: raw.to_string(),
            reason,
        };

        let mut segments = raw.split(NAMESPACE_SEPARATOR);
        let first = segments.next().unwrap_or_default();
        let second = segments.next();
        if segments.next().is_some() {
            return Err(invalid("expected at most one schema qualifier".to_string()));
        }

        Self::validate_segment(first).map_err(invalid)?;
        match second {
            Some(name) => {
                Self::validate_segment(name).map_err(invalid)?;
                Ok(Self {
                    schema: Some(first.to_string()),
                    name: name.to_string(),
                })
            }
            None => Ok(Self {
                schema: None,
                name: first.to_string(),
            }),
        }
    }

    /// Check a single identifier segment.
    pub fn validate_segment(segment: &str) -> std::result::Result<(), String> {
        let mut chars = segment.chars();
        match chars.next() {
            None => return Err("identifier segment is empty".to_string()),
            Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
                return Err(format!("identifier cannot start with '{}'", c));
            }
            Some(_) => {}
        }
        if let Some(c) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(format!("identifier contains invalid character '{}'", c));
        }
        if segment.len() > MAX_IDENTIFIER_LEN {
            return Err(format!(
                "identifier exceeds {} characters",
                MAX_IDENTIFIER_LEN
            ));
        }
        Ok(())
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render as quoted SQL identifiers.
    ///
    /// `default_schema` is the schema that lives in the main database file; it
    /// renders as SQLite's `main` so that `public.buildings` and `buildings`
    /// address the same table.
    pub fn to_sql(&self, default_schema: &str) -> String {
        match self.schema.as_deref() {
            None => format!("\"{}\"", self.name),
            Some(schema) if schema == default_schema => format!("\"main\".\"{}\"", self.name),
            Some(schema) => format!("\"{}\".\"{}\"", schema, self.name),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}{}{}", schema, NAMESPACE_SEPARATOR, self.name),
            None => f.write_str(&self.name),
        }
    }
}

use std::time::Duration;

use thiserror::Error;

/// Convenient result alias for the GeoNexus library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The access policy rejected the requested resource.
    #[error("access to resource '{resource}' is not permitted")]
    Forbidden { resource: String },

    /// A resource identifier could not be used as a table reference.
    #[error("invalid resource identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    /// An attribute filter is outside the dialect understood by the backend.
    #[error("unsupported attribute filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// The backend answered with a failure status or could not be reached.
    #[error("{backend} backend request failed{}: {message}", format_status(.status))]
    BackendUnavailable {
        backend: String,
        status: Option<u16>,
        message: String,
    },

    /// The backend did not answer within the configured timeout.
    #[error("{backend} backend did not respond within {}ms", millis(.after))]
    BackendTimeout { backend: String, after: Duration },

    /// The requested backend is not part of this deployment.
    #[error("{backend} backend is not configured")]
    BackendNotConfigured { backend: String },

    /// Raised when configuration values are missing or inconsistent.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Wrapper for SQLite errors.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Wrapper for HTTP client errors.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for JSON (de)serialization errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable, machine-readable reason code for this error.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Error::Forbidden { .. } => "forbidden",
            Error::InvalidIdentifier { .. } => "invalid_identifier",
            Error::InvalidFilter { .. } => "invalid_filter",
            Error::BackendUnavailable { .. } => "backend_unavailable",
            Error::BackendTimeout { .. } => "backend_timeout",
            Error::BackendNotConfigured { .. } => "backend_not_configured",
            Error::Config { .. } => "configuration_error",
            Error::Sqlite(_) | Error::Http(_) | Error::Io(_) | Error::Json(_) => "internal_error",
        }
    }

    /// Resource identifier carried by the error, when there is one.
    pub fn resource(&self) -> Option<&str> {
        match self {
            Error::Forbidden { resource } => Some(resource),
            Error::InvalidIdentifier { identifier, .. } => Some(identifier),
            _ => None,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}

fn format_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {}", code),
        None => String::new(),
    }
}

fn millis(after: &Duration) -> u128 {
    after.as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_names_resource() {
        let err = Error::Forbidden {
            resource: "public.secret_table".to_string(),
        };
        assert_eq!(err.reason_code(), "forbidden");
        assert_eq!(err.resource(), Some("public.secret_table"));
        assert!(err.to_string().contains("public.secret_table"));
    }

    #[test]
    fn backend_unavailable_includes_status_when_known() {
        let err = Error::BackendUnavailable {
            backend: "dts".to_string(),
            status: Some(503),
            message: "maintenance".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "dts backend request failed with status 503: maintenance"
        );

        let err = Error::BackendUnavailable {
            backend: "dts".to_string(),
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "dts backend request failed: connection refused"
        );
    }

    #[test]
    fn timeout_reports_millis() {
        let err = Error::BackendTimeout {
            backend: "postgis".to_string(),
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.reason_code(), "backend_timeout");
        assert!(err.to_string().contains("1500ms"));
    }
}

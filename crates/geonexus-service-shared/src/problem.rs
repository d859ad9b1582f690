//! RFC 9457 Problem Details for HTTP APIs.
//!
//! Every failed feature query is answered with a problem document.
//! See: <https://www.rfc-editor.org/rfc/rfc9457.html>

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use geonexus_lib::Error as LibError;

/// Problem type URI for resources rejected by the access policy.
pub const PROBLEM_FORBIDDEN: &str = "/problems/forbidden";

/// Problem type URI for invalid identifiers or filters.
pub const PROBLEM_INVALID_REQUEST: &str = "/problems/invalid-request";

/// Problem type URI for backends missing from this deployment.
pub const PROBLEM_BACKEND_NOT_CONFIGURED: &str = "/problems/backend-not-configured";

/// Problem type URI for failed upstream calls.
pub const PROBLEM_BACKEND_UNAVAILABLE: &str = "/problems/backend-unavailable";

/// Problem type URI for upstream calls that exceeded their timeout.
pub const PROBLEM_BACKEND_TIMEOUT: &str = "/problems/backend-timeout";

/// Problem type URI for internal server errors.
pub const PROBLEM_INTERNAL_ERROR: &str = "/problems/internal-error";

/// RFC 9457 Problem Details response structure.
///
/// # Example
///
/// ```
/// use geonexus_service_shared::{ProblemDetails, PROBLEM_FORBIDDEN};
/// use axum::http::StatusCode;
///
/// let problem = ProblemDetails::new(PROBLEM_FORBIDDEN, "Forbidden", StatusCode::FORBIDDEN)
///     .with_detail("access to resource 'public.secret_table' is not permitted")
///     .with_resource("public.secret_table")
///     .with_request_id("req-12345");
/// assert_eq!(problem.status, 403);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type (relative).
    #[serde(rename = "type")]
    pub type_uri: String,

    pub title: String,

    pub status: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// The request ID of the failed call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    /// Resource the failed query targeted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Status returned by the upstream backend, when it answered at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,

    /// Always "application/problem+json".
    pub content_type: String,
}

impl ProblemDetails {
    pub fn new(type_uri: impl Into<String>, title: impl Into<String>, status: StatusCode) -> Self {
        Self {
            type_uri: type_uri.into(),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
            resource: None,
            upstream_status: None,
            content_type: "application/problem+json".to_string(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.instance = Some(request_id.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_upstream_status(mut self, status: Option<u16>) -> Self {
        self.upstream_status = status;
        self
    }

    /// Create a 400 Bad Request problem for invalid input.
    pub fn bad_request(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INVALID_REQUEST,
            "Invalid Request",
            StatusCode::BAD_REQUEST,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// Create a 403 Forbidden problem naming the denied resource.
    pub fn forbidden(resource: &str, request_id: impl Into<String>) -> Self {
        Self::new(PROBLEM_FORBIDDEN, "Forbidden", StatusCode::FORBIDDEN)
            .with_detail(format!(
                "Access to resource '{}' is not permitted",
                resource
            ))
            .with_resource(resource)
            .with_request_id(request_id)
    }

    pub fn backend_not_configured(backend: &str, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_BACKEND_NOT_CONFIGURED,
            "Backend Not Configured",
            StatusCode::NOT_FOUND,
        )
        .with_detail(format!(
            "The {} backend is not configured on this deployment",
            backend
        ))
        .with_request_id(request_id)
    }

    /// Create a 502 Bad Gateway problem for a failed upstream call.
    pub fn backend_unavailable(
        detail: impl Into<String>,
        upstream_status: Option<u16>,
        request_id: impl Into<String>,
    ) -> Self {
        Self::new(
            PROBLEM_BACKEND_UNAVAILABLE,
            "Backend Unavailable",
            StatusCode::BAD_GATEWAY,
        )
        .with_detail(detail)
        .with_upstream_status(upstream_status)
        .with_request_id(request_id)
    }

    /// Create a 504 Gateway Timeout problem.
    pub fn backend_timeout(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_BACKEND_TIMEOUT,
            "Backend Timeout",
            StatusCode::GATEWAY_TIMEOUT,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// Create a 500 Internal Server Error problem.
    pub fn internal_error(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INTERNAL_ERROR,
            "Internal Error",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }
}

impl std::fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.title,
            self.detail.as_deref().unwrap_or("")
        )
    }
}

impl std::error::Error for ProblemDetails {}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = Json(&self).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );

        *response.status_mut() = status;
        response
    }
}

/// Convert library errors to ProblemDetails.
///
/// Upstream response bodies are not echoed back to the caller; only the
/// upstream status survives.
pub fn from_lib_error(error: &LibError, request_id: &str) -> ProblemDetails {
    match error {
        LibError::Forbidden { resource } => ProblemDetails::forbidden(resource, request_id),
        LibError::InvalidIdentifier { identifier, .. } => {
            ProblemDetails::bad_request(error.to_string(), request_id).with_resource(identifier)
        }
        LibError::InvalidFilter { .. } => {
            ProblemDetails::bad_request(error.to_string(), request_id)
        }
        LibError::BackendNotConfigured { backend } => {
            ProblemDetails::backend_not_configured(backend, request_id)
        }
        LibError::BackendUnavailable {
            backend, status, ..
        } => ProblemDetails::backend_unavailable(
            format!("The {} backend could not serve the request", backend),
            *status,
            request_id,
        ),
        LibError::BackendTimeout { .. } => {
            ProblemDetails::backend_timeout(error.to_string(), request_id)
        }
        _ => ProblemDetails::internal_error("The feature query failed", request_id),
    }
}

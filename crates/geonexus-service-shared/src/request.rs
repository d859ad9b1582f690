//! Request extractors for feature endpoints.
//!
//! - [`Caller`]: who issued the request, for auditing
//! - [`FeatureParams`]: the raw query string as [`QueryParams`]

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use geonexus_lib::{CallerIdentity, QueryParams};

use crate::middleware::extract_or_generate_request_id;
use crate::{ProblemDetails, RequestId};

/// Header carrying the caller's user ID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Build a caller identity from request headers and the peer address.
///
/// A blank `X-User-Id` counts as anonymous.
pub fn caller_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> CallerIdentity {
    let id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string());
    let address: Option<IpAddr> = peer.map(|addr| addr.ip());
    CallerIdentity::new(id, address)
}

/// Extractor for the calling user.
///
/// The peer address is only known when the server was started with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
#[derive(Debug, Clone)]
pub struct Caller(pub CallerIdentity);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Caller(caller_identity(&parts.headers, peer)))
    }
}

/// Extractor for the untyped query string of a feature request.
///
/// Unparseable query strings are rejected with a 400 problem document;
/// individual malformed values are left for the normalizer to default.
#[derive(Debug, Clone, Default)]
pub struct FeatureParams(pub QueryParams);

impl<S: Send + Sync> FromRequestParts<S> for FeatureParams {
    type Rejection = ProblemDetails;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match Query::<QueryParams>::try_from_uri(&parts.uri) {
            Ok(Query(params)) => Ok(FeatureParams(params)),
            Err(rejection) => {
                let request_id = parts
                    .extensions
                    .get::<RequestId>()
                    .cloned()
                    .unwrap_or_else(|| extract_or_generate_request_id(&parts.headers));
                Err(ProblemDetails::bad_request(
                    rejection.body_text(),
                    request_id.as_str(),
                ))
            }
        }
    }
}

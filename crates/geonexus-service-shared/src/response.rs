//! GeoJSON response wrapper.

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Media type of successful feature responses.
pub const GEOJSON_CONTENT_TYPE: &str = "application/geo+json";

/// A serializable body sent as `application/geo+json`.
///
/// # Example
///
/// ```
/// use geonexus_lib::FeatureCollection;
/// use geonexus_service_shared::GeoJsonResponse;
///
/// let response = GeoJsonResponse(FeatureCollection::empty());
/// ```
#[derive(Debug, Clone)]
pub struct GeoJsonResponse<T>(pub T);

impl<T: Serialize> IntoResponse for GeoJsonResponse<T> {
    fn into_response(self) -> Response {
        let mut response = Json(self.0).into_response();
        if response.status().is_success() {
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(GEOJSON_CONTENT_TYPE),
            );
        }
        response
    }
}

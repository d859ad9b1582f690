use reqwest::Url;

use crate::error::{Error, Result};
use crate::query::QueryDescriptor;

/// A fully-built request against the DTS scene API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtsRequest {
    pub url: Url,
}

/// Build `{base_url}/scenes/{scene}/features?...` for `query`.
///
/// Only parameters that are present are encoded. `limit` is always sent and
/// is capped at `max_records`; `offset` is sent only when non-zero.
pub fn translate_dts(
    base_url: &str,
    max_records: u32,
    query: &QueryDescriptor,
) -> Result<DtsRequest> {
    if matches!(query.resource_id.as_str(), "." | "..") {
        return Err(Error::InvalidIdentifier {
            identifier: query.resource_id.clone(),
            reason: "scene id cannot be a dot segment".to_string(),
        });
    }

    let mut url = Url::parse(base_url).map_err(|e| Error::Config {
        message: format!("invalid DTS base URL '{}': {}", base_url, e),
    })?;

    url.path_segments_mut()
        .map_err(|_| Error::Config {
            message: format!("DTS base URL '{}' cannot carry a path", base_url),
        })?
        .pop_if_empty()
        .push("scenes")
        .push(&query.resource_id)
        .push("features");
    url.set_query(None);

    {
        let mut pairs = url.query_pairs_mut();
        if let Some(bbox) = &query.bbox {
            pairs.append_pair("bbox", &bbox.to_string());
        }
        if let Some(filter) = &query.attribute_filter {
            pairs.append_pair("where", filter);
        }
        pairs.append_pair("limit", &query.limit.min(max_records).to_string());
        if query.offset > 0 {
            pairs.append_pair("offset", &query.offset.to_string());
        }
        if !query.fields.is_all() {
            pairs.append_pair("outFields", &query.fields.to_string());
        }
    }

    Ok(DtsRequest { url })
}

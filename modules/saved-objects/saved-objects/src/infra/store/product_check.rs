//! Product signature checks on store responses.
//!
//! A 404 without the product header came from something in front of the
//! store (a proxy or gateway), not from the store itself.

use http::HeaderMap;

/// Header carrying the product signature.
pub const PRODUCT_HEADER: &str = "x-elastic-product";

/// Expected value of [`PRODUCT_HEADER`].
pub const PRODUCT_NAME: &str = "Elasticsearch";

#[must_use]
pub fn is_supported_es_server(headers: &HeaderMap) -> bool {
    headers
        .get(PRODUCT_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == PRODUCT_NAME)
}

#[must_use]
pub fn is_not_found_from_unsupported_server(status_code: u16, headers: &HeaderMap) -> bool {
    status_code == 404 && !is_supported_es_server(headers)
}

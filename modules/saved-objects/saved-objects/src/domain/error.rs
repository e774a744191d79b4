//! Mapping of store failures into saved object errors.

use saved_objects_sdk::SavedObjectsError;
use tracing::error;

use crate::infra::store::product_check::is_not_found_from_unsupported_server;
use crate::infra::store::{BulkItemResponse, StoreError, StoreErrorCause};

const VERSION_CONFLICT: &str = "version_conflict_engine_exception";
const INDEX_NOT_FOUND: &str = "index_not_found_exception";

/// What a request-level store call was about, for error reporting.
#[derive(Debug, Clone, Copy)]
pub enum StoreTarget<'a> {
    Object { object_type: &'a str, id: &'a str },
    Bulk,
}

impl StoreTarget<'_> {
    fn unavailable(self) -> SavedObjectsError {
        match self {
            Self::Object { object_type, id } => SavedObjectsError::es_unavailable(object_type, id),
            Self::Bulk => SavedObjectsError::es_unavailable_bulk(),
        }
    }
}

/// Maps a failed store request.
///
/// A 404 without the product signature is `EsUnavailable`; transport
/// failures are `Internal`.
#[must_use]
pub fn from_store_error(err: StoreError, target: StoreTarget<'_>) -> SavedObjectsError {
    match err {
        StoreError::Transport(message) => {
            error!(error = %message, "Store request failed");
            SavedObjectsError::Internal(message)
        }
        StoreError::Response {
            status, headers, ..
        } if is_not_found_from_unsupported_server(status, &headers) => target.unavailable(),
        StoreError::Response { status, cause, .. } => {
            error!(status, error_type = %cause.error_type, "Store rejected request");
            SavedObjectsError::Store {
                status,
                reason: cause.error_type,
            }
        }
    }
}

/// Maps a failed bulk item of `object_type`/`id`.
#[must_use]
pub fn from_bulk_item(object_type: &str, id: &str, item: &BulkItemResponse) -> Option<SavedObjectsError> {
    let cause = item.error.as_ref()?;
    Some(from_item_cause(object_type, id, item.status, cause))
}

fn from_item_cause(object_type: &str, id: &str, status: u16, cause: &StoreErrorCause) -> SavedObjectsError {
    match (status, cause.error_type.as_str()) {
        (404, INDEX_NOT_FOUND) => SavedObjectsError::Internal(format!(
            "Saved object index alias [{}] not found",
            cause.index.as_deref().unwrap_or_default()
        )),
        (404, _) => SavedObjectsError::not_found(object_type, id),
        (409, VERSION_CONFLICT) => SavedObjectsError::retryable_conflict(object_type, id),
        (409, _) => SavedObjectsError::conflict(object_type, id),
        _ => SavedObjectsError::Store {
            status,
            reason: cause.error_type.clone(),
        },
    }
}

//! Error types for the saved objects module.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when using the saved objects API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SavedObjectsError {
    /// Malformed input: empty id, disallowed type, invalid version or namespace.
    #[error("{message}")]
    BadRequest { message: String },

    /// The caller is not authorized to act on the object.
    #[error("{message}")]
    Forbidden { message: String },

    /// The object does not exist, or exists only outside the caller's
    /// namespace.
    #[error("Saved object [{object_type}/{id}] not found")]
    GenericNotFound { object_type: String, id: String },

    /// An optimistic concurrency precondition failed.
    ///
    /// Only `retryable` conflicts come from the store's own version check.
    #[error("Saved object [{object_type}/{id}] conflict")]
    Conflict {
        object_type: String,
        id: String,
        retryable: bool,
    },

    /// The response did not carry the document store's product signature.
    #[error("Store unavailable: request for [{target}] was not answered by the document store")]
    EsUnavailable { target: String },

    /// A raw document failed structural validation during migration.
    #[error("Unable to migrate the corrupt saved object document with _id: '{id}'.")]
    CorruptSavedObject { id: String },

    /// A migration transform failed for a structurally valid document.
    #[error("Failed to transform document with _id: '{id}': {message}")]
    DocumentTransform { id: String, message: String },

    /// A per-item store error with no dedicated mapping.
    #[error("store rejected the operation with status {status}: {reason}")]
    Store { status: u16, reason: String },

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SavedObjectsError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::GenericNotFound {
            object_type: object_type.into(),
            id: id.into(),
        }
    }

    /// Conflict raised by the store's version check; eligible for retry.
    #[must_use]
    pub fn retryable_conflict(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Conflict {
            object_type: object_type.into(),
            id: id.into(),
            retryable: true,
        }
    }

    #[must_use]
    pub fn conflict(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Conflict {
            object_type: object_type.into(),
            id: id.into(),
            retryable: false,
        }
    }

    #[must_use]
    pub fn es_unavailable(object_type: &str, id: &str) -> Self {
        Self::EsUnavailable {
            target: format!("{object_type}/{id}"),
        }
    }

    /// Unavailability detected on a request spanning many objects.
    #[must_use]
    pub fn es_unavailable_bulk() -> Self {
        Self::EsUnavailable {
            target: "bulk request".to_owned(),
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::GenericNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::EsUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::CorruptSavedObject { .. }
            | Self::DocumentTransform { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, Self::Conflict { retryable: true, .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::GenericNotFound { .. })
    }

    #[must_use]
    pub fn is_es_unavailable(&self) -> bool {
        matches!(self, Self::EsUnavailable { .. })
    }

    #[must_use]
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest { .. })
    }

    /// Builds the error body a route handler sends back.
    ///
    /// Store diagnostics and internal details are replaced by the status
    /// reason phrase.
    #[must_use]
    pub fn to_payload(&self) -> ErrorPayload {
        let status = self.status_code();
        let reason = status.canonical_reason().unwrap_or("Error").to_owned();
        let message = match self {
            Self::Store { .. } | Self::Internal(_) | Self::DocumentTransform { .. } => {
                reason.clone()
            }
            other => other.to_string(),
        };
        ErrorPayload {
            status_code: status.as_u16(),
            error: reason,
            message,
        }
    }
}

/// Serializable error body attached to failed bulk items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub status_code: u16,
    pub error: String,
    pub message: String,
}

/// A failed entry of a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{object_type}/{id}: {error}")]
pub struct BulkItemError {
    pub object_type: String,
    pub id: String,
    #[source]
    pub error: SavedObjectsError,
}

impl BulkItemError {
    #[must_use]
    pub fn new(object_type: impl Into<String>, id: impl Into<String>, error: SavedObjectsError) -> Self {
        Self {
            object_type: object_type.into(),
            id: id.into(),
            error,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            SavedObjectsError::bad_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SavedObjectsError::not_found("a", "b").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            SavedObjectsError::retryable_conflict("a", "b").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            SavedObjectsError::es_unavailable("a", "b").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            SavedObjectsError::Store {
                status: 429,
                reason: "es_rejected_execution_exception".to_owned()
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn only_store_conflicts_are_retryable() {
        assert!(SavedObjectsError::retryable_conflict("a", "b").is_retryable_conflict());
        assert!(!SavedObjectsError::conflict("a", "b").is_retryable_conflict());
        assert!(!SavedObjectsError::not_found("a", "b").is_retryable_conflict());
    }

    #[test]
    fn unavailable_message_is_distinct_from_not_found() {
        let unavailable = SavedObjectsError::es_unavailable("dashboard", "d1").to_string();
        let not_found = SavedObjectsError::not_found("dashboard", "d1").to_string();
        assert!(unavailable.starts_with("Store unavailable:"));
        assert!(not_found.starts_with("Saved object [dashboard/d1]"));
        assert_ne!(unavailable, not_found);
    }

    #[test]
    fn payload_hides_store_diagnostics() {
        let payload = SavedObjectsError::Store {
            status: 500,
            reason: "shard [3] failed: NullPointerException".to_owned(),
        }
        .to_payload();
        assert_eq!(payload.status_code, 500);
        assert!(!payload.message.contains("shard"));

        let payload = SavedObjectsError::not_found("dashboard", "d1").to_payload();
        assert_eq!(payload.error, "Not Found");
        assert_eq!(payload.message, "Saved object [dashboard/d1] not found");
    }
}

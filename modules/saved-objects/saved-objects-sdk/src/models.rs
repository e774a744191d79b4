//! Public models for the saved objects module.
//!
//! These are transport-agnostic data structures that define the contract
//! between the repository and its consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BulkItemError;

/// Free-form attributes of a saved object.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Per-object outcome of a bulk operation, positionally matching the request.
pub type BulkResult = Vec<Result<SavedObject, BulkItemError>>;

/// A named reference from one saved object to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedObjectReference {
    pub name: String,
    #[serde(rename = "type")]
    pub ref_type: String,
    pub id: String,
}

/// The logical saved object returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub id: String,
    pub attributes: Attributes,
    #[serde(default)]
    pub references: Vec<SavedObjectReference>,
    /// Spaces the object belongs to. `None` for namespace-agnostic types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Vec<String>>,
    /// Opaque optimistic concurrency token. Never parse it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "originId", default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
}

/// Refresh policy forwarded to the document store on writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Refresh {
    #[serde(rename = "true")]
    True,
    #[serde(rename = "false")]
    False,
    #[default]
    #[serde(rename = "wait_for")]
    WaitFor,
}

impl Refresh {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::WaitFor => "wait_for",
        }
    }
}

/// One entry of a bulk update request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkUpdateObject {
    pub object_type: String,
    pub id: String,
    /// Partial attributes, merged into the stored ones.
    pub attributes: Attributes,
    /// Expected version; `None` means last write wins.
    pub version: Option<String>,
    /// Replaces the stored references when present.
    pub references: Option<Vec<SavedObjectReference>>,
    /// Overrides the batch-level namespace for this object.
    pub namespace: Option<String>,
}

impl BulkUpdateObject {
    #[must_use]
    pub fn new(object_type: impl Into<String>, id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            object_type: object_type.into(),
            id: id.into(),
            attributes,
            version: None,
            references: None,
            namespace: None,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_references(mut self, references: Vec<SavedObjectReference>) -> Self {
        self.references = Some(references);
        self
    }
}

/// Options shared by every object of a bulk update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkUpdateOptions {
    /// Namespace (space) the caller operates in. `None` is the default space.
    pub namespace: Option<String>,
    /// Falls back to the repository's configured refresh policy.
    pub refresh: Option<Refresh>,
}

/// Options for a single-object update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    pub namespace: Option<String>,
    /// When set, the update is attempted exactly once.
    pub version: Option<String>,
    pub references: Option<Vec<SavedObjectReference>>,
    pub refresh: Option<Refresh>,
    /// Falls back to the repository's configured retry count.
    pub retry_on_conflict: Option<u32>,
    /// Attributes used to create the object when it does not exist yet.
    pub upsert: Option<Attributes>,
}

/// Options for read operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub namespace: Option<String>,
}

/// One entry of a bulk get request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkGetObject {
    pub object_type: String,
    pub id: String,
    /// Overrides the batch-level namespace for this object.
    pub namespace: Option<String>,
}

impl BulkGetObject {
    #[must_use]
    pub fn new(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            id: id.into(),
            namespace: None,
        }
    }
}

//! Narrow client interface to the backing document store.
//!
//! Requests and responses mirror the store's wire shapes closely enough that
//! a network client can translate them one-to-one. `get` and `mget` report a
//! 404 through `status_code` instead of failing, so callers can tell a
//! genuine miss from an untrusted intermediary.

use async_trait::async_trait;
use http::HeaderMap;
use saved_objects_sdk::Refresh;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::serializer::RawDoc;

/// A store response together with its transport metadata.
#[derive(Debug, Clone)]
pub struct StoreResponse<T> {
    pub body: T,
    pub status_code: u16,
    pub headers: HeaderMap,
}

/// Error cause reported by the store for a request or a bulk item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreErrorCause {
    pub error_type: String,
    pub reason: String,
    pub index: Option<String>,
}

impl StoreErrorCause {
    #[must_use]
    pub fn new(error_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            reason: reason.into(),
            index: None,
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }
}

/// Request-level store failures.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The request never produced a response.
    #[error("store transport error: {0}")]
    Transport(String),

    /// The store (or something in front of it) answered with an error status.
    #[error("store responded with status {status}: {}", .cause.reason)]
    Response {
        status: u16,
        cause: StoreErrorCause,
        headers: HeaderMap,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub id: String,
    pub index: String,
}

/// A single document lookup result.
#[derive(Debug, Clone, PartialEq)]
pub struct GetResult {
    pub id: String,
    pub index: String,
    pub found: bool,
    pub seq_no: Option<i64>,
    pub primary_term: Option<i64>,
    pub source: Option<Map<String, Value>>,
}

impl GetResult {
    /// Converts a found document into its raw representation.
    #[must_use]
    pub fn into_raw_doc(self) -> Option<RawDoc> {
        if !self.found {
            return None;
        }
        let source = self.source?;
        Some(RawDoc {
            id: self.id,
            index: Some(self.index),
            seq_no: self.seq_no,
            primary_term: self.primary_term,
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MgetDocRequest {
    pub id: String,
    pub index: String,
    /// Restricts the returned `_source` to these top-level fields.
    pub source_includes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MgetRequest {
    pub docs: Vec<MgetDocRequest>,
}

/// One entry of a multi-get response.
#[derive(Debug, Clone, PartialEq)]
pub enum MgetHit {
    Doc(GetResult),
    Error {
        id: String,
        index: String,
        cause: StoreErrorCause,
    },
}

impl MgetHit {
    #[must_use]
    pub fn found_doc(self) -> Option<RawDoc> {
        match self {
            Self::Doc(result) => result.into_raw_doc(),
            Self::Error { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MgetResponse {
    pub docs: Vec<MgetHit>,
}

/// Header half of a bulk operation pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkHeader {
    pub id: String,
    pub index: String,
    pub if_seq_no: Option<i64>,
    pub if_primary_term: Option<i64>,
}

/// A header/body pair of a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    /// Partial update; `doc` is merged into the stored `_source`.
    Update {
        header: BulkHeader,
        doc: Map<String, Value>,
    },
    /// Create; fails with a version conflict when the id already exists.
    Create {
        header: BulkHeader,
        document: Map<String, Value>,
    },
}

impl BulkOperation {
    #[must_use]
    pub fn header(&self) -> &BulkHeader {
        match self {
            Self::Update { header, .. } | Self::Create { header, .. } => header,
        }
    }

    #[must_use]
    pub fn action(&self) -> BulkAction {
        match self {
            Self::Update { .. } => BulkAction::Update,
            Self::Create { .. } => BulkAction::Create,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Update,
    Create,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkRequest {
    pub refresh: Refresh,
    pub operations: Vec<BulkOperation>,
    /// Rejects writes that would implicitly create a concrete index.
    pub require_alias: bool,
    /// Fields of the updated `_source` echoed back in each item's `get`.
    pub source_includes: Vec<String>,
}

/// Per-operation result of a bulk request, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResponse {
    pub action: BulkAction,
    pub id: String,
    pub index: String,
    pub status: u16,
    pub seq_no: Option<i64>,
    pub primary_term: Option<i64>,
    pub error: Option<StoreErrorCause>,
    /// Echo of the written document, limited to the requested fields.
    pub get: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResponse {
    pub errors: bool,
    pub items: Vec<BulkItemResponse>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub id: String,
    pub index: String,
    pub refresh: Refresh,
    pub document: Map<String, Value>,
    pub require_alias: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateResponse {
    pub id: String,
    pub index: String,
    pub seq_no: i64,
    pub primary_term: i64,
}

/// Abstract document store interface.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Fetches one document. A missing document or index is a 404 response.
    async fn get(&self, request: GetRequest) -> Result<StoreResponse<GetResult>, StoreError>;

    /// Fetches many documents in one round trip, preserving request order.
    async fn mget(&self, request: MgetRequest)
    -> Result<StoreResponse<MgetResponse>, StoreError>;

    /// Executes header/body operation pairs; item failures are reported per item.
    async fn bulk(&self, request: BulkRequest) -> Result<StoreResponse<BulkResponse>, StoreError>;

    /// Creates one document, failing with a 409 response if it exists.
    async fn create(
        &self,
        request: CreateRequest,
    ) -> Result<StoreResponse<CreateResponse>, StoreError>;
}

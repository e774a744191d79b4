//! In-memory document store.
//!
//! Behaves like a single-index document store behind an alias: sequence
//! numbers grow globally, the primary term is fixed, partial updates deep
//! merge objects and replace everything else. Failure modes are selected per
//! instance through [`MemoryStoreOptions`].

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use http::{HeaderMap, HeaderValue};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::client::{
    BulkAction, BulkHeader, BulkItemResponse, BulkOperation, BulkRequest, BulkResponse,
    CreateRequest, CreateResponse, GetRequest, GetResult, MgetHit, MgetRequest, MgetResponse,
    StoreClient, StoreError, StoreErrorCause, StoreResponse,
};
use super::product_check::{PRODUCT_HEADER, PRODUCT_NAME};
use crate::domain::serializer::RawDoc;

const VERSION_CONFLICT: &str = "version_conflict_engine_exception";
const DOCUMENT_MISSING: &str = "document_missing_exception";
const INDEX_NOT_FOUND: &str = "index_not_found_exception";

/// Per-instance behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStoreOptions {
    /// Attach the product signature header to every response.
    pub product_header: bool,
    /// Answer every request with 404, as a proxy in front of a missing
    /// backend would.
    pub not_found_responses: bool,
    /// Reject every write item with a version conflict.
    pub conflict_on_write: bool,
    /// Fail every request before it reaches the store.
    pub transport_failure: bool,
}

impl Default for MemoryStoreOptions {
    fn default() -> Self {
        Self {
            product_header: true,
            not_found_responses: false,
            conflict_on_write: false,
            transport_failure: false,
        }
    }
}

/// Number of calls received per client method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCallCounts {
    pub get: usize,
    pub mget: usize,
    pub bulk: usize,
    pub create: usize,
}

#[derive(Debug, Default)]
struct CallCounters {
    get: AtomicUsize,
    mget: AtomicUsize,
    bulk: AtomicUsize,
    create: AtomicUsize,
}

#[derive(Debug, Clone)]
struct StoredDoc {
    source: Map<String, Value>,
    seq_no: i64,
    primary_term: i64,
}

pub struct MemoryStore {
    index: String,
    options: MemoryStoreOptions,
    docs: DashMap<String, StoredDoc>,
    next_seq_no: AtomicI64,
    primary_term: i64,
    calls: CallCounters,
    mget_requests: Mutex<Vec<MgetRequest>>,
    bulk_requests: Mutex<Vec<BulkRequest>>,
}

impl MemoryStore {
    /// Creates an empty store serving `index` with default options.
    #[must_use]
    pub fn new(index: impl Into<String>) -> Self {
        Self::with_options(index, MemoryStoreOptions::default())
    }

    #[must_use]
    pub fn with_options(index: impl Into<String>, options: MemoryStoreOptions) -> Self {
        Self {
            index: index.into(),
            options,
            docs: DashMap::new(),
            next_seq_no: AtomicI64::new(0),
            primary_term: 1,
            calls: CallCounters::default(),
            mget_requests: Mutex::new(Vec::new()),
            bulk_requests: Mutex::new(Vec::new()),
        }
    }

    /// Stores a document directly, bypassing failure switches and counters.
    ///
    /// Returns the `(seq_no, primary_term)` assigned to the write.
    #[must_use]
    pub fn seed(&self, id: impl Into<String>, source: Map<String, Value>) -> (i64, i64) {
        let seq_no = self.next_seq_no();
        self.docs.insert(
            id.into(),
            StoredDoc {
                source,
                seq_no,
                primary_term: self.primary_term,
            },
        );
        (seq_no, self.primary_term)
    }

    /// Current raw document stored under `id`.
    #[must_use]
    pub fn document(&self, id: &str) -> Option<RawDoc> {
        self.docs.get(id).map(|stored| RawDoc {
            id: id.to_owned(),
            index: Some(self.index.clone()),
            seq_no: Some(stored.seq_no),
            primary_term: Some(stored.primary_term),
            source: stored.source.clone(),
        })
    }

    #[must_use]
    pub fn call_counts(&self) -> StoreCallCounts {
        StoreCallCounts {
            get: self.calls.get.load(Ordering::SeqCst),
            mget: self.calls.mget.load(Ordering::SeqCst),
            bulk: self.calls.bulk.load(Ordering::SeqCst),
            create: self.calls.create.load(Ordering::SeqCst),
        }
    }

    /// Every `mget` request received, in arrival order.
    #[must_use]
    pub fn mget_requests(&self) -> Vec<MgetRequest> {
        self.mget_requests.lock().clone()
    }

    /// Every `bulk` request received, in arrival order.
    #[must_use]
    pub fn bulk_requests(&self) -> Vec<BulkRequest> {
        self.bulk_requests.lock().clone()
    }

    fn next_seq_no(&self) -> i64 {
        self.next_seq_no.fetch_add(1, Ordering::SeqCst)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if self.options.product_header {
            headers.insert(PRODUCT_HEADER, HeaderValue::from_static(PRODUCT_NAME));
        }
        headers
    }

    fn respond<T>(&self, body: T, status_code: u16) -> StoreResponse<T> {
        StoreResponse {
            body,
            status_code,
            headers: self.headers(),
        }
    }

    fn check_transport(&self) -> Result<(), StoreError> {
        if self.options.transport_failure {
            return Err(StoreError::Transport("connection refused".to_owned()));
        }
        Ok(())
    }

    fn index_not_found(&self, index: &str) -> StoreErrorCause {
        StoreErrorCause::new(INDEX_NOT_FOUND, format!("no such index [{index}]")).with_index(index)
    }

    fn lookup(&self, id: &str, index: &str, includes: Option<&[String]>) -> GetResult {
        let stored = self.docs.get(id);
        GetResult {
            id: id.to_owned(),
            index: index.to_owned(),
            found: stored.is_some(),
            seq_no: stored.as_ref().map(|doc| doc.seq_no),
            primary_term: stored.as_ref().map(|doc| doc.primary_term),
            source: stored.map(|doc| match includes {
                Some(fields) => project(&doc.source, fields),
                None => doc.source.clone(),
            }),
        }
    }

    fn apply_operation(&self, operation: BulkOperation, includes: &[String]) -> BulkItemResponse {
        let action = operation.action();
        let header = operation.header().clone();
        if header.index != self.index {
            let cause = self.index_not_found(&header.index);
            return item_error(action, &header, 404, cause);
        }
        if self.options.conflict_on_write {
            let cause = StoreErrorCause::new(
                VERSION_CONFLICT,
                format!("[{}]: version conflict, document already modified", header.id),
            );
            return item_error(action, &header, 409, cause);
        }
        match operation {
            BulkOperation::Update { header, doc } => self.apply_update(&header, doc, includes),
            BulkOperation::Create { header, document } => {
                self.apply_create(&header, document, includes)
            }
        }
    }

    fn apply_update(
        &self,
        header: &BulkHeader,
        doc: Map<String, Value>,
        includes: &[String],
    ) -> BulkItemResponse {
        match self.docs.entry(header.id.clone()) {
            Entry::Vacant(_) => {
                let cause = StoreErrorCause::new(
                    DOCUMENT_MISSING,
                    format!("[{}]: document missing", header.id),
                );
                item_error(BulkAction::Update, header, 404, cause)
            }
            Entry::Occupied(mut entry) => {
                let stored = entry.get_mut();
                if let Some(cause) = precondition_failure(header, stored) {
                    return item_error(BulkAction::Update, header, 409, cause);
                }
                merge_into(&mut stored.source, doc);
                stored.seq_no = self.next_seq_no();
                stored.primary_term = self.primary_term;
                item_written(BulkAction::Update, header, 200, stored, includes)
            }
        }
    }

    fn apply_create(
        &self,
        header: &BulkHeader,
        document: Map<String, Value>,
        includes: &[String],
    ) -> BulkItemResponse {
        match self.docs.entry(header.id.clone()) {
            Entry::Occupied(_) => {
                let cause = StoreErrorCause::new(
                    VERSION_CONFLICT,
                    format!("[{}]: version conflict, document already exists", header.id),
                );
                item_error(BulkAction::Create, header, 409, cause)
            }
            Entry::Vacant(entry) => {
                let stored = entry.insert(StoredDoc {
                    source: document,
                    seq_no: self.next_seq_no(),
                    primary_term: self.primary_term,
                });
                item_written(BulkAction::Create, header, 201, &stored, includes)
            }
        }
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn get(&self, request: GetRequest) -> Result<StoreResponse<GetResult>, StoreError> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        self.check_transport()?;
        let missing = GetResult {
            id: request.id.clone(),
            index: request.index.clone(),
            found: false,
            seq_no: None,
            primary_term: None,
            source: None,
        };
        if self.options.not_found_responses || request.index != self.index {
            return Ok(self.respond(missing, 404));
        }
        let result = self.lookup(&request.id, &request.index, None);
        let status = if result.found { 200 } else { 404 };
        Ok(self.respond(result, status))
    }

    async fn mget(
        &self,
        request: MgetRequest,
    ) -> Result<StoreResponse<MgetResponse>, StoreError> {
        self.calls.mget.fetch_add(1, Ordering::SeqCst);
        self.mget_requests.lock().push(request.clone());
        self.check_transport()?;
        if self.options.not_found_responses {
            return Ok(self.respond(MgetResponse::default(), 404));
        }
        let docs = request
            .docs
            .into_iter()
            .map(|doc| {
                if doc.index == self.index {
                    MgetHit::Doc(self.lookup(&doc.id, &doc.index, doc.source_includes.as_deref()))
                } else {
                    MgetHit::Error {
                        cause: self.index_not_found(&doc.index),
                        id: doc.id,
                        index: doc.index,
                    }
                }
            })
            .collect();
        Ok(self.respond(MgetResponse { docs }, 200))
    }

    async fn bulk(&self, request: BulkRequest) -> Result<StoreResponse<BulkResponse>, StoreError> {
        self.calls.bulk.fetch_add(1, Ordering::SeqCst);
        self.bulk_requests.lock().push(request.clone());
        self.check_transport()?;
        if self.options.not_found_responses {
            return Err(StoreError::Response {
                status: 404,
                cause: StoreErrorCause::new("not_found", "Not Found"),
                headers: self.headers(),
            });
        }
        let BulkRequest {
            operations,
            source_includes,
            ..
        } = request;
        let items: Vec<BulkItemResponse> = operations
            .into_iter()
            .map(|operation| self.apply_operation(operation, &source_includes))
            .collect();
        let errors = items.iter().any(|item| item.error.is_some());
        Ok(self.respond(BulkResponse { errors, items }, 200))
    }

    async fn create(
        &self,
        request: CreateRequest,
    ) -> Result<StoreResponse<CreateResponse>, StoreError> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        self.check_transport()?;
        if self.options.not_found_responses || request.index != self.index {
            return Err(StoreError::Response {
                status: 404,
                cause: self.index_not_found(&request.index),
                headers: self.headers(),
            });
        }
        let header = BulkHeader {
            id: request.id,
            index: request.index,
            ..BulkHeader::default()
        };
        let item = self.apply_operation(
            BulkOperation::Create {
                header,
                document: request.document,
            },
            &[],
        );
        match (item.error, item.seq_no, item.primary_term) {
            (None, Some(seq_no), Some(primary_term)) => Ok(self.respond(
                CreateResponse {
                    id: item.id,
                    index: item.index,
                    seq_no,
                    primary_term,
                },
                201,
            )),
            (cause, _, _) => Err(StoreError::Response {
                status: item.status,
                cause: cause.unwrap_or_else(|| StoreErrorCause::new("unknown", "write failed")),
                headers: self.headers(),
            }),
        }
    }
}

fn precondition_failure(header: &BulkHeader, stored: &StoredDoc) -> Option<StoreErrorCause> {
    let seq_mismatch = header.if_seq_no.is_some_and(|seq_no| seq_no != stored.seq_no);
    let term_mismatch = header
        .if_primary_term
        .is_some_and(|term| term != stored.primary_term);
    (seq_mismatch || term_mismatch).then(|| {
        StoreErrorCause::new(
            VERSION_CONFLICT,
            format!(
                "[{}]: version conflict, required seqNo [{}], primary term [{}]. current document has seqNo [{}] and primary term [{}]",
                header.id,
                header.if_seq_no.unwrap_or(-1),
                header.if_primary_term.unwrap_or(0),
                stored.seq_no,
                stored.primary_term,
            ),
        )
    })
}

fn item_written(
    action: BulkAction,
    header: &BulkHeader,
    status: u16,
    stored: &StoredDoc,
    includes: &[String],
) -> BulkItemResponse {
    BulkItemResponse {
        action,
        id: header.id.clone(),
        index: header.index.clone(),
        status,
        seq_no: Some(stored.seq_no),
        primary_term: Some(stored.primary_term),
        error: None,
        get: (!includes.is_empty()).then(|| project(&stored.source, includes)),
    }
}

fn item_error(
    action: BulkAction,
    header: &BulkHeader,
    status: u16,
    cause: StoreErrorCause,
) -> BulkItemResponse {
    BulkItemResponse {
        action,
        id: header.id.clone(),
        index: header.index.clone(),
        status,
        seq_no: None,
        primary_term: None,
        error: Some(cause),
        get: None,
    }
}

fn project(source: &Map<String, Value>, fields: &[String]) -> Map<String, Value> {
    source
        .iter()
        .filter(|(key, _)| fields.iter().any(|field| field == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Merges `patch` into `target`: nested objects merge key by key, any other
/// value (arrays included) replaces the stored one.
fn merge_into(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;

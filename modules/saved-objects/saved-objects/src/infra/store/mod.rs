//! Document store access: client interface, product check and the
//! in-memory implementation.

pub mod client;
pub mod memory;
pub mod product_check;

pub use client::{
    BulkAction, BulkHeader, BulkItemResponse, BulkOperation, BulkRequest, BulkResponse,
    CreateRequest, CreateResponse, GetRequest, GetResult, MgetDocRequest, MgetHit, MgetRequest,
    MgetResponse, StoreClient, StoreError, StoreErrorCause, StoreResponse,
};
pub use memory::{MemoryStore, MemoryStoreOptions, StoreCallCounts};

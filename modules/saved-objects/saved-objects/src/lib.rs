//! Saved Objects Module Implementation
//!
//! The public API is defined in `saved-objects-sdk` and re-exported here.
//! [`SavedObjectsRepository`] implements it over a [`StoreClient`]; the
//! bundled [`MemoryStore`] is the reference store.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub use saved_objects_sdk::{
    Attributes, BulkGetObject, BulkItemError, BulkResult, BulkUpdateObject, BulkUpdateOptions,
    GetOptions, Refresh, SavedObject, SavedObjectReference, SavedObjectsClient, SavedObjectsError,
    UpdateOptions,
};

pub mod config;
pub mod domain;
pub mod infra;


pub use config::SavedObjectsConfig;
pub use domain::encryption::{EncryptionDescriptor, EncryptionExtension};
pub use domain::migration::{MigrateRawDocsResult, TransformError};
pub use domain::repository::{
    SavedObjectsRepository, SavedObjectsRepositoryBuilder, execute_update_retry_on_conflict,
};
pub use domain::security::{
    AuthorizationResult, AuthorizationStatus, AuthorizationTypeMap, AuthorizeUpdateObject,
    SecurityExtension, TypeAuthorization,
};
pub use domain::serializer::RawDoc;
pub use domain::type_registry::{NamespaceType, SavedObjectType, SavedObjectTypeRegistry};
pub use infra::store::{MemoryStore, MemoryStoreOptions, StoreClient};

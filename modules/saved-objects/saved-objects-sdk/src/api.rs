//! Public API trait for the saved objects repository.

use async_trait::async_trait;

use crate::error::SavedObjectsError;
use crate::models::{
    Attributes, BulkGetObject, BulkResult, BulkUpdateObject, BulkUpdateOptions, GetOptions,
    SavedObject, UpdateOptions,
};

/// Public API trait for saved objects.
///
/// Bulk methods return one entry per requested object, in request order.
/// Per-object failures are reported inside the returned vector; only
/// request-level failures (transport errors, an untrusted store response)
/// are returned as `Err`.
#[async_trait]
pub trait SavedObjectsClient: Send + Sync {
    /// Get a single saved object.
    ///
    /// # Errors
    ///
    /// - `GenericNotFound` if the object is absent from the caller's namespace
    /// - `EsUnavailable` if the store response cannot be trusted
    async fn get(
        &self,
        object_type: &str,
        id: &str,
        options: &GetOptions,
    ) -> Result<SavedObject, SavedObjectsError>;

    /// Get many saved objects with one store round trip.
    ///
    /// # Errors
    ///
    /// - `EsUnavailable` if the store response cannot be trusted
    async fn bulk_get(
        &self,
        objects: Vec<BulkGetObject>,
        options: &GetOptions,
    ) -> Result<BulkResult, SavedObjectsError>;

    /// Partially update a single saved object, retrying on version conflicts.
    ///
    /// # Errors
    ///
    /// - `BadRequest` for malformed input
    /// - `GenericNotFound` if the object is absent and no upsert was given
    /// - `Conflict` once retries are exhausted, or immediately when a
    ///   `version` was supplied
    async fn update(
        &self,
        object_type: &str,
        id: &str,
        attributes: Attributes,
        options: UpdateOptions,
    ) -> Result<SavedObject, SavedObjectsError>;

    /// Partially update many saved objects with one store mutation.
    ///
    /// # Errors
    ///
    /// - `EsUnavailable` if the preflight response cannot be trusted
    /// - `Internal` if the batched store call fails
    async fn bulk_update(
        &self,
        objects: Vec<BulkUpdateObject>,
        options: BulkUpdateOptions,
    ) -> Result<BulkResult, SavedObjectsError>;
}

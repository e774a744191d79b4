//! Single-object update with retry on version conflicts.

use std::future::Future;

use saved_objects_sdk::{
    Attributes, BulkUpdateObject, BulkUpdateOptions, SavedObject, SavedObjectsError, UpdateOptions,
};
use tracing::{debug, warn};

use super::SavedObjectsRepository;
use super::bulk_update::UpdateCandidate;

/// Runs `attempt` until it succeeds, fails with anything other than a
/// retryable conflict, or `max_attempts` attempts have been made.
///
/// `attempt` receives the 1-based attempt number.
///
/// # Errors
///
/// The last error returned by `attempt`.
pub async fn execute_update_retry_on_conflict<T, F, Fut>(
    object_type: &str,
    id: &str,
    max_attempts: u32,
    mut attempt: F,
) -> Result<T, SavedObjectsError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, SavedObjectsError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut current = 1;
    loop {
        match attempt(current).await {
            Err(e) if e.is_retryable_conflict() && current < max_attempts => {
                debug!(object_type, id, attempt = current, max_attempts, "Version conflict, retrying update");
                current += 1;
            }
            Err(e) if e.is_retryable_conflict() => {
                warn!(object_type, id, attempts = current, "Update retry attempts exhausted");
                return Err(e);
            }
            other => return other,
        }
    }
}

impl SavedObjectsRepository {
    #[tracing::instrument(skip_all, fields(object_type = %object_type, id = %id))]
    pub(super) async fn perform_update(
        &self,
        object_type: &str,
        id: &str,
        attributes: Attributes,
        options: UpdateOptions,
    ) -> Result<SavedObject, SavedObjectsError> {
        let max_attempts = if options.version.is_some() {
            1
        } else {
            options
                .retry_on_conflict
                .unwrap_or(self.config.retry_on_conflict)
                .saturating_add(1)
        };
        let (attributes, options) = (&attributes, &options);
        execute_update_retry_on_conflict(object_type, id, max_attempts, move |_| {
            self.update_once(object_type, id, attributes.clone(), options)
        })
        .await
    }

    /// One full bulk cycle for a single object, preflight included.
    async fn update_once(
        &self,
        object_type: &str,
        id: &str,
        attributes: Attributes,
        options: &UpdateOptions,
    ) -> Result<SavedObject, SavedObjectsError> {
        let candidate = UpdateCandidate {
            object: BulkUpdateObject {
                object_type: object_type.to_owned(),
                id: id.to_owned(),
                attributes,
                version: options.version.clone(),
                references: options.references.clone(),
                namespace: None,
            },
            upsert: options.upsert.clone(),
        };
        let bulk_options = BulkUpdateOptions {
            namespace: options.namespace.clone(),
            refresh: options.refresh,
        };
        let mut results = self.bulk_update_candidates(vec![candidate], bulk_options).await?;
        match results.pop() {
            Some(Ok(object)) => Ok(object),
            Some(Err(item)) => Err(item.error),
            None => Err(SavedObjectsError::Internal(
                "bulk update returned no result".to_owned(),
            )),
        }
    }
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod update_tests;

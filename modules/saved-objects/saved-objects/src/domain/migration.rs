//! Raw document migration.
//!
//! Every document read from the store is validated and brought up to the
//! latest model version of its type before it is used. Model versions are
//! stored in `typeMigrationVersion` as the virtual version `10.{n}.0`.

use std::sync::Arc;

use saved_objects_sdk::SavedObjectsError;
use tracing::{debug, warn};

use super::serializer::{RawDoc, SavedObjectDoc, SavedObjectsSerializer};
use super::type_registry::{SavedObjectType, SavedObjectTypeRegistry};

const VIRTUAL_VERSION_MAJOR: u64 = 10;

#[must_use]
pub fn model_version_to_virtual_version(model_version: u32) -> String {
    format!("{VIRTUAL_VERSION_MAJOR}.{model_version}.0")
}

/// Reads the model version encoded in a virtual version.
///
/// Versions below the virtual major predate model versions and map to 0.
/// Returns `None` when the string is not a `major.minor.patch` triple.
#[must_use]
pub fn virtual_version_to_model_version(version: &str) -> Option<VirtualVersion> {
    let mut parts = version.split('.');
    let major: u64 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next()?.parse().ok()?;
    let _patch: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(match major.cmp(&VIRTUAL_VERSION_MAJOR) {
        std::cmp::Ordering::Less => VirtualVersion::Model(0),
        std::cmp::Ordering::Equal => VirtualVersion::Model(minor),
        std::cmp::Ordering::Greater => VirtualVersion::Newer,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualVersion {
    Model(u32),
    /// Written by a newer release than any known model version scheme.
    Newer,
}

/// Applies pending model version transforms to documents.
#[derive(Debug, Clone)]
pub struct DocumentMigrator {
    registry: Arc<SavedObjectTypeRegistry>,
}

impl DocumentMigrator {
    #[must_use]
    pub fn new(registry: Arc<SavedObjectTypeRegistry>) -> Self {
        Self { registry }
    }

    /// Latest virtual version of a type, `None` if it has no model versions.
    #[must_use]
    pub fn latest_virtual_version(&self, object_type: &str) -> Option<String> {
        self.registry
            .get_type(object_type)
            .map(SavedObjectType::latest_model_version)
            .filter(|latest| *latest > 0)
            .map(model_version_to_virtual_version)
    }

    /// Migrates one document to the latest model version of its type.
    ///
    /// # Errors
    ///
    /// Returns `DocumentTransform` for an unknown type, an unreadable or
    /// newer version stamp, or a failing transform.
    pub fn migrate(&self, mut doc: SavedObjectDoc) -> Result<SavedObjectDoc, SavedObjectsError> {
        let transform_error = |id: &str, message: String| SavedObjectsError::DocumentTransform {
            id: id.to_owned(),
            message,
        };
        let Some(object_type) = self.registry.get_type(&doc.object_type) else {
            return Err(transform_error(
                &doc.id,
                format!("Missing type definition for '{}'", doc.object_type),
            ));
        };
        let latest = object_type.latest_model_version();
        let current = match doc.type_migration_version.as_deref() {
            None => 0,
            Some(stamp) => match virtual_version_to_model_version(stamp) {
                Some(VirtualVersion::Model(version)) if version <= latest => version,
                Some(_) => {
                    return Err(transform_error(
                        &doc.id,
                        format!(
                            "Document belongs to a more recent version [{stamp}] than the latest known [{}]",
                            model_version_to_virtual_version(latest)
                        ),
                    ));
                }
                None => {
                    return Err(transform_error(
                        &doc.id,
                        format!("Invalid typeMigrationVersion [{stamp}]"),
                    ));
                }
            },
        };

        for model in object_type
            .model_versions()
            .iter()
            .filter(|model| model.version > current)
        {
            let id = doc.id.clone();
            doc = (model.transform)(doc).map_err(|e| {
                transform_error(&id, format!("model version {}: {e:#}", model.version))
            })?;
        }
        if latest > 0 {
            doc.type_migration_version = Some(model_version_to_virtual_version(latest));
        }
        Ok(doc)
    }
}

/// A transform failure of a structurally valid document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformError {
    pub id: String,
    pub error: SavedObjectsError,
}

/// Outcome of [`MigrationHelper::migrate_raw_docs_non_throwing`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrateRawDocsResult {
    pub processed_docs: Vec<RawDoc>,
    /// Ids of documents that failed structural validation.
    pub failed_docs_ids: Vec<String>,
    pub transform_errors: Vec<TransformError>,
}

impl MigrateRawDocsResult {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed_docs_ids.is_empty() && self.transform_errors.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MigrationHelper {
    serializer: SavedObjectsSerializer,
    migrator: DocumentMigrator,
}

impl MigrationHelper {
    #[must_use]
    pub fn new(serializer: SavedObjectsSerializer, migrator: DocumentMigrator) -> Self {
        Self {
            serializer,
            migrator,
        }
    }

    #[must_use]
    pub fn migrator(&self) -> &DocumentMigrator {
        &self.migrator
    }

    /// Validates and migrates a raw document into its logical form.
    ///
    /// # Errors
    ///
    /// `CorruptSavedObject` or `DocumentTransform`.
    pub fn migrate_to_saved_object(&self, raw: RawDoc) -> Result<SavedObjectDoc, SavedObjectsError> {
        let doc = self.serializer.raw_to_saved_object(raw)?;
        self.migrator.migrate(doc)
    }

    /// Validates and migrates a raw document, keeping its raw form.
    ///
    /// # Errors
    ///
    /// `CorruptSavedObject` or `DocumentTransform`.
    pub fn migrate_raw_doc(&self, raw: RawDoc) -> Result<RawDoc, SavedObjectsError> {
        let index = raw.index.clone();
        let migrated = self.migrate_to_saved_object(raw)?;
        let mut raw = self.serializer.saved_object_to_raw(migrated)?;
        raw.index = index;
        Ok(raw)
    }

    /// Migrates every document, aborting on the first failure.
    ///
    /// # Errors
    ///
    /// `CorruptSavedObject` for the first structurally invalid document,
    /// `DocumentTransform` for the first failing transform.
    pub async fn migrate_raw_docs(&self, raw_docs: Vec<RawDoc>) -> Result<Vec<RawDoc>, SavedObjectsError> {
        let mut processed = Vec::with_capacity(raw_docs.len());
        for raw in raw_docs {
            let id = raw.id.clone();
            match self.migrate_raw_doc(raw) {
                Ok(doc) => processed.push(doc),
                Err(e) => {
                    warn!(raw_id = %id, error = %e, "Raw document migration aborted");
                    return Err(e);
                }
            }
            tokio::task::yield_now().await;
        }
        Ok(processed)
    }

    /// Migrates every document, quarantining failures instead of aborting.
    pub async fn migrate_raw_docs_non_throwing(&self, raw_docs: Vec<RawDoc>) -> MigrateRawDocsResult {
        let mut result = MigrateRawDocsResult {
            processed_docs: Vec::with_capacity(raw_docs.len()),
            ..MigrateRawDocsResult::default()
        };
        for raw in raw_docs {
            let id = raw.id.clone();
            match self.migrate_raw_doc(raw) {
                Ok(doc) => result.processed_docs.push(doc),
                Err(SavedObjectsError::CorruptSavedObject { .. }) => {
                    warn!(raw_id = %id, "Skipping corrupt saved object document");
                    result.failed_docs_ids.push(id);
                }
                Err(error) => {
                    warn!(raw_id = %id, error = %error, "Skipping document with failed transform");
                    result.transform_errors.push(TransformError { id, error });
                }
            }
            tokio::task::yield_now().await;
        }
        debug!(
            processed = result.processed_docs.len(),
            corrupt = result.failed_docs_ids.len(),
            transform_errors = result.transform_errors.len(),
            "Raw documents migrated"
        );
        result
    }
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod migration_tests;

//! Saved objects repository.
//!
//! Wires the store client, type registry, preflight, migration and the
//! optional encryption/security extensions together and exposes them
//! through [`SavedObjectsClient`].

mod bulk_update;
mod get;
mod update;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use saved_objects_sdk::{
    Attributes, BulkGetObject, BulkResult, BulkUpdateObject, BulkUpdateOptions, GetOptions,
    SavedObject, SavedObjectsClient, SavedObjectsError, UpdateOptions,
};

use super::encryption::{EncryptionExtension, EncryptionHelper};
use super::migration::{DocumentMigrator, MigrateRawDocsResult, MigrationHelper};
use super::preflight::PreflightCheckHelper;
use super::security::SecurityExtension;
use super::serializer::{RawDoc, SavedObjectsSerializer};
use super::type_registry::{NamespaceType, SavedObjectTypeRegistry};
use crate::config::SavedObjectsConfig;
use crate::infra::store::StoreClient;

pub use update::execute_update_retry_on_conflict;

pub struct SavedObjectsRepository {
    client: Arc<dyn StoreClient>,
    registry: Arc<SavedObjectTypeRegistry>,
    serializer: SavedObjectsSerializer,
    preflight: PreflightCheckHelper,
    migration: MigrationHelper,
    encryption: EncryptionHelper,
    security: Option<Arc<dyn SecurityExtension>>,
    config: SavedObjectsConfig,
    allowed_types: BTreeSet<String>,
}

impl SavedObjectsRepository {
    #[must_use]
    pub fn builder(
        client: Arc<dyn StoreClient>,
        registry: Arc<SavedObjectTypeRegistry>,
    ) -> SavedObjectsRepositoryBuilder {
        SavedObjectsRepositoryBuilder {
            client,
            registry,
            config: SavedObjectsConfig::default(),
            encryption: None,
            security: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SavedObjectsConfig {
        &self.config
    }

    /// Visible types plus the configured hidden ones that are registered.
    #[must_use]
    pub fn allowed_types(&self) -> &BTreeSet<String> {
        &self.allowed_types
    }

    fn is_allowed_type(&self, object_type: &str) -> bool {
        self.allowed_types.contains(object_type)
    }

    fn namespace_type(&self, object_type: &str) -> Result<NamespaceType, SavedObjectsError> {
        self.registry.namespace_type(object_type).ok_or_else(|| {
            SavedObjectsError::Internal(format!("type '{object_type}' is not registered"))
        })
    }

    /// Migrates raw documents, failing on the first invalid one.
    ///
    /// # Errors
    ///
    /// `CorruptSavedObject` or `DocumentTransform`.
    pub async fn migrate_raw_docs(&self, raw_docs: Vec<RawDoc>) -> Result<Vec<RawDoc>, SavedObjectsError> {
        self.migration.migrate_raw_docs(raw_docs).await
    }

    /// Migrates raw documents, reporting invalid ones instead of failing.
    pub async fn migrate_raw_docs_non_throwing(&self, raw_docs: Vec<RawDoc>) -> MigrateRawDocsResult {
        self.migration.migrate_raw_docs_non_throwing(raw_docs).await
    }
}

pub struct SavedObjectsRepositoryBuilder {
    client: Arc<dyn StoreClient>,
    registry: Arc<SavedObjectTypeRegistry>,
    config: SavedObjectsConfig,
    encryption: Option<Arc<dyn EncryptionExtension>>,
    security: Option<Arc<dyn SecurityExtension>>,
}

impl SavedObjectsRepositoryBuilder {
    #[must_use]
    pub fn with_config(mut self, config: SavedObjectsConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_encryption(mut self, extension: Arc<dyn EncryptionExtension>) -> Self {
        self.encryption = Some(extension);
        self
    }

    #[must_use]
    pub fn with_security(mut self, extension: Arc<dyn SecurityExtension>) -> Self {
        self.security = Some(extension);
        self
    }

    #[must_use]
    pub fn build(self) -> SavedObjectsRepository {
        let mut allowed_types: BTreeSet<String> =
            self.registry.visible_types().map(str::to_owned).collect();
        allowed_types.extend(
            self.config
                .included_hidden_types
                .iter()
                .filter(|name| self.registry.get_type(name).is_some())
                .cloned(),
        );
        let serializer = SavedObjectsSerializer::new(self.registry.clone());
        let migration = MigrationHelper::new(
            serializer.clone(),
            DocumentMigrator::new(self.registry.clone()),
        );
        SavedObjectsRepository {
            preflight: PreflightCheckHelper::new(self.client.clone(), self.config.index.clone()),
            encryption: EncryptionHelper::new(self.encryption, self.security.clone()),
            client: self.client,
            registry: self.registry,
            serializer,
            migration,
            security: self.security,
            config: self.config,
            allowed_types,
        }
    }
}

#[async_trait]
impl SavedObjectsClient for SavedObjectsRepository {
    async fn get(
        &self,
        object_type: &str,
        id: &str,
        options: &GetOptions,
    ) -> Result<SavedObject, SavedObjectsError> {
        self.perform_get(object_type, id, options).await
    }

    async fn bulk_get(
        &self,
        objects: Vec<BulkGetObject>,
        options: &GetOptions,
    ) -> Result<BulkResult, SavedObjectsError> {
        self.perform_bulk_get(objects, options).await
    }

    async fn update(
        &self,
        object_type: &str,
        id: &str,
        attributes: Attributes,
        options: UpdateOptions,
    ) -> Result<SavedObject, SavedObjectsError> {
        self.perform_update(object_type, id, attributes, options).await
    }

    async fn bulk_update(
        &self,
        objects: Vec<BulkUpdateObject>,
        options: BulkUpdateOptions,
    ) -> Result<BulkResult, SavedObjectsError> {
        self.perform_bulk_update(objects, options).await
    }
}

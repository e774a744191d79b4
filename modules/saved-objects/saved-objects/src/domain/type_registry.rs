//! Registered saved object types and their namespace semantics.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::serializer::SavedObjectDoc;

/// How a type relates to namespaces (spaces). Fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamespaceType {
    /// Lives in exactly one namespace, encoded in its raw id.
    Single,
    /// Shared across namespaces through the `namespaces` field.
    Multiple,
    /// Stored like `Multiple` but never shared beyond one namespace.
    MultipleIsolated,
    /// Exists outside of any namespace.
    Agnostic,
}

impl NamespaceType {
    #[must_use]
    pub fn is_single(self) -> bool {
        self == Self::Single
    }

    #[must_use]
    pub fn is_multi(self) -> bool {
        matches!(self, Self::Multiple | Self::MultipleIsolated)
    }

    #[must_use]
    pub fn is_agnostic(self) -> bool {
        self == Self::Agnostic
    }
}

/// Transform moving a document from the previous model version to this one.
pub type ModelVersionTransform =
    Arc<dyn Fn(SavedObjectDoc) -> anyhow::Result<SavedObjectDoc> + Send + Sync>;

#[derive(Clone)]
pub struct ModelVersion {
    pub version: u32,
    pub transform: ModelVersionTransform,
}

impl fmt::Debug for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelVersion")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct SavedObjectType {
    pub name: String,
    pub namespace_type: NamespaceType,
    pub hidden: bool,
    model_versions: Vec<ModelVersion>,
}

impl SavedObjectType {
    #[must_use]
    pub fn new(name: impl Into<String>, namespace_type: NamespaceType) -> Self {
        Self {
            name: name.into(),
            namespace_type,
            hidden: false,
            model_versions: Vec::new(),
        }
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Adds a model version; versions are kept sorted ascending.
    #[must_use]
    pub fn with_model_version<F>(mut self, version: u32, transform: F) -> Self
    where
        F: Fn(SavedObjectDoc) -> anyhow::Result<SavedObjectDoc> + Send + Sync + 'static,
    {
        self.model_versions.push(ModelVersion {
            version,
            transform: Arc::new(transform),
        });
        self.model_versions.sort_by_key(|model| model.version);
        self
    }

    #[must_use]
    pub fn model_versions(&self) -> &[ModelVersion] {
        &self.model_versions
    }

    /// Highest registered model version, 0 when the type has none.
    #[must_use]
    pub fn latest_model_version(&self) -> u32 {
        self.model_versions.last().map_or(0, |model| model.version)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeRegistryError {
    #[error("Saved object type '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Saved object type '{name}' declares model version {version} more than once")]
    DuplicateModelVersion { name: String, version: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct SavedObjectTypeRegistry {
    types: BTreeMap<String, SavedObjectType>,
}

impl SavedObjectTypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or a model version repeats.
    pub fn register(&mut self, object_type: SavedObjectType) -> Result<(), TypeRegistryError> {
        if self.types.contains_key(&object_type.name) {
            return Err(TypeRegistryError::AlreadyRegistered(object_type.name));
        }
        let versions = object_type.model_versions();
        if let Some(pair) = versions.windows(2).find(|pair| pair[0].version == pair[1].version) {
            return Err(TypeRegistryError::DuplicateModelVersion {
                name: object_type.name.clone(),
                version: pair[0].version,
            });
        }
        self.types.insert(object_type.name.clone(), object_type);
        Ok(())
    }

    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<&SavedObjectType> {
        self.types.get(name)
    }

    #[must_use]
    pub fn namespace_type(&self, name: &str) -> Option<NamespaceType> {
        self.types.get(name).map(|t| t.namespace_type)
    }

    #[must_use]
    pub fn is_single_namespace(&self, name: &str) -> bool {
        self.namespace_type(name).is_some_and(NamespaceType::is_single)
    }

    #[must_use]
    pub fn is_multi_namespace(&self, name: &str) -> bool {
        self.namespace_type(name).is_some_and(NamespaceType::is_multi)
    }

    #[must_use]
    pub fn is_namespace_agnostic(&self, name: &str) -> bool {
        self.namespace_type(name).is_some_and(NamespaceType::is_agnostic)
    }

    #[must_use]
    pub fn is_hidden(&self, name: &str) -> bool {
        self.types.get(name).is_some_and(|t| t.hidden)
    }

    /// Names of registered types that are not hidden.
    #[must_use]
    pub fn visible_types(&self) -> impl Iterator<Item = &str> {
        self.types
            .values()
            .filter(|t| !t.hidden)
            .map(|t| t.name.as_str())
    }
}

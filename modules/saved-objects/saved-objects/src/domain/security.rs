//! Authorization seam for updates and namespace redaction of results.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use saved_objects_sdk::{SavedObject, SavedObjectsError};

use super::namespace::{ALL_NAMESPACES_STRING, UNKNOWN_SPACE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    FullyAuthorized,
    PartiallyAuthorized,
    Unauthorized,
}

/// What the caller may do with one type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeAuthorization {
    pub is_globally_authorized: bool,
    pub authorized_spaces: BTreeSet<String>,
}

impl TypeAuthorization {
    #[must_use]
    pub fn globally() -> Self {
        Self {
            is_globally_authorized: true,
            authorized_spaces: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn in_spaces<I, S>(spaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            is_globally_authorized: false,
            authorized_spaces: spaces.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn allows(&self, space: &str) -> bool {
        self.is_globally_authorized || self.authorized_spaces.contains(space)
    }
}

/// Per-type authorization for the `bulk_update` action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationTypeMap {
    types: HashMap<String, TypeAuthorization>,
}

impl AuthorizationTypeMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_type(mut self, object_type: impl Into<String>, auth: TypeAuthorization) -> Self {
        self.types.insert(object_type.into(), auth);
        self
    }

    #[must_use]
    pub fn get(&self, object_type: &str) -> Option<&TypeAuthorization> {
        self.types.get(object_type)
    }

    /// Whether `object_type` may be updated in `space`.
    #[must_use]
    pub fn is_authorized(&self, object_type: &str, space: &str) -> bool {
        self.get(object_type).is_some_and(|auth| auth.allows(space))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResult {
    pub status: AuthorizationStatus,
    pub type_map: AuthorizationTypeMap,
}

/// One object submitted for update authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeUpdateObject {
    pub object_type: String,
    pub id: String,
    /// Namespace the update targets, when it overrides the caller's.
    pub object_namespace: Option<String>,
    /// Spaces the stored object currently belongs to; empty unless the type
    /// is multi-namespace and the object was found.
    pub existing_namespaces: Vec<String>,
}

#[async_trait]
pub trait SecurityExtension: Send + Sync {
    /// Authorizes an update of `objects` from `namespace`.
    ///
    /// # Errors
    ///
    /// Must return an error when `objects` is empty.
    async fn authorize_bulk_update(
        &self,
        namespace: Option<&str>,
        objects: &[AuthorizeUpdateObject],
    ) -> Result<AuthorizationResult, SavedObjectsError>;

    /// Hides spaces the caller is not authorized to see.
    fn redact_namespaces(&self, object: SavedObject, type_map: &AuthorizationTypeMap) -> SavedObject {
        redact_namespaces(object, type_map)
    }
}

/// Replaces each unauthorized space with [`UNKNOWN_SPACE`], sorted last.
#[must_use]
pub fn redact_namespaces(mut object: SavedObject, type_map: &AuthorizationTypeMap) -> SavedObject {
    let Some(namespaces) = object.namespaces.take() else {
        return object;
    };
    let auth = type_map.get(&object.object_type);
    if auth.is_some_and(|auth| auth.is_globally_authorized) {
        object.namespaces = Some(namespaces);
        return object;
    }
    let (mut visible, hidden): (Vec<String>, Vec<String>) =
        namespaces.into_iter().partition(|space| {
            space == ALL_NAMESPACES_STRING || auth.is_some_and(|auth| auth.allows(space))
        });
    visible.extend(hidden.into_iter().map(|_| UNKNOWN_SPACE.to_owned()));
    object.namespaces = Some(visible);
    object
}

//! Namespace (space) conventions.
//!
//! The default namespace is `None` as an id and `"default"` as a string.

use saved_objects_sdk::SavedObjectsError;
use serde_json::Value;

use super::serializer::RawDoc;
use super::type_registry::NamespaceType;

pub const DEFAULT_NAMESPACE_STRING: &str = "default";
pub const ALL_NAMESPACES_STRING: &str = "*";
/// Placeholder for a space the caller is not allowed to see.
pub const UNKNOWN_SPACE: &str = "?";

fn empty_namespace() -> SavedObjectsError {
    SavedObjectsError::bad_request("namespace cannot be an empty string")
}

/// Converts a namespace id into its string form.
///
/// # Errors
///
/// Returns `BadRequest` for the empty string.
pub fn namespace_id_to_string(namespace: Option<&str>) -> Result<String, SavedObjectsError> {
    match namespace {
        Some("") => Err(empty_namespace()),
        Some(namespace) => Ok(namespace.to_owned()),
        None => Ok(DEFAULT_NAMESPACE_STRING.to_owned()),
    }
}

/// Converts a namespace string into its id form.
///
/// # Errors
///
/// Returns `BadRequest` for the empty string.
pub fn namespace_string_to_id(namespace: &str) -> Result<Option<String>, SavedObjectsError> {
    match namespace {
        "" => Err(empty_namespace()),
        DEFAULT_NAMESPACE_STRING => Ok(None),
        namespace => Ok(Some(namespace.to_owned())),
    }
}

/// Normalizes a caller-supplied namespace so that `"default"` becomes `None`.
///
/// # Errors
///
/// Returns `BadRequest` for the empty string.
pub fn normalize_namespace(namespace: Option<&str>) -> Result<Option<String>, SavedObjectsError> {
    namespace.map_or(Ok(None), namespace_string_to_id)
}

/// Whether a fetched raw document is visible from `namespace`.
///
/// Only multi-namespace types need the check: single-namespace ids embed
/// their namespace and agnostic types are visible everywhere.
#[must_use]
pub fn raw_doc_exists_in_namespace(
    namespace_type: NamespaceType,
    raw: &RawDoc,
    namespace: Option<&str>,
) -> bool {
    if !namespace_type.is_multi() {
        return true;
    }
    let namespace_string = namespace.unwrap_or(DEFAULT_NAMESPACE_STRING);
    raw.source
        .get("namespaces")
        .and_then(Value::as_array)
        .is_some_and(|namespaces| {
            namespaces.iter().filter_map(Value::as_str).any(|candidate| {
                candidate == namespace_string || candidate == ALL_NAMESPACES_STRING
            })
        })
}

/// Namespaces stored in a raw document.
///
/// Falls back to the single `namespace` field, then the default namespace.
#[must_use]
pub fn namespaces_from_raw(raw: &RawDoc) -> Vec<String> {
    if let Some(namespaces) = raw.source.get("namespaces").and_then(Value::as_array) {
        return namespaces
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect();
    }
    let namespace = raw
        .source
        .get("namespace")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_NAMESPACE_STRING);
    vec![namespace.to_owned()]
}

/// Namespaces reported on an object written without a fetched document.
///
/// # Errors
///
/// Returns `BadRequest` for the empty string.
pub fn saved_object_namespaces(
    namespace_type: NamespaceType,
    namespace: Option<&str>,
) -> Result<Option<Vec<String>>, SavedObjectsError> {
    if namespace_type.is_agnostic() {
        return Ok(None);
    }
    Ok(Some(vec![namespace_id_to_string(namespace)?]))
}

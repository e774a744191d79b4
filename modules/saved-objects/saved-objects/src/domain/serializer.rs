//! Conversion between logical saved objects and raw store documents.
//!
//! A raw document keeps attributes under a key named after the type:
//!
//! ```text
//! { "_id": "marketing:config:c1",
//!   "_source": { "type": "config", "namespace": "marketing",
//!                "config": { ... }, "references": [], "updated_at": "..." } }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use saved_objects_sdk::{Attributes, SavedObject, SavedObjectReference, SavedObjectsError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::namespace::{DEFAULT_NAMESPACE_STRING, namespace_id_to_string};
use super::type_registry::{NamespaceType, SavedObjectTypeRegistry};
use super::version::{decode_version, encode_hit_version};

/// A document as stored in the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDoc {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(rename = "_seq_no", default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<i64>,
    #[serde(rename = "_primary_term", default, skip_serializing_if = "Option::is_none")]
    pub primary_term: Option<i64>,
    #[serde(rename = "_source")]
    pub source: Map<String, Value>,
}

impl RawDoc {
    #[must_use]
    pub fn source_type(&self) -> Option<&str> {
        self.source.get("type").and_then(Value::as_str)
    }
}

/// Logical document with store metadata, the unit migrations operate on.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedObjectDoc {
    pub id: String,
    pub object_type: String,
    pub namespace: Option<String>,
    pub namespaces: Option<Vec<String>>,
    pub attributes: Attributes,
    pub references: Vec<SavedObjectReference>,
    pub updated_at: Option<String>,
    pub origin_id: Option<String>,
    pub version: Option<String>,
    pub type_migration_version: Option<String>,
    /// Source fields without a dedicated slot, written back unchanged.
    pub extra: Map<String, Value>,
}

impl SavedObjectDoc {
    /// Converts into the caller-facing object.
    ///
    /// Non-agnostic objects always report at least one namespace.
    #[must_use]
    pub fn into_saved_object(self, namespace_type: NamespaceType) -> SavedObject {
        let namespaces = if namespace_type.is_agnostic() {
            None
        } else {
            Some(self.namespaces.unwrap_or_else(|| {
                vec![
                    self.namespace
                        .clone()
                        .unwrap_or_else(|| DEFAULT_NAMESPACE_STRING.to_owned()),
                ]
            }))
        };
        SavedObject {
            object_type: self.object_type,
            id: self.id,
            attributes: self.attributes,
            references: self.references,
            namespaces,
            version: self.version,
            updated_at: self
                .updated_at
                .as_deref()
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                .map(|ts| ts.with_timezone(&Utc)),
            origin_id: self.origin_id,
        }
    }
}

/// Derives the store id for `(namespace, type, id)`.
///
/// Only single-namespace types outside the default namespace carry a
/// namespace prefix.
#[must_use]
pub fn generate_raw_id(
    namespace_type: NamespaceType,
    namespace: Option<&str>,
    object_type: &str,
    id: &str,
) -> String {
    match namespace {
        Some(namespace) if namespace_type.is_single() => format!("{namespace}:{object_type}:{id}"),
        _ => format!("{object_type}:{id}"),
    }
}

#[derive(Debug, Clone)]
pub struct SavedObjectsSerializer {
    registry: Arc<SavedObjectTypeRegistry>,
}

impl SavedObjectsSerializer {
    #[must_use]
    pub fn new(registry: Arc<SavedObjectTypeRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn is_raw_saved_object(&self, raw: &RawDoc) -> bool {
        self.check_is_raw_saved_object(raw).is_ok()
    }

    /// Structural validation with the reason a document was rejected.
    ///
    /// # Errors
    ///
    /// Returns a description of the first failed check.
    pub fn check_is_raw_saved_object(&self, raw: &RawDoc) -> Result<(), String> {
        let Some(object_type) = raw.source_type() else {
            return Err(format!("Raw document '{}' is missing _source.type field", raw.id));
        };
        let Some(namespace_type) = self.registry.namespace_type(object_type) else {
            return Err(format!(
                "Raw document '{}' has unregistered type '{object_type}'",
                raw.id
            ));
        };
        let prefix = id_prefix(namespace_type, raw_namespace(raw), object_type);
        if !raw.id.starts_with(&prefix) || raw.id.len() == prefix.len() {
            return Err(format!(
                "Raw document '{}' does not start with expected prefix '{prefix}'",
                raw.id
            ));
        }
        if !raw.source.contains_key(object_type) {
            return Err(format!("Raw document '{}' is missing '{object_type}' field", raw.id));
        }
        Ok(())
    }

    /// Converts a raw document into its logical form.
    ///
    /// # Errors
    ///
    /// Returns `CorruptSavedObject` when the document fails validation.
    pub fn raw_to_saved_object(&self, raw: RawDoc) -> Result<SavedObjectDoc, SavedObjectsError> {
        if self.check_is_raw_saved_object(&raw).is_err() {
            return Err(SavedObjectsError::CorruptSavedObject { id: raw.id });
        }
        let RawDoc {
            id: raw_id,
            seq_no,
            primary_term,
            mut source,
            ..
        } = raw;
        let object_type = take_string(&mut source, "type").unwrap_or_default();
        let namespace_type = self
            .registry
            .namespace_type(&object_type)
            .unwrap_or(NamespaceType::Single);
        let namespace = take_string(&mut source, "namespace").filter(|_| namespace_type.is_single());
        let prefix = id_prefix(namespace_type, namespace.as_deref(), &object_type);
        let id = raw_id
            .strip_prefix(&prefix)
            .unwrap_or(&raw_id)
            .to_owned();

        let attributes = match source.remove(&object_type) {
            Some(Value::Object(attributes)) => attributes,
            _ => Attributes::new(),
        };
        let references = source
            .remove("references")
            .and_then(|refs| serde_json::from_value(refs).ok())
            .unwrap_or_default();
        let namespaces = source
            .remove("namespaces")
            .and_then(|value| serde_json::from_value(value).ok());
        let updated_at = take_string(&mut source, "updated_at");
        let origin_id = take_string(&mut source, "originId");
        let type_migration_version = take_string(&mut source, "typeMigrationVersion");

        Ok(SavedObjectDoc {
            id,
            object_type,
            namespace,
            namespaces,
            attributes,
            references,
            updated_at,
            origin_id,
            version: encode_hit_version(seq_no, primary_term),
            type_migration_version,
            extra: source,
        })
    }

    /// Converts a logical document into its raw form.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` when the document carries an undecodable version.
    pub fn saved_object_to_raw(&self, doc: SavedObjectDoc) -> Result<RawDoc, SavedObjectsError> {
        let namespace_type = self
            .registry
            .namespace_type(&doc.object_type)
            .unwrap_or(NamespaceType::Single);
        let (seq_no, primary_term) = match doc.version.as_deref() {
            Some(version) => {
                let (seq_no, primary_term) = decode_version(version)?;
                (Some(seq_no), Some(primary_term))
            }
            None => (None, None),
        };

        let mut source = doc.extra;
        source.insert("type".to_owned(), Value::String(doc.object_type.clone()));
        if namespace_type.is_single()
            && let Some(namespace) = &doc.namespace
        {
            source.insert("namespace".to_owned(), Value::String(namespace.clone()));
        }
        if namespace_type.is_multi() {
            let namespaces = match doc.namespaces {
                Some(namespaces) => namespaces,
                None => vec![namespace_id_to_string(doc.namespace.as_deref())?],
            };
            source.insert("namespaces".to_owned(), Value::from(namespaces));
        }
        source.insert(doc.object_type.clone(), Value::Object(doc.attributes));
        source.insert(
            "references".to_owned(),
            serde_json::to_value(&doc.references)
                .map_err(|e| SavedObjectsError::Internal(e.to_string()))?,
        );
        insert_opt(&mut source, "updated_at", doc.updated_at);
        insert_opt(&mut source, "originId", doc.origin_id);
        insert_opt(&mut source, "typeMigrationVersion", doc.type_migration_version);

        Ok(RawDoc {
            id: generate_raw_id(
                namespace_type,
                doc.namespace.as_deref(),
                &doc.object_type,
                &doc.id,
            ),
            index: None,
            seq_no,
            primary_term,
            source,
        })
    }
}

fn raw_namespace(raw: &RawDoc) -> Option<&str> {
    raw.source.get("namespace").and_then(Value::as_str)
}

fn id_prefix(namespace_type: NamespaceType, namespace: Option<&str>, object_type: &str) -> String {
    generate_raw_id(namespace_type, namespace, object_type, "")
}

fn take_string(source: &mut Map<String, Value>, key: &str) -> Option<String> {
    match source.remove(key) {
        Some(Value::String(value)) => Some(value),
        _ => None,
    }
}

fn insert_opt(source: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        source.insert(key.to_owned(), Value::String(value));
    }
}

#[cfg(test)]
#[path = "serializer_tests.rs"]
mod serializer_tests;

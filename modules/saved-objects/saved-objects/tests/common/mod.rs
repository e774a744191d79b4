#![allow(clippy::unwrap_used, clippy::expect_used, clippy::must_use_candidate, dead_code)]

//! Common fixtures for saved objects integration tests

use std::sync::Arc;

use saved_objects::domain::version::encode_version;
use saved_objects::{
    Attributes, MemoryStore, MemoryStoreOptions, NamespaceType, SavedObjectType,
    SavedObjectTypeRegistry, SavedObjectsRepository, SavedObjectsRepositoryBuilder,
};
use serde_json::{Map, Value, json};

pub const INDEX: &str = ".kibana";

/// `config` is single-namespace, `dashboard` is shared across spaces with
/// one model version, `space` is agnostic and hidden.
pub fn registry() -> Arc<SavedObjectTypeRegistry> {
    let mut registry = SavedObjectTypeRegistry::new();
    registry
        .register(SavedObjectType::new("config", NamespaceType::Single))
        .unwrap();
    registry
        .register(
            SavedObjectType::new("dashboard", NamespaceType::Multiple).with_model_version(
                1,
                |mut doc| {
                    doc.attributes.insert("migrated".to_owned(), json!(true));
                    Ok(doc)
                },
            ),
        )
        .unwrap();
    registry
        .register(SavedObjectType::new("space", NamespaceType::Agnostic).hidden())
        .unwrap();
    Arc::new(registry)
}

pub fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new(INDEX))
}

pub fn store_with(options: MemoryStoreOptions) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_options(INDEX, options))
}

/// A store behind a proxy that answers 404 without the product signature.
pub fn unsupported_store() -> Arc<MemoryStore> {
    store_with(MemoryStoreOptions {
        product_header: false,
        not_found_responses: true,
        ..MemoryStoreOptions::default()
    })
}

pub fn builder(store: &Arc<MemoryStore>) -> SavedObjectsRepositoryBuilder {
    SavedObjectsRepository::builder(store.clone(), registry())
}

pub fn repository(store: &Arc<MemoryStore>) -> SavedObjectsRepository {
    builder(store).build()
}

pub fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// Seeds a `config` object and returns its version.
pub fn seed_config(store: &MemoryStore, namespace: Option<&str>, id: &str, attributes: Value) -> String {
    let mut source = Map::new();
    source.insert("type".to_owned(), json!("config"));
    source.insert("config".to_owned(), attributes);
    source.insert("references".to_owned(), json!([]));
    source.insert("updated_at".to_owned(), json!("2024-01-01T00:00:00.000Z"));
    let raw_id = match namespace {
        Some(namespace) => {
            source.insert("namespace".to_owned(), json!(namespace));
            format!("{namespace}:config:{id}")
        }
        None => format!("config:{id}"),
    };
    let (seq_no, primary_term) = store.seed(raw_id, source);
    encode_version(seq_no, primary_term)
}

/// Seeds a `dashboard` object shared with `namespaces` and returns its version.
pub fn seed_dashboard(store: &MemoryStore, id: &str, namespaces: &[&str], attributes: Value) -> String {
    let source = attrs(json!({
        "type": "dashboard",
        "dashboard": attributes,
        "namespaces": namespaces,
        "references": [],
        "originId": format!("origin-{id}"),
        "updated_at": "2024-01-01T00:00:00.000Z",
    }));
    let (seq_no, primary_term) = store.seed(format!("dashboard:{id}"), source);
    encode_version(seq_no, primary_term)
}

/// Stored attributes of `raw_id` under its type key.
pub fn stored_attributes(store: &MemoryStore, raw_id: &str, object_type: &str) -> Value {
    store
        .document(raw_id)
        .and_then(|raw| raw.source.get(object_type).cloned())
        .unwrap_or(Value::Null)
}

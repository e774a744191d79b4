#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the bulk update orchestrator

mod common;

use common::{
    INDEX, attrs, builder, repository, seed_config, seed_dashboard, store, store_with,
    stored_attributes, unsupported_store,
};
use saved_objects::infra::store::{BulkOperation, StoreCallCounts};
use saved_objects::{
    BulkUpdateObject, BulkUpdateOptions, MemoryStoreOptions, Refresh, SavedObjectReference,
    SavedObjectsClient, SavedObjectsConfig, SavedObjectsError,
};
use serde_json::{Value, json};

fn in_namespace(namespace: &str) -> BulkUpdateOptions {
    BulkUpdateOptions {
        namespace: Some(namespace.to_owned()),
        ..BulkUpdateOptions::default()
    }
}

// =============================================================================
// Ordering and partial failure
// =============================================================================

#[tokio::test]
async fn test_results_keep_request_order_with_mixed_failures() {
    let store = store();
    let config_version = seed_config(&store, None, "c1", json!({ "title": "old", "keep": 1 }));
    seed_dashboard(&store, "d1", &["default"], json!({ "title": "board" }));
    let repo = repository(&store);

    let results = repo
        .bulk_update(
            vec![
                BulkUpdateObject::new("config", "c1", attrs(json!({ "title": "new" }))),
                BulkUpdateObject::new("dashboard", "missing", attrs(json!({ "title": "x" }))),
                BulkUpdateObject::new("widget", "w1", attrs(json!({}))),
                BulkUpdateObject::new("config", "", attrs(json!({}))),
                BulkUpdateObject::new("dashboard", "d1", attrs(json!({ "title": "renamed" }))),
                BulkUpdateObject::new("config", "c2", attrs(json!({}))).with_version("bogus"),
            ],
            BulkUpdateOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 6);

    let config = results[0].as_ref().unwrap();
    assert_eq!(config.id, "c1");
    assert_eq!(config.attributes, attrs(json!({ "title": "new" })));
    assert_eq!(config.namespaces, Some(vec!["default".to_owned()]));
    assert!(config.version.is_some());
    assert_ne!(config.version.as_deref(), Some(config_version.as_str()));
    assert!(config.updated_at.is_some());

    let missing = results[1].as_ref().unwrap_err();
    assert_eq!(missing.id, "missing");
    assert!(missing.error.is_not_found());

    let unsupported = results[2].as_ref().unwrap_err();
    assert_eq!(
        unsupported.error,
        SavedObjectsError::bad_request("Unsupported saved object type: 'widget'")
    );

    let empty_id = results[3].as_ref().unwrap_err();
    assert_eq!(empty_id.error, SavedObjectsError::bad_request("id cannot be empty"));

    let dashboard = results[4].as_ref().unwrap();
    assert_eq!(dashboard.namespaces, Some(vec!["default".to_owned()]));
    assert_eq!(dashboard.origin_id.as_deref(), Some("origin-d1"));

    let bad_version = results[5].as_ref().unwrap_err();
    assert_eq!(
        bad_version.error,
        SavedObjectsError::bad_request("Invalid version [bogus]")
    );

    // Only the two valid, existing objects reach the store.
    let counts = store.call_counts();
    assert_eq!(counts.mget, 1);
    assert_eq!(counts.bulk, 1);
    assert_eq!(store.bulk_requests()[0].operations.len(), 2);

    assert_eq!(
        stored_attributes(&store, "config:c1", "config"),
        json!({ "title": "new", "keep": 1 })
    );
}

#[tokio::test]
async fn test_all_invalid_batch_makes_no_store_calls() {
    let store = store();
    let repo = repository(&store);

    let results = repo
        .bulk_update(
            vec![
                BulkUpdateObject::new("widget", "w1", attrs(json!({}))),
                BulkUpdateObject::new("config", "", attrs(json!({}))),
            ],
            BulkUpdateOptions::default(),
        )
        .await
        .unwrap();

    assert!(results.iter().all(Result::is_err));
    assert_eq!(store.call_counts(), StoreCallCounts::default());
}

#[tokio::test]
async fn test_empty_batch_returns_empty_result() {
    let store = store();
    let repo = repository(&store);

    let results = repo
        .bulk_update(Vec::new(), BulkUpdateOptions::default())
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(store.call_counts(), StoreCallCounts::default());
}

// =============================================================================
// Namespaces
// =============================================================================

#[tokio::test]
async fn test_single_namespace_object_is_invisible_from_other_namespace() {
    let store = store();
    seed_config(&store, Some("a"), "c1", json!({ "title": "a" }));
    let repo = repository(&store);

    let from_b = repo
        .bulk_update(
            vec![BulkUpdateObject::new("config", "c1", attrs(json!({ "title": "b" })))],
            in_namespace("b"),
        )
        .await
        .unwrap();
    assert!(from_b[0].as_ref().unwrap_err().error.is_not_found());
    assert!(store.document("b:config:c1").is_none());
    assert_eq!(stored_attributes(&store, "a:config:c1", "config"), json!({ "title": "a" }));

    let from_a = repo
        .bulk_update(
            vec![BulkUpdateObject::new("config", "c1", attrs(json!({ "title": "updated" })))],
            in_namespace("a"),
        )
        .await
        .unwrap();
    let updated = from_a[0].as_ref().unwrap();
    assert_eq!(updated.namespaces, Some(vec!["a".to_owned()]));
    assert_eq!(
        stored_attributes(&store, "a:config:c1", "config"),
        json!({ "title": "updated" })
    );

    // Single-namespace types never need a preflight fetch.
    assert_eq!(store.call_counts().mget, 0);
}

#[tokio::test]
async fn test_multi_namespace_object_outside_namespace_is_not_found() {
    let store = store();
    seed_dashboard(&store, "d1", &["a"], json!({ "title": "board" }));
    let repo = repository(&store);

    let results = repo
        .bulk_update(
            vec![BulkUpdateObject::new("dashboard", "d1", attrs(json!({ "title": "x" })))],
            in_namespace("b"),
        )
        .await
        .unwrap();

    assert!(results[0].as_ref().unwrap_err().error.is_not_found());
    assert_eq!(store.call_counts().bulk, 0);
    assert_eq!(
        stored_attributes(&store, "dashboard:d1", "dashboard"),
        json!({ "title": "board" })
    );
}

#[tokio::test]
async fn test_multi_namespace_result_reports_stored_namespaces() {
    let store = store();
    seed_dashboard(&store, "d1", &["a", "b"], json!({ "title": "board" }));
    let repo = repository(&store);

    let results = repo
        .bulk_update(
            vec![BulkUpdateObject::new("dashboard", "d1", attrs(json!({ "title": "x" })))],
            in_namespace("b"),
        )
        .await
        .unwrap();

    let updated = results[0].as_ref().unwrap();
    assert_eq!(updated.namespaces, Some(vec!["a".to_owned(), "b".to_owned()]));

    let mget = &store.mget_requests()[0];
    assert_eq!(mget.docs[0].id, "dashboard:d1");
    assert_eq!(
        mget.docs[0].source_includes,
        Some(vec!["type".to_owned(), "namespaces".to_owned(), "namespace".to_owned()])
    );
}

#[tokio::test]
async fn test_object_namespace_overrides_batch_namespace() {
    let store = store();
    seed_config(&store, Some("a"), "c1", json!({}));
    let repo = repository(&store);

    let results = repo
        .bulk_update(
            vec![
                BulkUpdateObject::new("config", "c1", attrs(json!({ "v": 1 }))).with_namespace("a"),
                BulkUpdateObject::new("config", "c1", attrs(json!({ "v": 2 })))
                    .with_namespace("*"),
            ],
            in_namespace("b"),
        )
        .await
        .unwrap();

    assert_eq!(results[0].as_ref().unwrap().namespaces, Some(vec!["a".to_owned()]));
    assert_eq!(
        results[1].as_ref().unwrap_err().error,
        SavedObjectsError::bad_request("\"namespace\" cannot be \"*\"")
    );
}

#[tokio::test]
async fn test_empty_batch_namespace_is_rejected() {
    let store = store();
    let repo = repository(&store);

    let err = repo
        .bulk_update(
            vec![BulkUpdateObject::new("config", "c1", attrs(json!({})))],
            in_namespace(""),
        )
        .await
        .unwrap_err();

    assert!(err.is_bad_request());
    assert_eq!(store.call_counts(), StoreCallCounts::default());
}

#[tokio::test]
async fn test_hidden_type_requires_inclusion() {
    let store = store();
    let _seeded = store.seed(
        "space:s1",
        attrs(json!({ "type": "space", "space": { "name": "Ops" } })),
    );

    let default_repo = repository(&store);
    let results = default_repo
        .bulk_update(
            vec![BulkUpdateObject::new("space", "s1", attrs(json!({ "name": "Ops 2" })))],
            BulkUpdateOptions::default(),
        )
        .await
        .unwrap();
    assert!(results[0].as_ref().unwrap_err().error.is_bad_request());

    let repo = builder(&store)
        .with_config(SavedObjectsConfig {
            included_hidden_types: vec!["space".to_owned()],
            ..SavedObjectsConfig::default()
        })
        .build();
    let results = repo
        .bulk_update(
            vec![BulkUpdateObject::new("space", "s1", attrs(json!({ "name": "Ops 2" })))],
            in_namespace("a"),
        )
        .await
        .unwrap();

    // Agnostic types ignore the namespace entirely.
    let space = results[0].as_ref().unwrap();
    assert_eq!(space.namespaces, None);
    assert_eq!(stored_attributes(&store, "space:s1", "space"), json!({ "name": "Ops 2" }));
}

// =============================================================================
// Versions
// =============================================================================

#[tokio::test]
async fn test_version_preconditions_are_forwarded() {
    let store = store();
    let version = seed_config(&store, None, "c1", json!({ "n": 0 }));
    let repo = repository(&store);

    let first = repo
        .bulk_update(
            vec![BulkUpdateObject::new("config", "c1", attrs(json!({ "n": 1 }))).with_version(&version)],
            BulkUpdateOptions::default(),
        )
        .await
        .unwrap();
    let next_version = first[0].as_ref().unwrap().version.clone().unwrap();
    assert_ne!(next_version, version);

    let BulkOperation::Update { header, .. } = &store.bulk_requests()[0].operations[0] else {
        panic!("expected an update operation");
    };
    assert_eq!(header.if_seq_no, Some(0));
    assert_eq!(header.if_primary_term, Some(1));

    let stale = repo
        .bulk_update(
            vec![BulkUpdateObject::new("config", "c1", attrs(json!({ "n": 2 }))).with_version(&version)],
            BulkUpdateOptions::default(),
        )
        .await
        .unwrap();
    let conflict = &stale[0].as_ref().unwrap_err().error;
    assert!(conflict.is_retryable_conflict());
    assert_eq!(stored_attributes(&store, "config:c1", "config"), json!({ "n": 1 }));
}

#[tokio::test]
async fn test_distinct_writes_produce_distinct_versions() {
    let store = store();
    seed_config(&store, None, "c1", json!({}));
    seed_config(&store, None, "c2", json!({}));
    let repo = repository(&store);

    let results = repo
        .bulk_update(
            vec![
                BulkUpdateObject::new("config", "c1", attrs(json!({ "n": 1 }))),
                BulkUpdateObject::new("config", "c2", attrs(json!({ "n": 2 }))),
            ],
            BulkUpdateOptions::default(),
        )
        .await
        .unwrap();

    let first = results[0].as_ref().unwrap().version.clone();
    let second = results[1].as_ref().unwrap().version.clone();
    assert!(first.is_some());
    assert_ne!(first, second);
}

// =============================================================================
// Request shape
// =============================================================================

#[tokio::test]
async fn test_bulk_request_shape() {
    let store = store();
    seed_config(&store, None, "c1", json!({}));
    let repo = repository(&store);
    let reference = SavedObjectReference {
        name: "panel_0".to_owned(),
        ref_type: "visualization".to_owned(),
        id: "v1".to_owned(),
    };

    let results = repo
        .bulk_update(
            vec![
                BulkUpdateObject::new("config", "c1", attrs(json!({ "title": "t" })))
                    .with_references(vec![reference.clone()]),
            ],
            BulkUpdateOptions {
                refresh: Some(Refresh::False),
                ..BulkUpdateOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(results[0].as_ref().unwrap().references, vec![reference]);

    let request = &store.bulk_requests()[0];
    assert_eq!(request.refresh, Refresh::False);
    assert!(request.require_alias);
    assert_eq!(request.source_includes, vec!["originId".to_owned()]);

    let BulkOperation::Update { header, doc } = &request.operations[0] else {
        panic!("expected an update operation");
    };
    assert_eq!(header.id, "config:c1");
    assert_eq!(header.index, INDEX);
    assert_eq!(header.if_seq_no, None);
    assert_eq!(doc.get("config"), Some(&json!({ "title": "t" })));
    assert!(doc.get("updated_at").and_then(Value::as_str).is_some());
    assert_eq!(doc.get("references").and_then(Value::as_array).map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_refresh_defaults_to_wait_for() {
    let store = store();
    seed_config(&store, None, "c1", json!({}));
    let repo = repository(&store);

    repo.bulk_update(
        vec![BulkUpdateObject::new("config", "c1", attrs(json!({})))],
        BulkUpdateOptions::default(),
    )
    .await
    .unwrap();

    let request = &store.bulk_requests()[0];
    assert_eq!(request.refresh, Refresh::WaitFor);
    let BulkOperation::Update { doc, .. } = &request.operations[0] else {
        panic!("expected an update operation");
    };
    assert!(!doc.contains_key("references"));
}

// =============================================================================
// Store failures
// =============================================================================

#[tokio::test]
async fn test_unsupported_server_fails_the_whole_call() {
    let store = unsupported_store();
    let repo = repository(&store);

    let single = repo
        .bulk_update(
            vec![BulkUpdateObject::new("config", "c1", attrs(json!({})))],
            BulkUpdateOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(single.is_es_unavailable());
    assert_eq!(store.call_counts().bulk, 1);

    let multi = repo
        .bulk_update(
            vec![BulkUpdateObject::new("dashboard", "d1", attrs(json!({})))],
            BulkUpdateOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(multi.is_es_unavailable());
    assert_eq!(store.call_counts().mget, 1);
    assert_eq!(store.call_counts().bulk, 1);
}

#[tokio::test]
async fn test_genuine_not_found_from_preflight_is_per_item() {
    let store = store_with(MemoryStoreOptions {
        not_found_responses: true,
        ..MemoryStoreOptions::default()
    });
    let repo = repository(&store);

    let results = repo
        .bulk_update(
            vec![BulkUpdateObject::new("dashboard", "d1", attrs(json!({})))],
            BulkUpdateOptions::default(),
        )
        .await
        .unwrap();

    assert!(results[0].as_ref().unwrap_err().error.is_not_found());
    assert_eq!(store.call_counts().bulk, 0);
}

#[tokio::test]
async fn test_transport_failure_aborts() {
    let store = store_with(MemoryStoreOptions {
        transport_failure: true,
        ..MemoryStoreOptions::default()
    });
    let repo = repository(&store);

    let err = repo
        .bulk_update(
            vec![BulkUpdateObject::new("config", "c1", attrs(json!({})))],
            BulkUpdateOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SavedObjectsError::Internal(_)));
}

#[tokio::test]
async fn test_missing_index_alias_is_internal() {
    let store = store();
    seed_config(&store, None, "c1", json!({}));
    let repo = builder(&store)
        .with_config(SavedObjectsConfig {
            index: ".missing".to_owned(),
            ..SavedObjectsConfig::default()
        })
        .build();

    let results = repo
        .bulk_update(
            vec![BulkUpdateObject::new("config", "c1", attrs(json!({})))],
            BulkUpdateOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        results[0].as_ref().unwrap_err().error,
        SavedObjectsError::Internal("Saved object index alias [.missing] not found".to_owned())
    );
}

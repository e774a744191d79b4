#![cfg_attr(coverage_nightly, coverage(off))]

use super::*;
use crate::domain::security::{
    AuthorizationResult, AuthorizeUpdateObject, TypeAuthorization,
};
use serde_json::{Value, json};

struct PrefixEncryption;

#[async_trait]
impl EncryptionExtension for PrefixEncryption {
    fn is_encryptable_type(&self, object_type: &str) -> bool {
        object_type == "action"
    }

    async fn encrypt_attributes(
        &self,
        _descriptor: &EncryptionDescriptor,
        mut attributes: Attributes,
    ) -> anyhow::Result<Attributes> {
        if let Some(Value::String(secret)) = attributes.get("secret").cloned() {
            attributes.insert("secret".to_owned(), json!(format!("enc:{secret}")));
        }
        Ok(attributes)
    }

    async fn decrypt_or_strip_result(
        &self,
        mut object: SavedObject,
        original_attributes: Option<&Attributes>,
    ) -> anyhow::Result<SavedObject> {
        if object.id == "broken" {
            anyhow::bail!("key rotated");
        }
        match original_attributes {
            Some(original) => object.attributes = original.clone(),
            None => {
                object.attributes.remove("secret");
            }
        }
        Ok(object)
    }
}

struct DenyAll;

#[async_trait]
impl SecurityExtension for DenyAll {
    async fn authorize_bulk_update(
        &self,
        _namespace: Option<&str>,
        _objects: &[AuthorizeUpdateObject],
    ) -> Result<AuthorizationResult, SavedObjectsError> {
        unreachable!("redaction only")
    }
}

fn object(object_type: &str, id: &str, attributes: Value) -> SavedObject {
    SavedObject {
        object_type: object_type.to_owned(),
        id: id.to_owned(),
        attributes: attributes.as_object().cloned().unwrap_or_default(),
        references: vec![],
        namespaces: Some(vec!["default".to_owned(), "ops".to_owned()]),
        version: None,
        updated_at: None,
        origin_id: None,
    }
}

fn descriptor(object_type: &str) -> EncryptionDescriptor {
    EncryptionDescriptor {
        object_type: object_type.to_owned(),
        id: "a1".to_owned(),
        namespace: None,
    }
}

#[tokio::test]
async fn without_extensions_helper_is_pass_through() {
    let helper = EncryptionHelper::default();
    let attributes = json!({ "secret": "s3cr3t" }).as_object().cloned().unwrap();
    let out = helper
        .optionally_encrypt_attributes(&descriptor("action"), attributes.clone())
        .await
        .unwrap();
    assert_eq!(out, attributes);

    let original = object("action", "a1", json!({ "secret": "x" }));
    let result = helper
        .optionally_decrypt_and_redact_single_result(original.clone(), None, None)
        .await
        .unwrap();
    assert_eq!(result, original);
}

#[tokio::test]
async fn only_encryptable_types_are_encrypted() {
    let helper = EncryptionHelper::new(Some(Arc::new(PrefixEncryption)), None);
    let attributes = json!({ "secret": "s3cr3t" }).as_object().cloned().unwrap();

    let encrypted = helper
        .optionally_encrypt_attributes(&descriptor("action"), attributes.clone())
        .await
        .unwrap();
    assert_eq!(encrypted["secret"], json!("enc:s3cr3t"));

    let plain = helper
        .optionally_encrypt_attributes(&descriptor("dashboard"), attributes.clone())
        .await
        .unwrap();
    assert_eq!(plain, attributes);
}

#[tokio::test]
async fn bulk_results_are_decrypted_redacted_and_isolated() {
    let helper = EncryptionHelper::new(Some(Arc::new(PrefixEncryption)), Some(Arc::new(DenyAll)));
    let type_map = AuthorizationTypeMap::new()
        .with_type("action", TypeAuthorization::in_spaces(["default"]));
    let original = json!({ "secret": "plain" }).as_object().cloned().unwrap();
    let results: BulkResult = vec![
        Ok(object("action", "a1", json!({ "secret": "enc:plain" }))),
        Err(BulkItemError::new("action", "a2", SavedObjectsError::not_found("action", "a2"))),
        Ok(object("action", "broken", json!({}))),
    ];

    let out = helper
        .optionally_decrypt_and_redact_bulk_result(
            results,
            Some(&type_map),
            &[Some(original.clone()), None, None],
        )
        .await;

    assert_eq!(out.len(), 3);
    let first = out[0].as_ref().unwrap();
    assert_eq!(first.attributes, original);
    assert_eq!(
        first.namespaces,
        Some(vec!["default".to_owned(), "?".to_owned()])
    );
    assert!(out[1].as_ref().unwrap_err().error.is_not_found());
    let broken = out[2].as_ref().unwrap_err();
    assert_eq!(broken.id, "broken");
    assert!(matches!(broken.error, SavedObjectsError::Internal(_)));
}

//! Encryption-at-rest seam.
//!
//! Only attribute payloads pass through the extension; ids, namespaces,
//! references and timestamps are stored as-is.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use saved_objects_sdk::{Attributes, BulkItemError, BulkResult, SavedObject, SavedObjectsError};
use tracing::error;

use super::security::{AuthorizationTypeMap, SecurityExtension};

/// Identifies the object whose attributes are being encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionDescriptor {
    pub object_type: String,
    pub id: String,
    pub namespace: Option<String>,
}

#[async_trait]
pub trait EncryptionExtension: Send + Sync {
    fn is_encryptable_type(&self, object_type: &str) -> bool;

    async fn encrypt_attributes(
        &self,
        descriptor: &EncryptionDescriptor,
        attributes: Attributes,
    ) -> anyhow::Result<Attributes>;

    /// Decrypts a result, or strips attributes that cannot be returned.
    ///
    /// `original_attributes` are the plaintext attributes of the request
    /// that produced `object`, when there was one.
    async fn decrypt_or_strip_result(
        &self,
        object: SavedObject,
        original_attributes: Option<&Attributes>,
    ) -> anyhow::Result<SavedObject>;
}

/// Applies the optional encryption and security extensions to payloads.
#[derive(Clone, Default)]
pub struct EncryptionHelper {
    encryption: Option<Arc<dyn EncryptionExtension>>,
    security: Option<Arc<dyn SecurityExtension>>,
}

impl EncryptionHelper {
    #[must_use]
    pub fn new(
        encryption: Option<Arc<dyn EncryptionExtension>>,
        security: Option<Arc<dyn SecurityExtension>>,
    ) -> Self {
        Self {
            encryption,
            security,
        }
    }

    /// # Errors
    ///
    /// Returns `Internal` when the extension fails to encrypt.
    pub async fn optionally_encrypt_attributes(
        &self,
        descriptor: &EncryptionDescriptor,
        attributes: Attributes,
    ) -> Result<Attributes, SavedObjectsError> {
        match &self.encryption {
            Some(ext) if ext.is_encryptable_type(&descriptor.object_type) => ext
                .encrypt_attributes(descriptor, attributes)
                .await
                .map_err(|e| {
                    error!(object_type = %descriptor.object_type, id = %descriptor.id, error = %e, "Attribute encryption failed");
                    SavedObjectsError::Internal(format!(
                        "Failed to encrypt attributes of [{}/{}]",
                        descriptor.object_type, descriptor.id
                    ))
                }),
            _ => Ok(attributes),
        }
    }

    /// Decrypts one result and redacts its namespaces.
    ///
    /// # Errors
    ///
    /// Returns `Internal` when the extension fails to decrypt.
    pub async fn optionally_decrypt_and_redact_single_result(
        &self,
        object: SavedObject,
        type_map: Option<&AuthorizationTypeMap>,
        original_attributes: Option<&Attributes>,
    ) -> Result<SavedObject, SavedObjectsError> {
        let object = match &self.encryption {
            Some(ext) if ext.is_encryptable_type(&object.object_type) => {
                let (object_type, id) = (object.object_type.clone(), object.id.clone());
                ext.decrypt_or_strip_result(object, original_attributes)
                    .await
                    .map_err(|e| {
                        error!(object_type = %object_type, id = %id, error = %e, "Attribute decryption failed");
                        SavedObjectsError::Internal(format!(
                            "Failed to decrypt attributes of [{object_type}/{id}]"
                        ))
                    })?
            }
            _ => object,
        };
        Ok(match (&self.security, type_map) {
            (Some(security), Some(type_map)) => security.redact_namespaces(object, type_map),
            _ => object,
        })
    }

    /// Decrypts and redacts every successful entry, preserving order.
    ///
    /// A decryption failure turns only that entry into an error.
    pub async fn optionally_decrypt_and_redact_bulk_result(
        &self,
        results: BulkResult,
        type_map: Option<&AuthorizationTypeMap>,
        original_attributes: &[Option<Attributes>],
    ) -> BulkResult {
        let pending = results.into_iter().enumerate().map(|(i, result)| async move {
            let object = result?;
            let (object_type, id) = (object.object_type.clone(), object.id.clone());
            let original = original_attributes.get(i).and_then(Option::as_ref);
            self.optionally_decrypt_and_redact_single_result(object, type_map, original)
                .await
                .map_err(|e| BulkItemError::new(object_type, id, e))
        });
        join_all(pending).await
    }
}

#[cfg(test)]
#[path = "encryption_tests.rs"]
mod encryption_tests;

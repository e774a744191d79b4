//! Read path: documents are migrated and decrypted before they are returned.

use saved_objects_sdk::{
    BulkGetObject, BulkItemError, BulkResult, GetOptions, SavedObject, SavedObjectsError,
};

use super::SavedObjectsRepository;
use crate::domain::error::{StoreTarget, from_store_error};
use crate::domain::namespace::{ALL_NAMESPACES_STRING, normalize_namespace, raw_doc_exists_in_namespace};
use crate::domain::serializer::{RawDoc, generate_raw_id};
use crate::domain::type_registry::NamespaceType;
use crate::infra::store::product_check::is_not_found_from_unsupported_server;
use crate::infra::store::{GetRequest, MgetDocRequest, MgetHit, MgetRequest};

struct GetEntry {
    object_type: String,
    id: String,
    namespace: Option<String>,
    namespace_type: NamespaceType,
}

impl GetEntry {
    fn raw_id(&self) -> String {
        generate_raw_id(
            self.namespace_type,
            self.namespace.as_deref(),
            &self.object_type,
            &self.id,
        )
    }

    fn not_found(&self) -> BulkItemError {
        BulkItemError::new(
            &self.object_type,
            &self.id,
            SavedObjectsError::not_found(&self.object_type, &self.id),
        )
    }
}

impl SavedObjectsRepository {
    #[tracing::instrument(skip_all, fields(object_type = %object_type, id = %id))]
    pub(super) async fn perform_get(
        &self,
        object_type: &str,
        id: &str,
        options: &GetOptions,
    ) -> Result<SavedObject, SavedObjectsError> {
        let namespace = normalize_namespace(options.namespace.as_deref())?;
        if !self.is_allowed_type(object_type) {
            return Err(SavedObjectsError::not_found(object_type, id));
        }
        let namespace_type = self.namespace_type(object_type)?;
        let namespace = namespace.filter(|_| !namespace_type.is_agnostic());

        let response = self
            .client
            .get(GetRequest {
                id: generate_raw_id(namespace_type, namespace.as_deref(), object_type, id),
                index: self.config.index.clone(),
            })
            .await
            .map_err(|e| from_store_error(e, StoreTarget::Object { object_type, id }))?;
        if is_not_found_from_unsupported_server(response.status_code, &response.headers) {
            return Err(SavedObjectsError::es_unavailable(object_type, id));
        }
        let raw = response
            .body
            .into_raw_doc()
            .filter(|raw| raw_doc_exists_in_namespace(namespace_type, raw, namespace.as_deref()))
            .ok_or_else(|| SavedObjectsError::not_found(object_type, id))?;

        let object = self
            .migration
            .migrate_to_saved_object(raw)?
            .into_saved_object(namespace_type);
        self.encryption
            .optionally_decrypt_and_redact_single_result(object, None, None)
            .await
    }

    #[tracing::instrument(skip_all, fields(objects = objects.len()))]
    pub(super) async fn perform_bulk_get(
        &self,
        objects: Vec<BulkGetObject>,
        options: &GetOptions,
    ) -> Result<BulkResult, SavedObjectsError> {
        let namespace = normalize_namespace(options.namespace.as_deref())?;
        let expected: Vec<Result<GetEntry, BulkItemError>> = objects
            .into_iter()
            .map(|object| self.validate_get(object, namespace.as_deref()))
            .collect();

        let docs: Vec<MgetDocRequest> = expected
            .iter()
            .filter_map(|staged| staged.as_ref().ok())
            .map(|entry| MgetDocRequest {
                id: entry.raw_id(),
                index: self.config.index.clone(),
                source_includes: None,
            })
            .collect();
        let hits = if docs.is_empty() {
            Vec::new()
        } else {
            let response = self
                .client
                .mget(MgetRequest { docs })
                .await
                .map_err(|e| from_store_error(e, StoreTarget::Bulk))?;
            if is_not_found_from_unsupported_server(response.status_code, &response.headers) {
                return Err(SavedObjectsError::es_unavailable_bulk());
            }
            if response.status_code == 404 {
                Vec::new()
            } else {
                response.body.docs
            }
        };

        let mut hits = hits.into_iter();
        let results: BulkResult = expected
            .into_iter()
            .map(|staged| {
                staged.and_then(|entry| {
                    let raw = hits.next().and_then(MgetHit::found_doc);
                    self.resolve_get(&entry, raw)
                })
            })
            .collect();
        Ok(self
            .encryption
            .optionally_decrypt_and_redact_bulk_result(results, None, &[])
            .await)
    }

    fn validate_get(
        &self,
        object: BulkGetObject,
        batch_namespace: Option<&str>,
    ) -> Result<GetEntry, BulkItemError> {
        let fail = |error| BulkItemError::new(&object.object_type, &object.id, error);
        if !self.is_allowed_type(&object.object_type) {
            return Err(fail(SavedObjectsError::bad_request(format!(
                "Unsupported saved object type: '{}'",
                object.object_type
            ))));
        }
        let namespace = match object.namespace.as_deref() {
            Some(ALL_NAMESPACES_STRING) => {
                return Err(fail(SavedObjectsError::bad_request(
                    "\"namespace\" cannot be \"*\"",
                )));
            }
            Some(namespace) => normalize_namespace(Some(namespace)).map_err(fail)?,
            None => batch_namespace.map(str::to_owned),
        };
        let namespace_type = self.namespace_type(&object.object_type).map_err(fail)?;
        Ok(GetEntry {
            namespace: namespace.filter(|_| !namespace_type.is_agnostic()),
            namespace_type,
            object_type: object.object_type,
            id: object.id,
        })
    }

    fn resolve_get(&self, entry: &GetEntry, raw: Option<RawDoc>) -> Result<SavedObject, BulkItemError> {
        let raw = raw
            .filter(|raw| {
                raw_doc_exists_in_namespace(entry.namespace_type, raw, entry.namespace.as_deref())
            })
            .ok_or_else(|| entry.not_found())?;
        self.migration
            .migrate_to_saved_object(raw)
            .map(|doc| doc.into_saved_object(entry.namespace_type))
            .map_err(|error| BulkItemError::new(&entry.object_type, &entry.id, error))
    }
}

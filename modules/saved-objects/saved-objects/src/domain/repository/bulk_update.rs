//! Bulk update orchestration.
//!
//! Every stage maps a `Vec<Result<_, BulkItemError>>` onto the next one, so
//! an entry that failed early keeps its position and never reaches the
//! store.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use futures::future::join_all;
use saved_objects_sdk::{
    Attributes, BulkItemError, BulkResult, BulkUpdateObject, BulkUpdateOptions, Refresh,
    SavedObject, SavedObjectReference, SavedObjectsError,
};
use serde_json::{Map, Value};
use tracing::debug;

use super::SavedObjectsRepository;
use crate::domain::encryption::EncryptionDescriptor;
use crate::domain::error::{StoreTarget, from_bulk_item, from_store_error};
use crate::domain::namespace::{
    ALL_NAMESPACES_STRING, namespace_id_to_string, normalize_namespace, saved_object_namespaces,
};
use crate::domain::preflight::{PreflightCandidate, PreflightOutcome};
use crate::domain::security::{AuthorizationTypeMap, AuthorizeUpdateObject};
use crate::domain::serializer::{SavedObjectDoc, generate_raw_id};
use crate::domain::type_registry::NamespaceType;
use crate::domain::version::{VersionPreconditions, encode_hit_version, expected_version_properties};
use crate::infra::store::product_check::is_not_found_from_unsupported_server;
use crate::infra::store::{BulkHeader, BulkItemResponse, BulkOperation, BulkRequest};

type Staged<T> = Result<T, BulkItemError>;

/// An update request, optionally creating the object when it is absent.
pub(super) struct UpdateCandidate {
    pub object: BulkUpdateObject,
    pub upsert: Option<Attributes>,
}

/// A request that passed validation.
struct ValidEntry {
    object_type: String,
    id: String,
    /// Effective namespace id, `None` for the default namespace and for
    /// agnostic types.
    namespace: Option<String>,
    namespace_type: NamespaceType,
    attributes: Attributes,
    references: Option<Vec<SavedObjectReference>>,
    preconditions: Option<VersionPreconditions>,
    upsert: Option<Attributes>,
}

impl ValidEntry {
    fn item_error(&self, error: SavedObjectsError) -> BulkItemError {
        BulkItemError::new(&self.object_type, &self.id, error)
    }

    fn raw_id(&self) -> String {
        generate_raw_id(
            self.namespace_type,
            self.namespace.as_deref(),
            &self.object_type,
            &self.id,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Update,
    Create,
}

struct PlannedWrite {
    entry: ValidEntry,
    namespaces: Option<Vec<String>>,
    kind: WriteKind,
}

impl SavedObjectsRepository {
    pub(super) async fn perform_bulk_update(
        &self,
        objects: Vec<BulkUpdateObject>,
        options: BulkUpdateOptions,
    ) -> Result<BulkResult, SavedObjectsError> {
        let candidates = objects
            .into_iter()
            .map(|object| UpdateCandidate {
                object,
                upsert: None,
            })
            .collect();
        self.bulk_update_candidates(candidates, options).await
    }

    #[tracing::instrument(skip_all, fields(objects = candidates.len(), namespace = ?options.namespace))]
    pub(super) async fn bulk_update_candidates(
        &self,
        candidates: Vec<UpdateCandidate>,
        options: BulkUpdateOptions,
    ) -> Result<BulkResult, SavedObjectsError> {
        let namespace = normalize_namespace(options.namespace.as_deref())?;
        let refresh = options.refresh.unwrap_or(self.config.refresh);
        let now = Utc::now().trunc_subsecs(3);

        let validated: Vec<Staged<ValidEntry>> = candidates
            .into_iter()
            .map(|candidate| self.validate_update(candidate, namespace.as_deref()))
            .collect();
        if validated.iter().all(Result::is_err) {
            debug!("No valid objects to update");
            return Ok(validated.into_iter().filter_map(Result::err).map(Err).collect());
        }

        let checked = self.preflight_entries(validated).await?;
        let type_map = self.authorize_update(namespace.as_deref(), &checked).await?;
        let planned = checked.into_iter().map(|staged| {
            staged.and_then(|(entry, outcome)| plan_write(entry, outcome, type_map.as_ref()))
        });
        let prepared: Vec<Staged<(PlannedWrite, BulkOperation)>> =
            join_all(planned.map(|staged| self.prepare_write(staged, now))).await;

        let mut operations = Vec::new();
        let staged: Vec<Staged<(PlannedWrite, usize)>> = prepared
            .into_iter()
            .map(|item| {
                item.map(|(planned, operation)| {
                    operations.push(operation);
                    (planned, operations.len() - 1)
                })
            })
            .collect();
        let items = self.execute_bulk(operations, refresh).await?;

        let results: BulkResult = staged
            .into_iter()
            .map(|item| item.and_then(|(planned, i)| reconcile_item(planned, items.get(i), now)))
            .collect();
        let originals: Vec<Option<Attributes>> = results
            .iter()
            .map(|result| result.as_ref().ok().map(|object| object.attributes.clone()))
            .collect();
        Ok(self
            .encryption
            .optionally_decrypt_and_redact_bulk_result(results, type_map.as_ref(), &originals)
            .await)
    }

    fn validate_update(
        &self,
        candidate: UpdateCandidate,
        batch_namespace: Option<&str>,
    ) -> Staged<ValidEntry> {
        let UpdateCandidate { object, upsert } = candidate;
        let fail = |error| BulkItemError::new(&object.object_type, &object.id, error);

        if !self.is_allowed_type(&object.object_type) {
            return Err(fail(SavedObjectsError::bad_request(format!(
                "Unsupported saved object type: '{}'",
                object.object_type
            ))));
        }
        if object.id.is_empty() {
            return Err(fail(SavedObjectsError::bad_request("id cannot be empty")));
        }
        let namespace = match object.namespace.as_deref() {
            Some(namespace) => normalize_namespace(Some(namespace)).map_err(fail)?,
            None => batch_namespace.map(str::to_owned),
        };
        if namespace.as_deref() == Some(ALL_NAMESPACES_STRING) {
            return Err(fail(SavedObjectsError::bad_request(
                "\"namespace\" cannot be \"*\"",
            )));
        }
        let preconditions = expected_version_properties(object.version.as_deref()).map_err(fail)?;
        let namespace_type = self.namespace_type(&object.object_type).map_err(fail)?;

        Ok(ValidEntry {
            namespace: namespace.filter(|_| !namespace_type.is_agnostic()),
            namespace_type,
            preconditions,
            upsert,
            object_type: object.object_type,
            id: object.id,
            attributes: object.attributes,
            references: object.references,
        })
    }

    async fn preflight_entries(
        &self,
        validated: Vec<Staged<ValidEntry>>,
    ) -> Result<Vec<Staged<(ValidEntry, PreflightOutcome)>>, SavedObjectsError> {
        let candidates: Vec<PreflightCandidate> = validated
            .iter()
            .filter_map(|staged| staged.as_ref().ok())
            .map(|entry| PreflightCandidate {
                object_type: entry.object_type.clone(),
                id: entry.id.clone(),
                namespace: entry.namespace.clone(),
                namespace_type: entry.namespace_type,
                force_fetch: entry.upsert.is_some(),
            })
            .collect();
        let mut outcomes = self.preflight.bulk_fetch_for_update(&candidates).await?.into_iter();
        Ok(validated
            .into_iter()
            .map(|staged| {
                staged.map(|entry| {
                    let outcome = outcomes.next().unwrap_or(PreflightOutcome::NotFound);
                    (entry, outcome)
                })
            })
            .collect())
    }

    async fn authorize_update(
        &self,
        namespace: Option<&str>,
        checked: &[Staged<(ValidEntry, PreflightOutcome)>],
    ) -> Result<Option<AuthorizationTypeMap>, SavedObjectsError> {
        let Some(security) = &self.security else {
            return Ok(None);
        };
        let objects: Vec<AuthorizeUpdateObject> = checked
            .iter()
            .filter_map(|staged| staged.as_ref().ok())
            .map(|(entry, outcome)| AuthorizeUpdateObject {
                object_type: entry.object_type.clone(),
                id: entry.id.clone(),
                object_namespace: entry.namespace.clone(),
                existing_namespaces: if entry.namespace_type.is_multi() {
                    outcome.existing_namespaces().to_vec()
                } else {
                    Vec::new()
                },
            })
            .collect();
        let result = security.authorize_bulk_update(namespace, &objects).await?;
        debug!(status = ?result.status, objects = objects.len(), "Bulk update authorized");
        Ok(Some(result.type_map))
    }

    async fn prepare_write(
        &self,
        staged: Staged<PlannedWrite>,
        now: DateTime<Utc>,
    ) -> Staged<(PlannedWrite, BulkOperation)> {
        let planned = staged?;
        match self.build_operation(&planned, now).await {
            Ok(operation) => Ok((planned, operation)),
            Err(error) => Err(planned.entry.item_error(error)),
        }
    }

    async fn build_operation(
        &self,
        planned: &PlannedWrite,
        now: DateTime<Utc>,
    ) -> Result<BulkOperation, SavedObjectsError> {
        let entry = &planned.entry;
        let descriptor = EncryptionDescriptor {
            object_type: entry.object_type.clone(),
            id: entry.id.clone(),
            namespace: entry.namespace.clone(),
        };
        let header = BulkHeader {
            id: entry.raw_id(),
            index: self.config.index.clone(),
            if_seq_no: None,
            if_primary_term: None,
        };
        let updated_at = format_timestamp(now);

        if planned.kind == WriteKind::Create {
            let upsert = entry.upsert.clone().unwrap_or_default();
            let doc = SavedObjectDoc {
                id: entry.id.clone(),
                object_type: entry.object_type.clone(),
                namespace: entry.namespace.clone(),
                namespaces: planned.namespaces.clone(),
                attributes: self
                    .encryption
                    .optionally_encrypt_attributes(&descriptor, upsert)
                    .await?,
                references: entry.references.clone().unwrap_or_default(),
                updated_at: Some(updated_at),
                origin_id: None,
                version: None,
                type_migration_version: self
                    .migration
                    .migrator()
                    .latest_virtual_version(&entry.object_type),
                extra: Map::new(),
            };
            let raw = self.serializer.saved_object_to_raw(doc)?;
            return Ok(BulkOperation::Create {
                header,
                document: raw.source,
            });
        }

        let attributes = self
            .encryption
            .optionally_encrypt_attributes(&descriptor, entry.attributes.clone())
            .await?;
        let mut doc = Map::new();
        doc.insert(entry.object_type.clone(), Value::Object(attributes));
        doc.insert("updated_at".to_owned(), Value::String(updated_at));
        if let Some(references) = &entry.references {
            let references = serde_json::to_value(references)
                .map_err(|e| SavedObjectsError::Internal(e.to_string()))?;
            doc.insert("references".to_owned(), references);
        }
        Ok(BulkOperation::Update {
            header: BulkHeader {
                if_seq_no: entry.preconditions.map(|p| p.if_seq_no),
                if_primary_term: entry.preconditions.map(|p| p.if_primary_term),
                ..header
            },
            doc,
        })
    }

    async fn execute_bulk(
        &self,
        operations: Vec<BulkOperation>,
        refresh: Refresh,
    ) -> Result<Vec<BulkItemResponse>, SavedObjectsError> {
        if operations.is_empty() {
            debug!("No store operations to execute");
            return Ok(Vec::new());
        }
        let count = operations.len();
        let response = self
            .client
            .bulk(BulkRequest {
                refresh,
                operations,
                require_alias: true,
                source_includes: vec!["originId".to_owned()],
            })
            .await
            .map_err(|e| from_store_error(e, StoreTarget::Bulk))?;
        if is_not_found_from_unsupported_server(response.status_code, &response.headers) {
            return Err(SavedObjectsError::es_unavailable_bulk());
        }
        debug!(operations = count, errors = response.body.errors, "Bulk request completed");
        Ok(response.body.items)
    }
}

/// Decides which store operation an entry needs, or why it fails.
fn plan_write(
    entry: ValidEntry,
    outcome: PreflightOutcome,
    type_map: Option<&AuthorizationTypeMap>,
) -> Staged<PlannedWrite> {
    let namespace_string =
        namespace_id_to_string(entry.namespace.as_deref()).map_err(|e| entry.item_error(e))?;
    if let Some(type_map) = type_map
        && !type_map.is_authorized(&entry.object_type, &namespace_string)
    {
        debug!(object_type = %entry.object_type, id = %entry.id, "Update forbidden");
        return Err(entry.item_error(SavedObjectsError::forbidden(format!(
            "Unable to bulk_update {}",
            entry.object_type
        ))));
    }
    let written_namespaces = saved_object_namespaces(entry.namespace_type, entry.namespace.as_deref())
        .map_err(|e| entry.item_error(e))?;

    let (namespaces, kind) = match outcome {
        PreflightOutcome::NotFound if entry.upsert.is_some() => (written_namespaces, WriteKind::Create),
        // The id is taken in another space, so creating it here would collide.
        PreflightOutcome::FoundOutsideNamespace { .. } if entry.upsert.is_some() => {
            let error = SavedObjectsError::conflict(&entry.object_type, &entry.id);
            return Err(entry.item_error(error));
        }
        PreflightOutcome::NotFound | PreflightOutcome::FoundOutsideNamespace { .. } => {
            let error = SavedObjectsError::not_found(&entry.object_type, &entry.id);
            return Err(entry.item_error(error));
        }
        PreflightOutcome::FoundInNamespace { namespaces, .. } if entry.namespace_type.is_multi() => {
            (Some(namespaces), WriteKind::Update)
        }
        PreflightOutcome::FoundInNamespace { .. } | PreflightOutcome::Unchecked => {
            (written_namespaces, WriteKind::Update)
        }
    };
    Ok(PlannedWrite {
        entry,
        namespaces,
        kind,
    })
}

/// Builds the result of one entry from its positional bulk item.
fn reconcile_item(
    planned: PlannedWrite,
    item: Option<&BulkItemResponse>,
    now: DateTime<Utc>,
) -> Staged<SavedObject> {
    let PlannedWrite {
        entry,
        namespaces,
        kind,
    } = planned;
    let Some(item) = item else {
        return Err(entry.item_error(SavedObjectsError::Internal(
            "bulk response is missing an item".to_owned(),
        )));
    };
    if let Some(error) = from_bulk_item(&entry.object_type, &entry.id, item) {
        debug!(object_type = %entry.object_type, id = %entry.id, status = item.status, "Bulk item failed");
        return Err(entry.item_error(error));
    }
    let origin_id = item
        .get
        .as_ref()
        .and_then(|source| source.get("originId"))
        .and_then(Value::as_str)
        .map(str::to_owned);
    let attributes = match kind {
        WriteKind::Update => entry.attributes,
        WriteKind::Create => entry.upsert.unwrap_or_default(),
    };
    Ok(SavedObject {
        object_type: entry.object_type,
        id: entry.id,
        attributes,
        references: entry.references.unwrap_or_default(),
        namespaces,
        version: encode_hit_version(item.seq_no, item.primary_term),
        updated_at: Some(now),
        origin_id,
    })
}

fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

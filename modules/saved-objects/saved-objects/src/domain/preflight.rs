//! Read-only existence and namespace checks ahead of a mutation.

use std::sync::Arc;

use saved_objects_sdk::SavedObjectsError;
use tracing::debug;

use super::error::{StoreTarget, from_store_error};
use super::namespace::{namespaces_from_raw, raw_doc_exists_in_namespace};
use super::serializer::{RawDoc, generate_raw_id};
use super::type_registry::NamespaceType;
use crate::infra::store::product_check::is_not_found_from_unsupported_server;
use crate::infra::store::{MgetDocRequest, MgetHit, MgetRequest, StoreClient};

/// Source fields requested by the preflight multi-get.
const PREFLIGHT_SOURCE_FIELDS: [&str; 3] = ["type", "namespaces", "namespace"];

/// One object about to be updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightCandidate {
    pub object_type: String,
    pub id: String,
    /// Effective namespace id; `None` is the default namespace.
    pub namespace: Option<String>,
    pub namespace_type: NamespaceType,
    /// Fetch even when the namespace type does not require it.
    pub force_fetch: bool,
}

impl PreflightCandidate {
    fn requires_fetch(&self) -> bool {
        self.force_fetch || self.namespace_type.is_multi()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreflightOutcome {
    /// Not fetched; the raw id alone guarantees namespace placement.
    Unchecked,
    NotFound,
    FoundInNamespace {
        namespaces: Vec<String>,
        raw: RawDoc,
    },
    /// Exists, but the caller's namespace is not one of its namespaces.
    FoundOutsideNamespace { namespaces: Vec<String> },
}

impl PreflightOutcome {
    /// Namespaces of the stored object, empty when unknown.
    #[must_use]
    pub fn existing_namespaces(&self) -> &[String] {
        match self {
            Self::FoundInNamespace { namespaces, .. } | Self::FoundOutsideNamespace { namespaces } => {
                namespaces
            }
            Self::Unchecked | Self::NotFound => &[],
        }
    }
}

#[derive(Clone)]
pub struct PreflightCheckHelper {
    client: Arc<dyn StoreClient>,
    index: String,
}

impl PreflightCheckHelper {
    #[must_use]
    pub fn new(client: Arc<dyn StoreClient>, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
        }
    }

    /// Classifies every candidate, fetching the ones that need it with a
    /// single multi-get. Outcomes are returned in candidate order.
    ///
    /// # Errors
    ///
    /// `EsUnavailable` when the multi-get 404 lacks the product signature;
    /// request-level store failures otherwise.
    #[tracing::instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn bulk_fetch_for_update(
        &self,
        candidates: &[PreflightCandidate],
    ) -> Result<Vec<PreflightOutcome>, SavedObjectsError> {
        let to_fetch: Vec<&PreflightCandidate> =
            candidates.iter().filter(|c| c.requires_fetch()).collect();
        if to_fetch.is_empty() {
            return Ok(vec![PreflightOutcome::Unchecked; candidates.len()]);
        }

        let docs = to_fetch
            .iter()
            .map(|candidate| MgetDocRequest {
                id: generate_raw_id(
                    candidate.namespace_type,
                    candidate.namespace.as_deref(),
                    &candidate.object_type,
                    &candidate.id,
                ),
                index: self.index.clone(),
                source_includes: Some(PREFLIGHT_SOURCE_FIELDS.map(str::to_owned).to_vec()),
            })
            .collect();
        let response = self
            .client
            .mget(MgetRequest { docs })
            .await
            .map_err(|e| from_store_error(e, StoreTarget::Bulk))?;
        if is_not_found_from_unsupported_server(response.status_code, &response.headers) {
            return Err(SavedObjectsError::es_unavailable_bulk());
        }
        let index_found = response.status_code != 404;
        debug!(fetched = to_fetch.len(), index_found, "Preflight multi-get completed");

        let mut hits = response.body.docs.into_iter();
        Ok(candidates
            .iter()
            .map(|candidate| {
                if !candidate.requires_fetch() {
                    return PreflightOutcome::Unchecked;
                }
                let raw = hits.next().and_then(MgetHit::found_doc);
                match raw {
                    Some(raw) if index_found => classify(candidate, raw),
                    _ => PreflightOutcome::NotFound,
                }
            })
            .collect())
    }
}

fn classify(candidate: &PreflightCandidate, raw: RawDoc) -> PreflightOutcome {
    let namespaces = namespaces_from_raw(&raw);
    if raw_doc_exists_in_namespace(candidate.namespace_type, &raw, candidate.namespace.as_deref()) {
        PreflightOutcome::FoundInNamespace { namespaces, raw }
    } else {
        PreflightOutcome::FoundOutsideNamespace { namespaces }
    }
}

#[cfg(test)]
#[path = "preflight_tests.rs"]
mod preflight_tests;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use service_core::endpoint_error::EndpointError;
use service_core::simple_err_map;
use validator::{Validate, ValidationErrors};

use super::memory_repository::MemoryDocumentStore;
use super::patch::Patch;
use super::repository::{Document, DocumentStore, StoreError};
use super::types::Collection;
use crate::error::{not_found, RecordsError, RecordsResult};
use crate::model::EntityKind;

/// A record type stored in one of the four collections.
pub trait Entity: Serialize + DeserializeOwned + Validate + Send + Sync {
    const COLLECTION: Collection;
    const KIND: EntityKind;

    fn id(&self) -> &str;
}

/// Typed create/read/update/delete over a [`DocumentStore`]. This is the only component that
/// talks to storage; everything else composes its calls.
///
/// Concurrent updates to the same document are not detected: each patch is atomic on its own
/// and the last one to land wins per field.
#[derive(Clone)]
pub struct EntityStore {
    docs: Arc<dyn DocumentStore>,
}

impl EntityStore {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self { docs }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryDocumentStore::new()))
    }

    /// Validates and inserts `entity`, returning its id.
    ///
    /// # Errors
    ///
    /// `Validation` if a required field is blank, `AlreadyExists` if the id is taken.
    pub async fn create<E: Entity>(&self, entity: &E) -> RecordsResult<String> {
        entity
            .validate()
            .map_err(|errors| EndpointError::validation(describe(&errors)))?;

        let doc = match serde_json::to_value(entity) {
            Ok(Value::Object(doc)) => doc,
            other => {
                tracing::error!(result = ?other, kind = %E::KIND, "Entity did not serialize to a document.");
                return Err(EndpointError::internal());
            }
        };

        self.docs
            .insert(E::COLLECTION, entity.id(), doc)
            .await
            .map_err(|e| store_error(e, E::KIND, entity.id()))?;

        Ok(entity.id().to_owned())
    }

    pub async fn try_get<E: Entity>(&self, id: &str) -> RecordsResult<Option<E>> {
        let doc = self
            .docs
            .fetch(E::COLLECTION, id)
            .await
            .map_err(|e| store_error(e, E::KIND, id))?;

        doc.map(decode).transpose()
    }

    pub async fn get<E: Entity>(&self, id: &str) -> RecordsResult<E> {
        self.try_get(id).await?.ok_or_else(|| not_found(E::KIND, id))
    }

    pub async fn find_by_username<E: Entity>(&self, username: &str) -> RecordsResult<Option<E>> {
        let doc = self
            .docs
            .find_by_username(E::COLLECTION, username)
            .await
            .map_err(|e| store_error(e, E::KIND, username))?;

        doc.map(decode).transpose()
    }

    /// Applies `patch` to one document. `NotFound` if the document or a path the patch requires
    /// is missing, in which case nothing was written.
    pub async fn update<E: Entity>(&self, id: &str, patch: &Patch) -> RecordsResult<()> {
        self.docs
            .apply(E::COLLECTION, id, patch)
            .await
            .map_err(|e| store_error(e, E::KIND, id))
    }

    pub async fn delete<E: Entity>(&self, id: &str) -> RecordsResult<()> {
        self.docs
            .remove(E::COLLECTION, id)
            .await
            .map_err(|e| store_error(e, E::KIND, id))
    }

    pub async fn all<E: Entity>(&self) -> RecordsResult<Vec<E>> {
        let docs = self
            .docs
            .scan(E::COLLECTION)
            .await
            .map_err(|e| store_error(e, E::KIND, E::COLLECTION.to_string()))?;

        docs.into_iter().map(decode).collect()
    }
}

fn decode<E: Entity>(doc: Document) -> RecordsResult<E> {
    serde_json::from_value(Value::Object(doc)).map_err(simple_err_map!("Invalid record in datastore.", EndpointError::internal()))
}

pub(crate) fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("{} is invalid.", field),
            })
        })
        .collect();
    messages.sort();
    messages.join(" ")
}

pub(crate) fn store_error(err: StoreError, kind: EntityKind, id: impl Into<String>) -> EndpointError<RecordsError> {
    match err {
        StoreError::NotFound => not_found(kind, id),
        StoreError::Duplicate(_) => EndpointError::operation(RecordsError::AlreadyExists(kind, id.into())),
        StoreError::Unavailable(_) => EndpointError::unavailable(),
        e @ (StoreError::Serde(_) | StoreError::Malformed(_)) => {
            tracing::error!(error = ?e, %kind, "Stored document could not be interpreted.");
            EndpointError::internal()
        }
    }
}

/// For failures building a patch, which can only be serialization failures.
pub(crate) fn patch_error(err: StoreError) -> EndpointError<RecordsError> {
    tracing::error!(error = ?err, "Failed to build patch.");
    EndpointError::internal()
}

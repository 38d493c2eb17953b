use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use super::patch::Patch;
use super::types::Collection;

/// A stored record: a JSON object with `PascalCase` attribute names and a string `Id`.
pub type Document = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The document, or a path the patch requires, does not exist.
    #[error("Document not found.")]
    NotFound,

    #[error("A document with id {0} already exists.")]
    Duplicate(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error("Malformed document: {0}.")]
    Malformed(String),

    #[error("Underlying datastore error: {0}.")]
    Unavailable(String),
}

/// Raw access to the four collections. One call, one document, one atomic change; there are no
/// multi-document transactions and callers must not assume any.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, collection: Collection, id: &str, doc: Document) -> Result<(), StoreError>;

    async fn fetch(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    async fn find_by_username(&self, collection: Collection, username: &str) -> Result<Option<Document>, StoreError>;

    async fn scan(&self, collection: Collection) -> Result<Vec<Document>, StoreError>;

    async fn apply(&self, collection: Collection, id: &str, patch: &Patch) -> Result<(), StoreError>;

    /// Removing a document that does not exist is not an error.
    async fn remove(&self, collection: Collection, id: &str) -> Result<(), StoreError>;
}

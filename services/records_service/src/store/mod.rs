pub mod ddb_repository;
pub mod entity_store;
pub mod memory_repository;
pub mod patch;
pub mod repository;
pub mod types;

pub use ddb_repository::{DdbDocumentStore, TableNames};
pub use entity_store::{Entity, EntityStore};
pub use memory_repository::MemoryDocumentStore;
pub use patch::{FieldOp, FieldPath, Patch, Segment};
pub use repository::{Document, DocumentStore, StoreError};
pub use types::{Attr, Collection};

//! Academic records kept as denormalized documents in four independent collections (students,
//! teachers, courses and assignments) without multi-document transactions.
//!
//! Every relationship is stored on both of its sides. The operations in [`operations`] are the
//! only writers of those links and keep both sides in step with a fixed sequence of
//! single-document updates. A failure part-way leaves the links inconsistent until the operation
//! is retried or [`operations::reconcile::reconcile`] repairs them.

pub mod artifacts;
pub mod clock;
pub mod context;
pub mod credentials;
pub mod error;
pub mod model;
pub mod operations;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{Context, ContextError, ContextKey};
pub use error::{RecordsError, RecordsResult};
pub use store::EntityStore;

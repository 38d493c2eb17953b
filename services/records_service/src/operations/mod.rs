//! Public operations. Each is a fixed sequence of single-document [`crate::EntityStore`] calls;
//! see the module docs of [`relationships`] for the ordering they share.

pub mod accounts;
pub mod cascade;
pub mod courses;
pub mod grades;
pub mod lockout;
pub mod reconcile;
pub mod relationships;
pub mod submissions;

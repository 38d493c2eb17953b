//! Field-level updates to a single document.
//!
//! A [`Patch`] is the unit of atomicity this service gets from its datastore: every operation in
//! one patch is applied to one document at once, or not at all. Anything that spans documents is
//! a sequence of patches.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use serde::Serialize;
use serde_json::Value;

use super::repository::StoreError;
use super::types::Attr;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    Attr(Attr),
    /// Key into a map-valued attribute, e.g. a course id in a student's course set.
    Key(String),
}

/// Location of a value inside a document: a top-level attribute followed by map keys and nested
/// attributes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<Segment>);

#[derive(Clone, Debug, PartialEq)]
pub enum FieldOp {
    Set(FieldPath, Value),
    /// Set only if nothing is stored at the path yet.
    SetIfAbsent(FieldPath, Value),
    Remove(FieldPath),
    /// Add to a number, treating an absent value as 0.
    Increment(FieldPath, i64),
    AddToSet(FieldPath, BTreeSet<String>),
    /// Remove from a set. A set left empty disappears from the document.
    RemoveFromSet(FieldPath, BTreeSet<String>),
    /// Append to a list, creating it if absent.
    Push(FieldPath, Vec<Value>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Patch {
    ops: Vec<FieldOp>,
    requires: Vec<FieldPath>,
}

impl FieldPath {
    pub fn attr(attr: Attr) -> Self {
        FieldPath(vec![Segment::Attr(attr)])
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(Segment::Key(key.into()));
        self
    }

    pub fn field(mut self, attr: Attr) -> Self {
        self.0.push(Segment::Attr(attr));
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (idx, segment) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(".")?;
            }
            match segment {
                Segment::Attr(attr) => write!(f, "{}", attr)?,
                Segment::Key(key) => write!(f, "[{}]", key)?,
            }
        }
        Ok(())
    }
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: FieldPath, value: impl Serialize) -> Result<Self, StoreError> {
        self.ops.push(FieldOp::Set(path, serde_json::to_value(value)?));
        Ok(self)
    }

    pub fn set_if_absent(mut self, path: FieldPath, value: impl Serialize) -> Result<Self, StoreError> {
        self.ops.push(FieldOp::SetIfAbsent(path, serde_json::to_value(value)?));
        Ok(self)
    }

    pub fn push(mut self, path: FieldPath, values: impl IntoIterator<Item = impl Serialize>) -> Result<Self, StoreError> {
        let values = values
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        if !values.is_empty() {
            self.ops.push(FieldOp::Push(path, values));
        }
        Ok(self)
    }

    pub fn remove(mut self, path: FieldPath) -> Self {
        self.ops.push(FieldOp::Remove(path));
        self
    }

    pub fn increment(mut self, path: FieldPath, by: i64) -> Self {
        self.ops.push(FieldOp::Increment(path, by));
        self
    }

    /// Adds `members` to a string set. An empty `members` is dropped: the datastore has no
    /// notion of an empty set.
    pub fn add_to_set(mut self, path: FieldPath, members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let members: BTreeSet<String> = members.into_iter().map(Into::into).collect();
        if !members.is_empty() {
            self.ops.push(FieldOp::AddToSet(path, members));
        }
        self
    }

    pub fn remove_from_set(mut self, path: FieldPath, members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let members: BTreeSet<String> = members.into_iter().map(Into::into).collect();
        if !members.is_empty() {
            self.ops.push(FieldOp::RemoveFromSet(path, members));
        }
        self
    }

    /// Makes the whole patch fail with [`StoreError::NotFound`] unless `path` exists.
    pub fn require(mut self, path: FieldPath) -> Self {
        self.requires.push(path);
        self
    }

    pub fn ops(&self) -> &[FieldOp] {
        &self.ops
    }

    pub fn requirements(&self) -> &[FieldPath] {
        &self.requires
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl FieldOp {
    pub fn path(&self) -> &FieldPath {
        match self {
            FieldOp::Set(p, _)
            | FieldOp::SetIfAbsent(p, _)
            | FieldOp::Remove(p)
            | FieldOp::Increment(p, _)
            | FieldOp::AddToSet(p, _)
            | FieldOp::RemoveFromSet(p, _)
            | FieldOp::Push(p, _) => p,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn path_display() {
        let path = FieldPath::attr(Attr::Submissions).key("s-1").field(Attr::Grade);

        assert_eq!("Submissions.[s-1].Grade", path.to_string());
    }

    #[test]
    fn empty_set_operations_are_dropped() {
        let patch = Patch::new()
            .add_to_set(FieldPath::attr(Attr::StudentIds), Vec::<String>::new())
            .remove_from_set(FieldPath::attr(Attr::StudentIds), Vec::<String>::new());

        assert!(patch.is_empty());
    }

    #[test]
    fn values_are_serialized_up_front() {
        let patch = Patch::new()
            .set(FieldPath::attr(Attr::Name), "Compilers")
            .unwrap()
            .increment(FieldPath::attr(Attr::FailedLoginAttempts), 1);

        assert_eq!(
            &[
                FieldOp::Set(FieldPath::attr(Attr::Name), json!("Compilers")),
                FieldOp::Increment(FieldPath::attr(Attr::FailedLoginAttempts), 1),
            ],
            patch.ops()
        );
    }
}

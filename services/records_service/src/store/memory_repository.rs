use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::patch::{FieldOp, FieldPath, Patch, Segment};
use super::repository::{Document, DocumentStore, StoreError};
use super::types::{Attr, Collection};

/// In-process document store with the same per-document semantics as the DynamoDB one. A patch
/// is applied to a copy of the document and swapped in only once every operation succeeded.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, collection: Collection, id: &str, doc: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if docs.contains_key(id) {
            return Err(StoreError::Duplicate(id.to_owned()));
        }
        docs.insert(id.to_owned(), doc);

        Ok(())
    }

    async fn fetch(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;

        Ok(collections.get(&collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn find_by_username(&self, collection: Collection, username: &str) -> Result<Option<Document>, StoreError> {
        if !collection.has_usernames() {
            return Ok(None);
        }

        let collections = self.collections.read().await;
        let key = Attr::Username.to_string();
        let found = collections.get(&collection).and_then(|docs| {
            docs.values()
                .find(|doc| doc.get(&key).and_then(Value::as_str) == Some(username))
                .cloned()
        });

        Ok(found)
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;

        Ok(collections
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn apply(&self, collection: Collection, id: &str, patch: &Patch) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or(StoreError::NotFound)?;

        if patch.requirements().iter().any(|path| lookup(doc, path).is_none()) {
            return Err(StoreError::NotFound);
        }

        let mut updated = doc.clone();
        for op in patch.ops() {
            apply_op(&mut updated, op)?;
        }
        *doc = updated;

        Ok(())
    }

    async fn remove(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(&collection) {
            docs.remove(id);
        }

        Ok(())
    }
}

fn segment_name(segment: &Segment) -> String {
    match segment {
        Segment::Attr(attr) => attr.to_string(),
        Segment::Key(key) => key.clone(),
    }
}

fn lookup<'a>(doc: &'a Document, path: &FieldPath) -> Option<&'a Value> {
    let (first, rest) = path.segments().split_first()?;
    let mut current = doc.get(&segment_name(first))?;
    for segment in rest {
        current = current.as_object()?.get(&segment_name(segment))?;
    }
    Some(current)
}

/// The map holding the last segment of `path`, and that segment's name. Every intermediate map
/// must already exist.
fn parent_mut<'a>(doc: &'a mut Document, path: &FieldPath) -> Result<(&'a mut Map<String, Value>, String), StoreError> {
    let (leaf, parents) = path
        .segments()
        .split_last()
        .ok_or_else(|| StoreError::Malformed("empty field path".to_owned()))?;

    let mut current = doc;
    for segment in parents {
        current = match current.get_mut(&segment_name(segment)) {
            Some(Value::Object(inner)) => inner,
            _ => return Err(StoreError::Malformed(format!("{} is not a map", path))),
        };
    }

    Ok((current, segment_name(leaf)))
}

fn read_set(value: Option<&Value>, path: &FieldPath) -> Result<BTreeSet<String>, StoreError> {
    match value {
        None => Ok(BTreeSet::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| StoreError::Malformed(format!("{} holds a non-string member", path)))
            })
            .collect(),
        Some(_) => Err(StoreError::Malformed(format!("{} is not a set", path))),
    }
}

fn set_value(members: BTreeSet<String>) -> Value {
    Value::Array(members.into_iter().map(Value::String).collect())
}

fn apply_op(doc: &mut Document, op: &FieldOp) -> Result<(), StoreError> {
    let path = op.path();
    let (parent, leaf) = parent_mut(doc, path)?;

    match op {
        FieldOp::Set(_, value) => {
            parent.insert(leaf, value.clone());
        }
        FieldOp::SetIfAbsent(_, value) => {
            parent.entry(leaf).or_insert_with(|| value.clone());
        }
        FieldOp::Remove(_) => {
            parent.remove(&leaf);
        }
        FieldOp::Increment(_, by) => {
            let current = match parent.get(&leaf) {
                None => 0,
                Some(value) => value
                    .as_i64()
                    .ok_or_else(|| StoreError::Malformed(format!("{} is not an integer", path)))?,
            };
            parent.insert(leaf, Value::from(current + by));
        }
        FieldOp::AddToSet(_, members) => {
            let mut set = read_set(parent.get(&leaf), path)?;
            set.extend(members.iter().cloned());
            parent.insert(leaf, set_value(set));
        }
        FieldOp::RemoveFromSet(_, members) => {
            let mut set = read_set(parent.get(&leaf), path)?;
            set.retain(|m| !members.contains(m));
            if set.is_empty() {
                parent.remove(&leaf);
            } else {
                parent.insert(leaf, set_value(set));
            }
        }
        FieldOp::Push(_, values) => match parent.entry(leaf).or_insert_with(|| Value::Array(Vec::new())) {
            Value::Array(items) => items.extend(values.iter().cloned()),
            _ => return Err(StoreError::Malformed(format!("{} is not a list", path))),
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn store_with(collection: Collection, value: Value) -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new();
        let doc = doc(value);
        let id = doc["Id"].as_str().unwrap().to_owned();
        store.insert(collection, &id, doc).await.unwrap();
        store
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = store_with(Collection::Courses, json!({ "Id": "c1" })).await;

        let err = store
            .insert(Collection::Courses, "c1", doc(json!({ "Id": "c1" })))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Duplicate(id) if id == "c1"));
    }

    #[tokio::test]
    async fn set_if_absent_keeps_existing_entry() {
        let store = store_with(
            Collection::Students,
            json!({ "Id": "s1", "Courses": { "c1": { "Grade": 90.0 } } }),
        )
        .await;
        let patch = Patch::new()
            .set_if_absent(FieldPath::attr(Attr::Courses).key("c1"), json!({ "Grade": "Ungraded" }))
            .unwrap()
            .set_if_absent(FieldPath::attr(Attr::Courses).key("c2"), json!({ "Grade": "Ungraded" }))
            .unwrap();

        store.apply(Collection::Students, "s1", &patch).await.unwrap();

        let stored = store.fetch(Collection::Students, "s1").await.unwrap().unwrap();
        assert_eq!(json!(90.0), stored["Courses"]["c1"]["Grade"]);
        assert_eq!(json!("Ungraded"), stored["Courses"]["c2"]["Grade"]);
    }

    #[tokio::test]
    async fn sets_stay_sorted_and_vanish_when_emptied() {
        let store = store_with(Collection::Courses, json!({ "Id": "c1" })).await;
        let roster = FieldPath::attr(Attr::StudentIds);

        let add = Patch::new().add_to_set(roster.clone(), ["s2", "s1", "s2"]);
        store.apply(Collection::Courses, "c1", &add).await.unwrap();
        let stored = store.fetch(Collection::Courses, "c1").await.unwrap().unwrap();
        assert_eq!(json!(["s1", "s2"]), stored["StudentIds"]);

        let remove = Patch::new().remove_from_set(roster, ["s1", "s2"]);
        store.apply(Collection::Courses, "c1", &remove).await.unwrap();
        let stored = store.fetch(Collection::Courses, "c1").await.unwrap().unwrap();
        assert!(!stored.contains_key("StudentIds"));
    }

    #[tokio::test]
    async fn unmet_requirement_applies_nothing() {
        let store = store_with(
            Collection::Assignments,
            json!({ "Id": "a1", "Name": "Essay", "Submissions": {} }),
        )
        .await;
        let patch = Patch::new()
            .set(FieldPath::attr(Attr::Name), "Renamed")
            .unwrap()
            .require(FieldPath::attr(Attr::Submissions).key("s1"));

        let err = store.apply(Collection::Assignments, "a1", &patch).await.unwrap_err();

        assert!(matches!(err, StoreError::NotFound));
        let stored = store.fetch(Collection::Assignments, "a1").await.unwrap().unwrap();
        assert_eq!(json!("Essay"), stored["Name"]);
    }

    #[tokio::test]
    async fn failing_op_leaves_document_untouched() {
        let store = store_with(Collection::Students, json!({ "Id": "s1", "FailedLoginAttempts": 2 })).await;
        let patch = Patch::new()
            .increment(FieldPath::attr(Attr::FailedLoginAttempts), 1)
            .set(FieldPath::attr(Attr::Courses).key("c1").field(Attr::Grade), 80.0)
            .unwrap();

        let err = store.apply(Collection::Students, "s1", &patch).await.unwrap_err();

        assert!(matches!(err, StoreError::Malformed(_)));
        let stored = store.fetch(Collection::Students, "s1").await.unwrap().unwrap();
        assert_eq!(json!(2), stored["FailedLoginAttempts"]);
    }

    #[tokio::test]
    async fn increment_and_push_create_missing_attributes() {
        let store = store_with(Collection::Courses, json!({ "Id": "c1" })).await;
        let patch = Patch::new()
            .increment(FieldPath::attr(Attr::FailedLoginAttempts), 1)
            .push(FieldPath::attr(Attr::AssignmentIds), ["a1", "a2"])
            .unwrap();

        store.apply(Collection::Courses, "c1", &patch).await.unwrap();

        let stored = store.fetch(Collection::Courses, "c1").await.unwrap().unwrap();
        assert_eq!(json!(1), stored["FailedLoginAttempts"]);
        assert_eq!(json!(["a1", "a2"]), stored["AssignmentIds"]);
    }

    #[tokio::test]
    async fn patching_a_missing_document_is_not_found() {
        let store = MemoryDocumentStore::new();
        let patch = Patch::new().increment(FieldPath::attr(Attr::FailedLoginAttempts), 1);

        let err = store.apply(Collection::Teachers, "t1", &patch).await.unwrap_err();

        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn username_lookup_only_matches_exactly() {
        let store = store_with(Collection::Teachers, json!({ "Id": "t1", "Username": "grace" })).await;

        assert!(store
            .find_by_username(Collection::Teachers, "grace")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_by_username(Collection::Teachers, "Grace")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_by_username(Collection::Students, "grace")
            .await
            .unwrap()
            .is_none());
    }
}

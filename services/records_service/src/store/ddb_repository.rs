use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{PutItemError, PutItemErrorKind, UpdateItemError, UpdateItemErrorKind};
use aws_sdk_dynamodb::model::{AttributeValue, Select};
use aws_sdk_dynamodb::types::SdkError;
use common_macros::hash_map;
use serde::Deserialize;
use service_core::ddb::document::{from_item, to_attribute_value, to_item};
use service_core::ddb::items::{DeleteItem, DeleteItemInput, GetItem, GetItemInput, Item, PutItem, PutItemInput, UpdateItem, UpdateItemInput};
use service_core::ddb::pages::{Query, QueryInput, Scan, ScanInput};
use service_core::simple_err_map;

use super::patch::{FieldOp, FieldPath, Patch, Segment};
use super::repository::{Document, DocumentStore, StoreError};
use super::types::{Attr, Collection};

const USERNAME_INDEX: &str = "UsernameIndex";
const SCAN_PAGE_SIZE: i32 = 100;

pub trait ThreadSafeDdbClient: PutItem + GetItem + UpdateItem + DeleteItem + Query + Scan + Send + Sync {}
impl<T: PutItem + GetItem + UpdateItem + DeleteItem + Query + Scan + Send + Sync> ThreadSafeDdbClient for T {}

#[derive(Clone, Debug)]
pub struct TableNames {
    pub students: String,
    pub teachers: String,
    pub courses: String,
    pub assignments: String,
}

/// One DynamoDB table per collection, keyed by `Id`. Students and Teachers additionally carry a
/// `UsernameIndex` GSI (partition key `Username`, keys-only projection).
pub struct DdbDocumentStore<T: ThreadSafeDdbClient> {
    ddb: T,
    tables: TableNames,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UsernameIndexProjection {
    id: String,
}

/// A [`Patch`] rendered as DynamoDB expressions.
#[derive(Debug, PartialEq)]
pub(crate) struct UpdateExpression {
    pub update: String,
    pub condition: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl TableNames {
    pub fn for_collection(&self, collection: Collection) -> &str {
        match collection {
            Collection::Students => &self.students,
            Collection::Teachers => &self.teachers,
            Collection::Courses => &self.courses,
            Collection::Assignments => &self.assignments,
        }
    }
}

impl<T: ThreadSafeDdbClient> DdbDocumentStore<T> {
    pub fn new(ddb: T, tables: TableNames) -> Self {
        Self { ddb, tables }
    }

    fn key(id: &str) -> Item {
        hash_map! {
            Attr::Id.to_string() => AttributeValue::S(id.to_owned()),
        }
    }
}

#[async_trait]
impl<T: ThreadSafeDdbClient> DocumentStore for DdbDocumentStore<T> {
    async fn insert(&self, collection: Collection, id: &str, doc: Document) -> Result<(), StoreError> {
        let put_item_input = PutItemInput::builder()
            .table_name(self.tables.for_collection(collection))
            .item(to_item(&doc))
            .condition_expression("attribute_not_exists(Id)")
            .build();

        self.ddb.put_item(put_item_input).await.map_err(|err| match err {
            SdkError::ServiceError {
                err:
                    PutItemError {
                        kind: PutItemErrorKind::ConditionalCheckFailedException(_),
                        ..
                    },
                ..
            } => StoreError::Duplicate(id.to_owned()),
            e => {
                tracing::error!(error = ?e, %collection, id, "Failed to put item in DynamoDB.");
                StoreError::Unavailable(e.to_string())
            }
        })?;

        Ok(())
    }

    async fn fetch(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let get_item_input = GetItemInput::builder()
            .table_name(self.tables.for_collection(collection))
            .key(Self::key(id))
            .consistent_read(true)
            .build();
        let output = self.ddb.get_item(get_item_input).await.map_err(|e| {
            tracing::error!(error = ?e, %collection, id, "Failed to get item from DynamoDB.");
            StoreError::Unavailable(e.to_string())
        })?;

        output
            .item
            .map(|item| from_item(item).map_err(|e| StoreError::Malformed(e.to_string())))
            .transpose()
    }

    async fn find_by_username(&self, collection: Collection, username: &str) -> Result<Option<Document>, StoreError> {
        if !collection.has_usernames() {
            return Ok(None);
        }

        let query_input = QueryInput::builder()
            .table_name(self.tables.for_collection(collection))
            .index_name(USERNAME_INDEX)
            .key_condition_expression("Username = :username")
            .select(Select::AllProjectedAttributes)
            .expression_attribute_values(Some(hash_map! {
                ":username".to_string() => AttributeValue::S(username.to_owned()),
            }))
            .limit(1)
            .build();
        let output = self.ddb.query(query_input).await.map_err(|e| {
            tracing::error!(error = ?e, %collection, "Failed to query DynamoDB.");
            StoreError::Unavailable(e.to_string())
        })?;

        let item = match output.items.and_then(|mut items| items.pop()) {
            Some(item) => item,
            None => return Ok(None),
        };
        let projection: UsernameIndexProjection = from_item(item)
            .map_err(|e| StoreError::Malformed(e.to_string()))
            .and_then(|doc| serde_json::from_value(doc.into()).map_err(StoreError::from))?;

        let doc = self.fetch(collection, &projection.id).await?;
        if doc.is_none() {
            tracing::warn!(%collection, id = %projection.id, "Item found on Query, but not found on GetItem.");
        }
        Ok(doc)
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let mut docs = Vec::new();
        let mut start_key = None;

        loop {
            let scan_input = ScanInput::builder()
                .table_name(self.tables.for_collection(collection))
                .limit(SCAN_PAGE_SIZE)
                .exclusive_start_key(start_key.take())
                .consistent_read(true)
                .build();
            let output = self.ddb.scan(scan_input).await.map_err(|e| {
                tracing::error!(error = ?e, %collection, "Failed to scan DynamoDB table.");
                StoreError::Unavailable(e.to_string())
            })?;

            for item in output.items.unwrap_or_default() {
                docs.push(from_item(item).map_err(|e| StoreError::Malformed(e.to_string()))?);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(docs)
    }

    async fn apply(&self, collection: Collection, id: &str, patch: &Patch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }

        let expression = UpdateExpression::compile(patch);
        tracing::debug!(%collection, id, update = %expression.update, condition = %expression.condition);

        let update_item_input = UpdateItemInput::builder()
            .table_name(self.tables.for_collection(collection))
            .key(Self::key(id))
            .update_expression(expression.update)
            .condition_expression(expression.condition)
            .expression_attribute_names(expression.names)
            .expression_attribute_values((!expression.values.is_empty()).then(|| expression.values))
            .build();

        self.ddb.update_item(update_item_input).await.map_err(|err| match err {
            SdkError::ServiceError {
                err:
                    UpdateItemError {
                        kind: UpdateItemErrorKind::ConditionalCheckFailedException(_),
                        ..
                    },
                ..
            } => StoreError::NotFound,
            e => {
                tracing::error!(error = ?e, %collection, id, "Failed to update item in DynamoDB.");
                StoreError::Unavailable(e.to_string())
            }
        })?;

        Ok(())
    }

    async fn remove(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let delete_item_input = DeleteItemInput::builder()
            .table_name(self.tables.for_collection(collection))
            .key(Self::key(id))
            .build();

        self.ddb
            .delete_item(delete_item_input)
            .await
            .map_err(simple_err_map!("Failed to delete item from DynamoDB.", StoreError::Unavailable(id.to_owned())))?;

        Ok(())
    }
}

impl UpdateExpression {
    /// Renders every operation of `patch` into a single `UpdateItem` expression. The condition
    /// always requires the item to exist, since `UpdateItem` would otherwise create it.
    pub(crate) fn compile(patch: &Patch) -> Self {
        let mut builder = ExpressionBuilder::default();
        let mut set = Vec::new();
        let mut add = Vec::new();
        let mut delete = Vec::new();
        let mut remove = Vec::new();

        for op in patch.ops() {
            let path = builder.path(op.path());
            match op {
                FieldOp::Set(_, value) => {
                    let value = builder.value(to_attribute_value(value));
                    set.push(format!("{} = {}", path, value));
                }
                FieldOp::SetIfAbsent(_, value) => {
                    let value = builder.value(to_attribute_value(value));
                    set.push(format!("{} = if_not_exists({}, {})", path, path, value));
                }
                FieldOp::Push(_, values) => {
                    let empty = builder.value(AttributeValue::L(Vec::new()));
                    let values = builder.value(AttributeValue::L(values.iter().map(to_attribute_value).collect()));
                    set.push(format!("{} = list_append(if_not_exists({}, {}), {})", path, path, empty, values));
                }
                FieldOp::Increment(_, by) => {
                    let value = builder.value(AttributeValue::N(by.to_string()));
                    add.push(format!("{} {}", path, value));
                }
                FieldOp::AddToSet(_, members) => {
                    let value = builder.value(AttributeValue::Ss(members.iter().cloned().collect()));
                    add.push(format!("{} {}", path, value));
                }
                FieldOp::RemoveFromSet(_, members) => {
                    let value = builder.value(AttributeValue::Ss(members.iter().cloned().collect()));
                    delete.push(format!("{} {}", path, value));
                }
                FieldOp::Remove(_) => remove.push(path),
            }
        }

        let mut clauses = Vec::new();
        for (keyword, parts) in [("SET", set), ("ADD", add), ("DELETE", delete), ("REMOVE", remove)] {
            if !parts.is_empty() {
                clauses.push(format!("{} {}", keyword, parts.join(", ")));
            }
        }

        let mut conditions = vec![format!("attribute_exists({})", builder.path(&FieldPath::attr(Attr::Id)))];
        for path in patch.requirements() {
            conditions.push(format!("attribute_exists({})", builder.path(path)));
        }

        UpdateExpression {
            update: clauses.join(" "),
            condition: conditions.join(" AND "),
            names: builder.names,
            values: builder.values,
        }
    }
}

/// Allocates `#nN` / `:vN` placeholders. Every path segment goes through a name placeholder,
/// since map keys are arbitrary ids and attribute names may be reserved words.
#[derive(Default)]
struct ExpressionBuilder {
    names: HashMap<String, String>,
    placeholders: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl ExpressionBuilder {
    fn name(&mut self, raw: String) -> String {
        if let Some(existing) = self.placeholders.get(&raw) {
            return existing.clone();
        }
        let placeholder = format!("#n{}", self.placeholders.len());
        self.names.insert(placeholder.clone(), raw.clone());
        self.placeholders.insert(raw, placeholder.clone());
        placeholder
    }

    fn path(&mut self, path: &FieldPath) -> String {
        path.segments()
            .iter()
            .map(|segment| match segment {
                Segment::Attr(attr) => self.name(attr.to_string()),
                Segment::Key(key) => self.name(key.clone()),
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }
}

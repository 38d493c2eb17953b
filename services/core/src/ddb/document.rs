//! Conversion between JSON documents and DynamoDB items.
//!
//! Services keep their records as `serde_json` objects (that is what `serde` gives us for free for
//! any `Serialize` type) and only translate to [`AttributeValue`]s at the table boundary.
//!
//! The mapping is:
//!
//! | JSON     | DynamoDB       |
//! |----------|----------------|
//! | null     | `NULL`         |
//! | bool     | `BOOL`         |
//! | number   | `N`            |
//! | string   | `S`            |
//! | array    | `L`            |
//! | object   | `M`            |
//!
//! On the way back `SS` and `NS` sets are read as arrays, so a field stored as a set deserializes
//! into any sequence type. Binary attributes are not used by any service and are rejected.

use std::collections::HashMap;

use aws_sdk_dynamodb::model::AttributeValue;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::items::Item;

#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("Attribute {0} holds a number that cannot be represented: {1}.")]
    InvalidNumber(String, String),

    #[error("Attribute {0} holds an unsupported DynamoDB type.")]
    Unsupported(String),
}

pub fn to_item(doc: &Map<String, Value>) -> Item {
    doc.iter()
        .map(|(k, v)| (k.clone(), to_attribute_value(v)))
        .collect()
}

pub fn from_item(item: Item) -> Result<Map<String, Value>, DocumentError> {
    item.into_iter()
        .map(|(k, v)| {
            let value = from_attribute_value(&k, v)?;
            Ok((k, value))
        })
        .collect()
}

pub fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute_value).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), to_attribute_value(v)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

/// Reads an attribute back into JSON. `name` is only used to produce useful error messages.
pub fn from_attribute_value(name: &str, value: AttributeValue) -> Result<Value, DocumentError> {
    match value {
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::Bool(b) => Ok(Value::Bool(b)),
        AttributeValue::S(s) => Ok(Value::String(s)),
        AttributeValue::N(n) => parse_number(name, &n).map(Value::Number),
        AttributeValue::Ss(set) => Ok(Value::Array(set.into_iter().map(Value::String).collect())),
        AttributeValue::Ns(set) => set
            .iter()
            .map(|n| parse_number(name, n).map(Value::Number))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::L(items) => items
            .into_iter()
            .map(|v| from_attribute_value(name, v))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::M(fields) => fields
            .into_iter()
            .map(|(k, v)| {
                let value = from_attribute_value(&k, v)?;
                Ok((k, value))
            })
            .collect::<Result<Map<_, _>, _>>()
            .map(Value::Object),
        _ => Err(DocumentError::Unsupported(name.to_owned())),
    }
}

fn parse_number(name: &str, raw: &str) -> Result<Number, DocumentError> {
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(i.into());
    }
    if let Ok(u) = raw.parse::<u64>() {
        return Ok(u.into());
    }

    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| DocumentError::InvalidNumber(name.to_owned(), raw.to_owned()))
}

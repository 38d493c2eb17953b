//! Single-item operations: each call touches exactly one item and is atomic at that level.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DeleteItemError, GetItemError, PutItemError, UpdateItemError};
use aws_sdk_dynamodb::model::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::output::{DeleteItemOutput, GetItemOutput, PutItemOutput, UpdateItemOutput};
use aws_sdk_dynamodb::types::SdkError;
use typed_builder::TypedBuilder;

use super::adapter::Adapter;

/// Raw DynamoDB item, also used for keys.
pub type Item = HashMap<String, AttributeValue>;

#[derive(TypedBuilder, Clone, Debug)]
pub struct GetItemInput {
    #[builder(setter(into))]
    pub table_name: String,

    pub key: Item,

    #[builder(default = false)]
    pub consistent_read: bool,

    #[builder(default, setter(strip_option, into))]
    pub projection_expression: Option<String>,

    #[builder(default, setter(strip_option))]
    pub expression_attribute_names: Option<HashMap<String, String>>,
}

#[derive(TypedBuilder, Clone, Debug)]
pub struct PutItemInput {
    #[builder(setter(into))]
    pub table_name: String,

    #[builder(setter(into))]
    pub item: Item,

    #[builder(default, setter(strip_option, into))]
    pub condition_expression: Option<String>,

    #[builder(default, setter(strip_option))]
    pub expression_attribute_names: Option<HashMap<String, String>>,

    #[builder(default, setter(strip_option))]
    pub expression_attribute_values: Option<Item>,
}

#[derive(TypedBuilder, Clone, Debug)]
pub struct UpdateItemInput {
    #[builder(setter(into))]
    pub table_name: String,

    #[builder(setter(into))]
    pub key: Item,

    #[builder(setter(into))]
    pub update_expression: String,

    #[builder(default, setter(strip_option))]
    pub return_values: Option<ReturnValue>,

    #[builder(default, setter(strip_option, into))]
    pub condition_expression: Option<String>,

    #[builder(default, setter(strip_option))]
    pub expression_attribute_names: Option<HashMap<String, String>>,

    /// DynamoDB rejects an empty map here, so expressions without values must pass `None`.
    #[builder(default)]
    pub expression_attribute_values: Option<Item>,
}

#[derive(TypedBuilder, Clone, Debug)]
pub struct DeleteItemInput {
    #[builder(setter(into))]
    pub table_name: String,

    pub key: Item,

    #[builder(default, setter(strip_option, into))]
    pub condition_expression: Option<String>,
}

#[async_trait]
pub trait GetItem {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, SdkError<GetItemError>>;
}

#[async_trait]
pub trait PutItem {
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, SdkError<PutItemError>>;
}

#[async_trait]
pub trait UpdateItem {
    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, SdkError<UpdateItemError>>;
}

#[async_trait]
pub trait DeleteItem {
    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, SdkError<DeleteItemError>>;
}

#[async_trait]
impl GetItem for Adapter {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, SdkError<GetItemError>> {
        self.raw
            .get_item()
            .table_name(input.table_name)
            .set_key(Some(input.key))
            .consistent_read(input.consistent_read)
            .set_projection_expression(input.projection_expression)
            .set_expression_attribute_names(input.expression_attribute_names)
            .send()
            .await
    }
}

#[async_trait]
impl PutItem for Adapter {
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, SdkError<PutItemError>> {
        self.raw
            .put_item()
            .table_name(input.table_name)
            .set_item(Some(input.item))
            .set_condition_expression(input.condition_expression)
            .set_expression_attribute_names(input.expression_attribute_names)
            .set_expression_attribute_values(input.expression_attribute_values)
            .send()
            .await
    }
}

#[async_trait]
impl UpdateItem for Adapter {
    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, SdkError<UpdateItemError>> {
        self.raw
            .update_item()
            .table_name(input.table_name)
            .set_key(Some(input.key))
            .update_expression(input.update_expression)
            .set_return_values(input.return_values)
            .set_condition_expression(input.condition_expression)
            .set_expression_attribute_names(input.expression_attribute_names)
            .set_expression_attribute_values(input.expression_attribute_values)
            .send()
            .await
    }
}

#[async_trait]
impl DeleteItem for Adapter {
    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, SdkError<DeleteItemError>> {
        self.raw
            .delete_item()
            .table_name(input.table_name)
            .set_key(Some(input.key))
            .set_condition_expression(input.condition_expression)
            .send()
            .await
    }
}

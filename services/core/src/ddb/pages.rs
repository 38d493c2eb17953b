//! Multi-item reads. Both calls return at most one page; callers follow `last_evaluated_key`.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{QueryError, ScanError};
use aws_sdk_dynamodb::model::Select;
use aws_sdk_dynamodb::output::{QueryOutput, ScanOutput};
use aws_sdk_dynamodb::types::SdkError;
use typed_builder::TypedBuilder;

use super::adapter::Adapter;
use super::items::Item;

#[derive(Debug, Clone, TypedBuilder)]
pub struct QueryInput {
    #[builder(setter(into))]
    pub table_name: String,

    #[builder(default, setter(strip_option, into))]
    pub index_name: Option<String>,

    #[builder(setter(into))]
    pub limit: i32,

    #[builder(default, setter(strip_option))]
    pub select: Option<Select>,

    #[builder(default)]
    pub exclusive_start_key: Option<Item>,

    #[builder(setter(into))]
    pub key_condition_expression: String,

    #[builder(default, setter(strip_option, into))]
    pub projection_expression: Option<String>,

    #[builder(default)]
    pub expression_attribute_names: Option<HashMap<String, String>>,

    #[builder(default)]
    pub expression_attribute_values: Option<Item>,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct ScanInput {
    #[builder(setter(into))]
    pub table_name: String,

    #[builder(setter(into))]
    pub limit: i32,

    #[builder(default)]
    pub exclusive_start_key: Option<Item>,

    #[builder(default, setter(strip_option, into))]
    pub projection_expression: Option<String>,

    #[builder(default = false)]
    pub consistent_read: bool,
}

#[async_trait]
pub trait Query {
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, SdkError<QueryError>>;
}

#[async_trait]
pub trait Scan {
    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, SdkError<ScanError>>;
}

#[async_trait]
impl Query for Adapter {
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, SdkError<QueryError>> {
        self.raw
            .query()
            .table_name(input.table_name)
            .set_index_name(input.index_name)
            .limit(input.limit)
            .set_select(input.select)
            .set_exclusive_start_key(input.exclusive_start_key)
            .set_projection_expression(input.projection_expression)
            .set_expression_attribute_names(input.expression_attribute_names)
            .set_expression_attribute_values(input.expression_attribute_values)
            .key_condition_expression(input.key_condition_expression)
            .send()
            .await
    }
}

#[async_trait]
impl Scan for Adapter {
    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, SdkError<ScanError>> {
        self.raw
            .scan()
            .table_name(input.table_name)
            .limit(input.limit)
            .set_exclusive_start_key(input.exclusive_start_key)
            .set_projection_expression(input.projection_expression)
            .consistent_read(input.consistent_read)
            .send()
            .await
    }
}

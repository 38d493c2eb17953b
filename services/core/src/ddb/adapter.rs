use aws_sdk_dynamodb::Client as RawClient;

/// Thin handle around the SDK client. Every DynamoDB call made by the services goes through one of
/// the traits in [`super::items`] and [`super::pages`], which this type implements, so that
/// repositories can be written against the traits and tested without a live table.
#[derive(Debug, Clone)]
pub struct Adapter {
    pub(crate) raw: RawClient,
}

impl From<RawClient> for Adapter {
    fn from(raw: RawClient) -> Self {
        Adapter { raw }
    }
}

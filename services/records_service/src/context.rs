use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use service_core::ddb::Adapter;
use thiserror::Error;

use crate::artifacts::LocalArtifactStore;
use crate::store::{DdbDocumentStore, EntityStore, TableNames};

pub enum ContextKey {
    DynamoDbEndpoint,
    StudentsTableName,
    TeachersTableName,
    CoursesTableName,
    AssignmentsTableName,
    ArtifactsDir,
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Environment variable {0} must be set.")]
    MissingKey(String),

    #[error("Invalid DynamoDB endpoint {0}: {1}")]
    InvalidEndpoint(String, http::uri::InvalidUri),
}

/// Everything the records operations need from the environment.
pub struct Context {
    pub dynamodb_adapter: Adapter,
    pub tables: TableNames,
    pub artifacts_dir: PathBuf,
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DynamoDbEndpoint => write!(f, "DYNAMODB_ENDPOINT"),
            Self::StudentsTableName => write!(f, "STUDENTS_TABLE_NAME"),
            Self::TeachersTableName => write!(f, "TEACHERS_TABLE_NAME"),
            Self::CoursesTableName => write!(f, "COURSES_TABLE_NAME"),
            Self::AssignmentsTableName => write!(f, "ASSIGNMENTS_TABLE_NAME"),
            Self::ArtifactsDir => write!(f, "ARTIFACTS_DIR"),
        }
    }
}

impl Context {
    /// Reads the configuration from the environment. AWS credentials and region come from the
    /// standard AWS environment chain; `DYNAMODB_ENDPOINT` overrides the endpoint, e.g. for a
    /// local DynamoDB.
    pub async fn from_env() -> Result<Self, ContextError> {
        let tables = TableNames {
            students: Context::required(ContextKey::StudentsTableName)?,
            teachers: Context::required(ContextKey::TeachersTableName)?,
            courses: Context::required(ContextKey::CoursesTableName)?,
            assignments: Context::required(ContextKey::AssignmentsTableName)?,
        };
        let artifacts_dir = PathBuf::from(Context::required(ContextKey::ArtifactsDir)?);

        let shared_config = aws_config::load_from_env().await;
        let dynamodb_config = if let Some(endpoint) = Context::key(&ContextKey::DynamoDbEndpoint) {
            let uri = http::Uri::from_str(&endpoint).map_err(|e| ContextError::InvalidEndpoint(endpoint.clone(), e))?;
            tracing::info!(%endpoint, "Using DynamoDB with custom endpoint.");
            aws_sdk_dynamodb::config::Builder::from(&shared_config)
                .endpoint_resolver(aws_sdk_dynamodb::Endpoint::immutable(uri))
                .build()
        } else {
            aws_sdk_dynamodb::config::Config::new(&shared_config)
        };

        let client = aws_sdk_dynamodb::Client::from_conf(dynamodb_config);
        Ok(Context {
            dynamodb_adapter: client.into(),
            tables,
            artifacts_dir,
        })
    }

    pub fn key(key: &ContextKey) -> Option<String> {
        env::var(key.to_string()).ok()
    }

    fn required(key: ContextKey) -> Result<String, ContextError> {
        Context::key(&key).ok_or_else(|| ContextError::MissingKey(key.to_string()))
    }

    pub fn entity_store(&self) -> EntityStore {
        EntityStore::new(Arc::new(DdbDocumentStore::new(
            self.dynamodb_adapter.clone(),
            self.tables.clone(),
        )))
    }

    pub fn artifact_store(&self) -> LocalArtifactStore {
        LocalArtifactStore::new(&self.artifacts_dir)
    }
}

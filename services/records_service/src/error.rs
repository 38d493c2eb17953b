use chrono::{DateTime, Utc};
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::{Code, OperationError};
use thiserror::Error;

use crate::model::{ArtifactRef, EntityKind};

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("{0} {1} not found.")]
    NotFound(EntityKind, String),

    #[error("{0} {1} already exists.")]
    AlreadyExists(EntityKind, String),

    /// Some submission artifacts survived a cascade delete. Re-issuing the delete retries them.
    #[error("{} submission artifact(s) could not be deleted.", .0.len())]
    PartialCleanup(Vec<ArtifactRef>),

    #[error("Account is locked until {0}.")]
    AccountLocked(DateTime<Utc>),

    #[error("Provided credentials are invalid.")]
    InvalidCredentials,
}

pub type RecordsResult<T> = Result<T, EndpointError<RecordsError>>;

impl OperationError for RecordsError {
    fn code(&self) -> Code {
        match self {
            Self::NotFound(..) => Code::NotFound,
            Self::AlreadyExists(..) => Code::AlreadyExists,
            Self::PartialCleanup(_) => Code::Aborted,
            Self::AccountLocked(_) => Code::PermissionDenied,
            Self::InvalidCredentials => Code::Unauthenticated,
        }
    }
}

pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> EndpointError<RecordsError> {
    EndpointError::operation(RecordsError::NotFound(kind, id.into()))
}

/// Rejects blank identifiers before they reach the datastore.
pub(crate) fn require_id(value: &str, what: &str) -> RecordsResult<()> {
    if value.trim().is_empty() {
        return Err(EndpointError::validation(format!("{} must be provided.", what)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_cleanup_is_retryable() {
        let err = RecordsError::PartialCleanup(vec![ArtifactRef::new("a.pdf")]);

        assert!(err.code().is_retryable());
        assert_eq!("1 submission artifact(s) could not be deleted.", err.to_string());
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = RecordsError::NotFound(EntityKind::Course, "c-1".to_string());

        assert_eq!("Course c-1 not found.", err.to_string());
        assert!(!err.code().is_retryable());
    }
}

use std::error::Error;
use std::fmt::Display;

use strum::AsRefStr;

use crate::operation_error::{Code, OperationError};

/// Error returned by a public service operation: either one of the failure kinds every operation
/// shares, or an operation-specific error `E`.
#[derive(Debug, AsRefStr)]
pub enum EndpointError<E: OperationError> {
    /// The caller's input is malformed. Never retried.
    Validation(String),
    /// The datastore could not be reached or rejected the call for capacity reasons.
    Unavailable,
    /// Stored data could not be interpreted.
    Internal,
    Operation(E),
}

impl<E: OperationError> EndpointError<E> {
    pub fn validation(msg: impl Into<String>) -> Self {
        EndpointError::Validation(msg.into())
    }

    pub fn unavailable() -> Self {
        EndpointError::Unavailable
    }

    pub fn internal() -> Self {
        EndpointError::Internal
    }

    pub fn operation(err: E) -> Self {
        EndpointError::Operation(err)
    }

    /// The operation-specific error, if that is what this is.
    pub fn as_operation(&self) -> Option<&E> {
        match self {
            EndpointError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: OperationError> OperationError for EndpointError<E> {
    fn code(&self) -> Code {
        match self {
            EndpointError::Validation(_) => Code::InvalidArgument,
            EndpointError::Unavailable => Code::Unavailable,
            EndpointError::Internal => Code::Internal,
            EndpointError::Operation(e) => e.code(),
        }
    }
}

impl<E: OperationError> Error for EndpointError<E> {}

impl<E: OperationError> Display for EndpointError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind: &str = self.as_ref();
        let msg = match self {
            EndpointError::Validation(msg) => msg.clone(),
            EndpointError::Unavailable => String::from("Datastore unavailable, retry later."),
            EndpointError::Internal => String::from("Internal server error."),
            EndpointError::Operation(err) => err.to_string(),
        };

        write!(f, "{}: {}", kind, msg)
    }
}

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Coarse classification of a failed operation, shared by every service so callers can decide
/// what to surface and what to retry without knowing each operation's error type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Code {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    Unauthenticated,
    /// The operation stopped part-way and left work to be redone by re-issuing it.
    Aborted,
    /// Transient infrastructure fault.
    Unavailable,
    Internal,
}

impl Code {
    /// Whether re-issuing the whole operation unchanged can be expected to succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Code::Unavailable | Code::Aborted)
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Trait to be implemented by errors returned by the different operations of services.
pub trait OperationError: Error {
    fn code(&self) -> Code;
}

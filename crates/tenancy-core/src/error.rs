use std::fmt;

use tenancy_gate::GateError;
use tenancy_store::{ErrorClass, StoreError};
use tenancy_types::TypeError;
use thiserror::Error;

/// Errors returned by every lifecycle operation.
///
/// Each variant carries a human-readable message that embeds the text of
/// the underlying failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The authorization gate rejected the caller.
    #[error("{0}")]
    Unauthorized(String),

    /// The request body was absent or malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The resource or tenant does not exist, or a list came back empty.
    #[error("{0}")]
    NotFound(String),

    /// Name collision on create, or revision mismatch on update.
    #[error("{0}")]
    Conflict(String),

    /// A delete was blocked because other resources still reference the
    /// target.
    #[error("{0}")]
    IntegrityViolation(String),

    /// Datastore, serialization, or deadline failure not otherwise classified.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::IntegrityViolation(_) => ErrorKind::IntegrityViolation,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The same kind of error with `context` prepended to its message.
    pub fn context(self, context: impl fmt::Display) -> Self {
        let wrap = |m: String| format!("{context}: {m}");
        match self {
            Self::Unauthorized(m) => Self::Unauthorized(wrap(m)),
            Self::BadRequest(m) => Self::BadRequest(wrap(m)),
            Self::NotFound(m) => Self::NotFound(wrap(m)),
            Self::Conflict(m) => Self::Conflict(wrap(m)),
            Self::IntegrityViolation(m) => Self::IntegrityViolation(wrap(m)),
            Self::Internal(m) => Self::Internal(wrap(m)),
        }
    }
}

/// Discriminant of [`CoreError`], for callers that branch on the class only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    BadRequest,
    NotFound,
    Conflict,
    IntegrityViolation,
    Internal,
}

impl ErrorKind {
    /// Conventional HTTP status for outer surfaces.
    ///
    /// Integrity violations get their own 422 rather than collapsing into
    /// the generic 500.
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::Unauthorized => 403,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::IntegrityViolation => 422,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthorized => "unauthorized",
            Self::BadRequest => "bad-request",
            Self::NotFound => "not-found",
            Self::Conflict => "conflict",
            Self::IntegrityViolation => "integrity-violation",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e.class() {
            ErrorClass::NotFound => Self::NotFound(e.to_string()),
            ErrorClass::Conflict => Self::Conflict(e.to_string()),
            ErrorClass::Other => Self::Internal(e.to_string()),
        }
    }
}

impl From<GateError> for CoreError {
    fn from(e: GateError) -> Self {
        Self::Unauthorized(e.to_string())
    }
}

impl From<TypeError> for CoreError {
    fn from(e: TypeError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

/// Result alias for lifecycle operations.
pub type CoreResult<T> = Result<T, CoreError>;

//! Command-side error model.

use thiserror::Error;

/// Result type used across the command side.
pub type Result<T> = core::result::Result<T, Error>;

/// Error returned by every public command.
///
/// The variants form a closed taxonomy so transport layers can map them to
/// status codes without inspecting messages. Validation and precondition
/// errors are always produced before anything is pushed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed or missing input, detected before any IO.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The target does not exist (or is in a terminal state).
    #[error("not found: {0}")]
    NotFound(String),

    /// An "add" targets an entity or unique key that is already taken.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The state transition is not allowed, a dependency is missing or
    /// inactive, or a strict change produced no diff.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The permission gate refused the request.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Optimistic concurrency collision on push.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller-supplied deadline elapsed while waiting on a port.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Collaborator failure (storage, crypto, id generation, decoding).
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Stable, lowercase name of the error kind (for logs and metrics labels).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::PreconditionFailed(_) => "precondition_failed",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Conflict(_) => "conflict",
            Self::DeadlineExceeded(_) => "deadline_exceeded",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(format!("payload serialization failed: {value}"))
    }
}

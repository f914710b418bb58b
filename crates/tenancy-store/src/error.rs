use tenancy_types::ResourceKind;

/// Message fragment document stores use for a missing document.
pub const NOT_FOUND_TEXT: &str = "status 404 - not found";
/// Message fragment document stores use for a revision mismatch.
pub const CONFLICT_TEXT: &str = "status 409 - conflict";
/// Message fragment document stores use for a duplicate on create.
pub const ALREADY_EXISTS_TEXT: &str = "already exists";

/// Errors from revisioned store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No document with this ID exists in the requested scope.
    #[error("{} {id} not found", kind.display_name())]
    NotFound { kind: ResourceKind, id: String },

    /// The write collided with existing state: a duplicate on create or a
    /// stale revision on update.
    #[error("{} {id} conflict: {reason}", kind.display_name())]
    Conflict {
        kind: ResourceKind,
        id: String,
        reason: String,
    },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Any other failure reported by the storage backend.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn conflict(kind: ResourceKind, id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Build a typed error from a backend that only reports message text.
    ///
    /// Recognises the conventional document-store phrases; everything else
    /// becomes [`StoreError::Backend`].
    pub fn from_backend_message(kind: ResourceKind, id: impl Into<String>, message: &str) -> Self {
        let lowered = message.to_lowercase();
        if lowered.contains(NOT_FOUND_TEXT) {
            Self::not_found(kind, id)
        } else if lowered.contains(CONFLICT_TEXT) || lowered.contains(ALREADY_EXISTS_TEXT) {
            Self::conflict(kind, id, message)
        } else {
            Self::Backend(message.to_string())
        }
    }

    /// Classify this error for the calling layer.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::Conflict { .. } => ErrorClass::Conflict,
            Self::Serialization(_) | Self::Backend(_) => ErrorClass::Other,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Coarse classification of a store failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    NotFound,
    Conflict,
    Other,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

//! Storage error types.

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("User not found: {id}")]
    NotFound { id: String },

    /// `create` with an id that is already taken.
    #[error("User already exists: {id}")]
    AlreadyExists { id: String },

    /// The client sent attributes the store cannot accept.
    #[error("Invalid user: {message}")]
    InvalidResource { message: String },

    /// Misuse of a `UserTransaction`, e.g. saving a user it never loaded.
    #[error("Transaction failed: {message}")]
    TransactionError { message: String },

    #[error("Storage failure: {message}")]
    Internal { message: String },
}

impl StorageError {
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    #[must_use]
    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    #[must_use]
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transaction_error(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Coarse classification used as a log field.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::Missing,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::InvalidResource { .. } => ErrorCategory::Client,
            Self::TransactionError { .. } | Self::Internal { .. } => ErrorCategory::Backend,
        }
    }
}

impl From<scimpatch_core::CoreError> for StorageError {
    fn from(err: scimpatch_core::CoreError) -> Self {
        Self::invalid_resource(err.to_string())
    }
}

/// Categories of storage errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Missing,
    Conflict,
    /// Caused by the request content.
    Client,
    /// Caused by the backend; never the client's fault.
    Backend,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Missing => "missing",
            Self::Conflict => "conflict",
            Self::Client => "client",
            Self::Backend => "backend",
        })
    }
}

use scimpatch_filter::FilterError;
use thiserror::Error;

/// Errors that abort a PATCH request.
///
/// Anything not listed here is not an error: an operation that leaves the
/// resource as it was is reported through `PatchOutcome::changed`.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Invalid path '{path}': {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: FilterError,
    },

    #[error("Invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    #[error("Invalid PATCH request: {0}")]
    InvalidSyntax(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("No target: {0}")]
    NoTarget(String),

    #[error("Attribute '{0}' is read-only")]
    Mutability(String),

    #[error("Attribute '{path}' is {actual}, expected {expected}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl PatchError {
    pub fn invalid_path(path: impl Into<String>, source: FilterError) -> Self {
        Self::InvalidPath {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_syntax(message: impl Into<String>) -> Self {
        Self::InvalidSyntax(message.into())
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }

    pub fn no_target(message: impl Into<String>) -> Self {
        Self::NoTarget(message.into())
    }

    pub fn mutability(attribute: impl Into<String>) -> Self {
        Self::Mutability(attribute.into())
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented(message.into())
    }

    /// RFC 7644 §3.12 `scimType` keyword for this error.
    pub fn scim_type(&self) -> Option<&'static str> {
        match self {
            Self::InvalidPath { .. } => Some("invalidPath"),
            Self::InvalidFilter(_) => Some("invalidFilter"),
            Self::InvalidSyntax(_) => Some("invalidSyntax"),
            Self::InvalidValue(_) | Self::TypeMismatch { .. } => Some("invalidValue"),
            Self::NoTarget(_) => Some("noTarget"),
            Self::Mutability(_) => Some("mutability"),
            Self::NotImplemented(_) => None,
        }
    }

    /// Whether the request itself was malformed (path, filter or body).
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath { .. } | Self::InvalidFilter(_) | Self::InvalidSyntax(_)
        )
    }
}

use thiserror::Error;

/// Errors raised while parsing, validating or evaluating filters and paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Invalid syntax at position {position}: {message}")]
    Syntax { message: String, position: usize },

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Operator '{op}' cannot be applied to attribute '{attribute}'")]
    InvalidOperator { op: String, attribute: String },

    /// Returned by [`crate::Validator::passes_filter`] when the resource does
    /// not match.
    #[error("Resource does not match the filter")]
    NoMatch,
}

impl FilterError {
    pub fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            position,
        }
    }

    pub fn unknown_attribute(name: impl Into<String>) -> Self {
        Self::UnknownAttribute(name.into())
    }

    /// Whether this error comes from malformed input rather than from
    /// evaluation.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }
}

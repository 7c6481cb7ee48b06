use thiserror::Error;

/// Errors raised while building attribute values from client data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A resource body that is not a JSON object.
    #[error("resource attributes must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },

    #[error("invalid value for attribute '{attribute}': {reason}")]
    InvalidValue { attribute: String, reason: String },
}

impl CoreError {
    pub fn invalid_value(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Offending attribute, when the error is about one.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::NotAnObject { .. } => None,
            Self::InvalidValue { attribute, .. } => Some(attribute),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = CoreError::NotAnObject { found: "array" };
        assert_eq!(
            err.to_string(),
            "resource attributes must be a JSON object, got array"
        );
        assert!(err.attribute().is_none());

        let err = CoreError::invalid_value("userName", "must not be empty");
        assert_eq!(
            err.to_string(),
            "invalid value for attribute 'userName': must not be empty"
        );
        assert_eq!(err.attribute(), Some("userName"));
    }
}

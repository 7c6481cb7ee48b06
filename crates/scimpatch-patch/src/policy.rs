use serde::{Deserialize, Serialize};

/// What to do when a value does not have the shape an operation needs, e.g.
/// a list item that is not a complex value during a filtered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedItemPolicy {
    /// Leave the value untouched and carry on with the operation.
    #[default]
    Skip,
    /// Abort the patch with `PatchError::TypeMismatch`.
    Error,
}

/// Scope of a `remove` whose path names a sub-attribute, such as
/// `name.givenName` or `emails[type eq "work"].display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAttributeRemove {
    /// Remove the whole attribute (or the whole matching list items).
    #[default]
    Attribute,
    /// Remove only the named sub-attribute.
    SubAttribute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatchPolicy {
    #[serde(default)]
    pub malformed_items: MalformedItemPolicy,
    #[serde(default)]
    pub sub_attribute_remove: SubAttributeRemove,
}

impl PatchPolicy {
    pub fn strict() -> Self {
        Self {
            malformed_items: MalformedItemPolicy::Error,
            sub_attribute_remove: SubAttributeRemove::SubAttribute,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_deserialize() {
        let policy: PatchPolicy = serde_json::from_str(
            r#"{"malformed_items": "error", "sub_attribute_remove": "sub_attribute"}"#,
        )
        .unwrap();
        assert_eq!(policy, PatchPolicy::strict());

        let default: PatchPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(default.malformed_items, MalformedItemPolicy::Skip);
        assert_eq!(default.sub_attribute_remove, SubAttributeRemove::Attribute);
    }
}

//! Stored resource types.

use scimpatch_core::{AttributeTree, CORE_USER_SCHEMA, CoreError, Mutability, SchemaSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::StorageError;

pub const USER_RESOURCE_TYPE: &str = "User";

/// Keys the server owns; they are never part of the stored attributes.
const SERVER_KEYS: [&str; 3] = ["schemas", "id", "meta"];

/// A SCIM User as kept by the store: the patchable attributes plus the
/// server-managed identity and versioning metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUser {
    pub id: String,
    /// Incremented on every committed change, starting at 1.
    pub version: u64,
    pub attributes: AttributeTree,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
}

impl StoredUser {
    #[must_use]
    pub fn new(id: impl Into<String>, attributes: AttributeTree) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: id.into(),
            version: 1,
            attributes,
            created: now,
            last_modified: now,
        }
    }

    /// Next version of this user with the given attributes.
    #[must_use]
    pub fn new_version(&self, attributes: AttributeTree) -> Self {
        Self {
            id: self.id.clone(),
            version: self.version + 1,
            attributes,
            created: self.created,
            last_modified: OffsetDateTime::now_utc(),
        }
    }

    /// Weak entity tag, `W/"3"`.
    #[must_use]
    pub fn etag(&self) -> String {
        format!("W/\"{}\"", self.version)
    }

    #[must_use]
    pub fn location(&self, base_url: &str) -> String {
        format!("{}/Users/{}", base_url.trim_end_matches('/'), self.id)
    }

    /// SCIM JSON representation (RFC 7643 §4.1).
    ///
    /// `schemas` lists the core schema and every extension with a container
    /// present. Write-only attributes such as `password` are never returned.
    #[must_use]
    pub fn to_scim(&self, base_url: &str, schemas: &SchemaSet) -> Value {
        let mut schema_ids = vec![Value::String(CORE_USER_SCHEMA.to_string())];
        for extension in &schemas.extensions {
            if self.attributes.get_attribute(&extension.id).is_some() {
                schema_ids.push(Value::String(extension.id.clone()));
            }
        }

        let mut resource = Map::new();
        resource.insert("schemas".to_string(), Value::Array(schema_ids));
        resource.insert("id".to_string(), Value::String(self.id.clone()));

        for (name, value) in self.attributes.iter() {
            if is_server_key(name) {
                continue;
            }
            let write_only = schemas
                .attribute(None, name)
                .is_some_and(|d| d.mutability == Mutability::WriteOnly);
            if write_only {
                continue;
            }
            resource.insert(name.clone(), value.to_json());
        }

        resource.insert(
            "meta".to_string(),
            json!({
                "resourceType": USER_RESOURCE_TYPE,
                "created": self.created.format(&Rfc3339).unwrap_or_default(),
                "lastModified": self.last_modified.format(&Rfc3339).unwrap_or_default(),
                "version": self.etag(),
                "location": self.location(base_url),
            }),
        );

        Value::Object(resource)
    }
}

fn is_server_key(name: &str) -> bool {
    SERVER_KEYS.iter().any(|k| k.eq_ignore_ascii_case(name))
}

/// Extracts the storable attributes from a client-supplied SCIM User.
///
/// `schemas`, `id` and `meta` are dropped; the server assigns them.
///
/// # Errors
///
/// Returns `StorageError::InvalidResource` if the body is not a JSON object
/// or has no `userName`.
pub fn attributes_from_scim(resource: Value) -> Result<AttributeTree, StorageError> {
    let mut attributes = AttributeTree::from_json(resource)?;
    attributes.retain(|name, _| !is_server_key(name));

    let has_user_name = attributes
        .get_attribute("userName")
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.trim().is_empty());
    if !has_user_name {
        return Err(CoreError::invalid_value("userName", "a non-empty string is required").into());
    }
    Ok(attributes)
}

//! PatchOp request bodies.

use std::fmt;
use std::str::FromStr;

use scimpatch_core::AttributeValue;
use scimpatch_filter::{Path, parse_path};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PatchError;

pub const PATCH_OP_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

impl PatchOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Azure AD sends "Add"/"Replace", so op names are case-insensitive.
impl FromStr for PatchOp {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("add") {
            Ok(Self::Add)
        } else if s.eq_ignore_ascii_case("replace") {
            Ok(Self::Replace)
        } else if s.eq_ignore_ascii_case("remove") {
            Ok(Self::Remove)
        } else {
            Err(PatchError::invalid_syntax(format!(
                "unsupported operation '{s}', expected add, replace or remove"
            )))
        }
    }
}

/// One decoded operation with its path already parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: Option<Path>,
    pub value: Option<AttributeValue>,
}

impl PatchOperation {
    pub fn new(op: PatchOp, path: Option<Path>, value: Option<AttributeValue>) -> Self {
        Self { op, path, value }
    }

    /// Build an operation from its wire parts. An empty path counts as absent
    /// and a JSON `null` value as no value.
    pub fn parse(op: PatchOp, path: Option<&str>, value: Option<Value>) -> Result<Self, PatchError> {
        let path = match path.map(str::trim).filter(|p| !p.is_empty()) {
            Some(raw) => Some(parse_path(raw).map_err(|e| PatchError::invalid_path(raw, e))?),
            None => None,
        };
        Ok(Self {
            op,
            path,
            value: value.and_then(AttributeValue::from_json),
        })
    }
}

/// An operation as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPatchOperation {
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl TryFrom<RawPatchOperation> for PatchOperation {
    type Error = PatchError;

    fn try_from(raw: RawPatchOperation) -> Result<Self, Self::Error> {
        let op = raw.op.parse()?;
        Self::parse(op, raw.path.as_deref(), raw.value)
    }
}

/// `urn:ietf:params:scim:api:messages:2.0:PatchOp` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchRequest {
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(rename = "Operations", alias = "operations", default)]
    pub operations: Vec<RawPatchOperation>,
}

impl PatchRequest {
    pub fn new(operations: Vec<RawPatchOperation>) -> Self {
        Self {
            schemas: vec![PATCH_OP_SCHEMA.to_string()],
            operations,
        }
    }

    pub fn from_slice(body: &[u8]) -> Result<Self, PatchError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(PatchError::invalid_syntax("request body is empty"));
        }
        serde_json::from_slice(body)
            .map_err(|e| PatchError::invalid_syntax(format!("malformed PatchOp body: {e}")))
    }

    /// Validate the envelope and decode every operation. Fails on the first
    /// bad operation so nothing is applied from a partly invalid request.
    pub fn into_operations(self) -> Result<Vec<PatchOperation>, PatchError> {
        if !self
            .schemas
            .iter()
            .any(|s| s.eq_ignore_ascii_case(PATCH_OP_SCHEMA))
        {
            return Err(PatchError::invalid_syntax(format!(
                "schemas must contain {PATCH_OP_SCHEMA}"
            )));
        }
        if self.operations.is_empty() {
            return Err(PatchError::invalid_syntax("Operations must not be empty"));
        }

        self.operations
            .into_iter()
            .map(PatchOperation::try_from)
            .collect()
    }
}

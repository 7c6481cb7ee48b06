//! In-memory representation of SCIM resource attributes.
//!
//! SCIM resources are JSON documents, but the patch engine works on an
//! explicit tagged model instead of raw `serde_json::Value`: every attribute
//! is either a scalar, a nested map of sub-attributes or a list. JSON `null`
//! has no representation; it is dropped on conversion.

use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use crate::error::{CoreError, Result};

/// Ordered mapping from attribute name to value.
pub type AttributeMap = IndexMap<String, AttributeValue>;

/// Singular attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Bool(bool),
    Number(Number),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
        }
    }
}

/// A SCIM attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Scalar(Scalar),
    /// Complex attribute: sub-attribute name to value.
    Map(AttributeMap),
    /// Multi-valued attribute.
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Converts a JSON value. Returns `None` for `null`; `null` entries inside
    /// objects and arrays are dropped.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Scalar(Scalar::Bool(b))),
            Value::Number(n) => Some(Self::Scalar(Scalar::Number(n))),
            Value::String(s) => Some(Self::Scalar(Scalar::String(s))),
            Value::Array(items) => Some(Self::List(
                items.into_iter().filter_map(Self::from_json).collect(),
            )),
            Value::Object(obj) => Some(Self::Map(map_from_json(obj))),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar(s) => s.to_json(),
            Self::Map(m) => Value::Object(map_to_json(m)),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub fn as_map(&self) -> Option<&AttributeMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut AttributeMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<AttributeValue>> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<AttributeValue>> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Whether the value counts as "present" for the `pr` filter operator:
    /// empty strings, lists and maps do not.
    pub fn is_present(&self) -> bool {
        match self {
            Self::Scalar(Scalar::String(s)) => !s.is_empty(),
            Self::Scalar(_) => true,
            Self::Map(m) => !m.is_empty(),
            Self::List(items) => items.iter().any(Self::is_present),
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(Scalar::String(_)) => "string",
            Self::Scalar(Scalar::Bool(_)) => "boolean",
            Self::Scalar(Scalar::Number(_)) => "number",
            Self::Map(_) => "complex",
            Self::List(_) => "multi-valued",
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::String(value.to_string()))
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Scalar(Scalar::String(value))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Number(value.into()))
    }
}

impl From<AttributeMap> for AttributeValue {
    fn from(value: AttributeMap) -> Self {
        Self::Map(value)
    }
}

impl From<Vec<AttributeValue>> for AttributeValue {
    fn from(value: Vec<AttributeValue>) -> Self {
        Self::List(value)
    }
}

impl Serialize for AttributeValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Scalar(Scalar::String(s)) => serializer.serialize_str(s),
            Self::Scalar(Scalar::Bool(b)) => serializer.serialize_bool(*b),
            Self::Scalar(Scalar::Number(n)) => n.serialize(serializer),
            Self::Map(m) => m.serialize(serializer),
            Self::List(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(value).ok_or_else(|| D::Error::custom("null is not an attribute value"))
    }
}

fn map_from_json(obj: Map<String, Value>) -> AttributeMap {
    obj.into_iter()
        .filter_map(|(k, v)| AttributeValue::from_json(v).map(|v| (k, v)))
        .collect()
}

fn map_to_json(map: &AttributeMap) -> Map<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
}

/// Index of `name` in `map`, compared case-insensitively.
///
/// An exact match wins over a case-insensitive one.
pub fn find_key(map: &AttributeMap, name: &str) -> Option<usize> {
    map.get_index_of(name).or_else(|| {
        map.keys()
            .position(|k| k.eq_ignore_ascii_case(name))
    })
}

/// The mutable attribute state of one resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeTree(AttributeMap);

impl AttributeTree {
    pub fn new() -> Self {
        Self(AttributeMap::new())
    }

    /// Builds a tree from a JSON object.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(obj) => Ok(Self(map_from_json(obj))),
            other => Err(CoreError::NotAnObject {
                found: json_kind(&other),
            }),
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(map_to_json(&self.0))
    }

    pub fn into_inner(self) -> AttributeMap {
        self.0
    }

    /// Case-insensitive lookup.
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeValue> {
        find_key(&self.0, name).and_then(|i| self.0.get_index(i).map(|(_, v)| v))
    }
}

impl From<AttributeMap> for AttributeTree {
    fn from(map: AttributeMap) -> Self {
        Self(map)
    }
}

impl Deref for AttributeTree {
    type Target = AttributeMap;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for AttributeTree {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

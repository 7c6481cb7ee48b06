//! Attribute paths.
//!
//! ```text
//! attrPath  = [URI ":"] ATTRNAME *1subAttr
//! subAttr   = "." ATTRNAME
//! PATH      = attrPath / valuePath [subAttr]
//! valuePath = attrPath "[" valFilter "]"
//! ```

use std::fmt;

use crate::error::FilterError;
use crate::filter::{FilterExpression, parse_filter};

/// Reference to an attribute, optionally qualified by a schema URI and
/// narrowed to one sub-attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    pub uri: Option<String>,
    pub name: String,
    pub sub_attribute: Option<String>,
}

impl AttributePath {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uri: None,
            name: name.into(),
            sub_attribute: None,
        }
    }

    pub fn with_sub_attribute(mut self, sub: impl Into<String>) -> Self {
        self.sub_attribute = Some(sub.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn sub_attribute_name(&self) -> Option<&str> {
        self.sub_attribute.as_deref()
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(uri) = &self.uri {
            write!(f, "{uri}:")?;
        }
        f.write_str(&self.name)?;
        if let Some(sub) = &self.sub_attribute {
            write!(f, ".{sub}")?;
        }
        Ok(())
    }
}

/// A PATCH operation path.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub attribute: AttributePath,
    /// Selector of a multi-valued attribute, `emails[type eq "work"]`.
    pub value_filter: Option<FilterExpression>,
    /// Sub-attribute following the value filter, `emails[...].value`.
    pub sub_attribute: Option<String>,
}

impl Path {
    pub fn attribute_name(&self) -> &str {
        &self.attribute.name
    }

    pub fn uri(&self) -> Option<&str> {
        self.attribute.uri.as_deref()
    }

    /// Sub-attribute targeted by the path, whether it was written as
    /// `name.givenName` or after a value filter.
    pub fn sub_attribute_name(&self) -> Option<&str> {
        self.attribute
            .sub_attribute_name()
            .or(self.sub_attribute.as_deref())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.attribute)?;
        if let Some(filter) = &self.value_filter {
            write!(f, "[{filter}]")?;
        }
        if let Some(sub) = &self.sub_attribute {
            write!(f, ".{sub}")?;
        }
        Ok(())
    }
}

/// Builds the filter string that selects items of `attr_name` matching
/// `expression`, e.g. `emails[type eq "work"]`.
pub fn build_filter_string(attr_name: &str, expression: &FilterExpression) -> String {
    format!("{attr_name}[{expression}]")
}

fn is_valid_attr_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Parse an attribute path such as `name.givenName` or
/// `urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:employeeNumber`.
pub fn parse_attr_path(raw: &str) -> Result<AttributePath, FilterError> {
    if raw.is_empty() {
        return Err(FilterError::syntax("empty attribute path", 0));
    }

    // The URI itself contains ':' and '.', so split on the last ':'.
    let has_urn = raw.len() > 4 && raw.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("urn:"));
    let (uri, rest, offset) = if has_urn {
        match raw.rfind(':') {
            Some(idx) => (Some(&raw[..idx]), &raw[idx + 1..], idx + 1),
            None => (None, raw, 0),
        }
    } else {
        (None, raw, 0)
    };

    let (name, sub) = match rest.split_once('.') {
        Some((name, sub)) => (name, Some(sub)),
        None => (rest, None),
    };

    if !is_valid_attr_name(name) {
        return Err(FilterError::syntax(
            format!("invalid attribute name '{name}'"),
            offset,
        ));
    }
    if let Some(sub) = sub {
        if !is_valid_attr_name(sub) {
            return Err(FilterError::syntax(
                format!("invalid sub-attribute name '{sub}'"),
                offset + name.len() + 1,
            ));
        }
    }

    Ok(AttributePath {
        uri: uri.map(str::to_string),
        name: name.to_string(),
        sub_attribute: sub.map(str::to_string),
    })
}

/// Finds the `]` closing the bracket opened at `open`, skipping quoted
/// strings.
fn find_closing_bracket(raw: &str, open: usize) -> Option<usize> {
    let bytes = raw.as_bytes();
    let mut in_string = false;
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_string => i += 1,
            b'"' => in_string = !in_string,
            b']' if !in_string => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Parse a PATCH path: an attribute path, optionally followed by a value
/// filter in brackets and a trailing sub-attribute.
pub fn parse_path(raw: &str) -> Result<Path, FilterError> {
    let Some(open) = raw.find('[') else {
        return Ok(Path {
            attribute: parse_attr_path(raw)?,
            value_filter: None,
            sub_attribute: None,
        });
    };

    let attribute = parse_attr_path(&raw[..open])?;
    if attribute.sub_attribute.is_some() {
        return Err(FilterError::syntax(
            "value filter must follow an attribute, not a sub-attribute",
            open,
        ));
    }

    let close = find_closing_bracket(raw, open)
        .ok_or_else(|| FilterError::syntax("missing closing ']'", raw.len()))?;

    let value_filter = parse_filter(&raw[open + 1..close]).map_err(|e| match e {
        FilterError::Syntax { message, position } => {
            FilterError::syntax(message, position + open + 1)
        }
        other => other,
    })?;

    let rest = &raw[close + 1..];
    let sub_attribute = if rest.is_empty() {
        None
    } else {
        match rest.strip_prefix('.') {
            Some(sub) if is_valid_attr_name(sub) => Some(sub.to_string()),
            _ => {
                return Err(FilterError::syntax(
                    format!("unexpected '{rest}' after value filter"),
                    close + 1,
                ));
            }
        }
    };

    Ok(Path {
        attribute,
        value_filter: Some(value_filter),
        sub_attribute,
    })
}

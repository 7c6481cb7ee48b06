//! Schema-aware filter evaluation.
//!
//! A [`Validator`] is built from a filter string and the resource's schemas.
//! Construction rejects malformed syntax, attributes the schemas do not
//! define and operators that make no sense for an attribute's type.
//! [`Validator::passes_filter`] then evaluates the filter against an
//! attribute map, returning [`FilterError::NoMatch`] when it does not match.
//!
//! String comparisons are case-insensitive unless the attribute is
//! `caseExact`. Multi-valued attributes match when any of their values do.

use std::cmp::Ordering;

use scimpatch_core::{
    AttributeDefinition, AttributeMap, AttributeType, AttributeValue, Scalar, SchemaSet, find_key,
};

use crate::error::FilterError;
use crate::filter::{CompareOp, CompareValue, FilterExpression, LogicalOp, parse_filter};
use crate::path::AttributePath;

#[derive(Debug, Clone)]
pub struct Validator<'s> {
    filter: FilterExpression,
    schemas: &'s SchemaSet,
}

impl<'s> Validator<'s> {
    /// Parse `filter` and check it against `schemas`.
    pub fn new(filter: &str, schemas: &'s SchemaSet) -> Result<Self, FilterError> {
        Self::from_expression(parse_filter(filter)?, schemas)
    }

    pub fn from_expression(
        filter: FilterExpression,
        schemas: &'s SchemaSet,
    ) -> Result<Self, FilterError> {
        check(&filter, schemas, None)?;
        Ok(Self { filter, schemas })
    }

    pub fn filter(&self) -> &FilterExpression {
        &self.filter
    }

    /// `Ok(())` when `resource` matches the filter.
    pub fn passes_filter(&self, resource: &AttributeMap) -> Result<(), FilterError> {
        if self.evaluate(&self.filter, resource, None) {
            Ok(())
        } else {
            Err(FilterError::NoMatch)
        }
    }

    fn evaluate(
        &self,
        expr: &FilterExpression,
        ctx: &AttributeMap,
        parent: Option<&AttributeDefinition>,
    ) -> bool {
        match expr {
            FilterExpression::Present(path) => self
                .values(path, ctx, parent)
                .into_iter()
                .any(AttributeValue::is_present),
            FilterExpression::Comparison { path, op, value } => {
                let case_exact = definition(path, self.schemas, parent)
                    .map(|d| d.case_exact)
                    .unwrap_or(false);
                let values = self.values(path, ctx, parent);
                match (op, value) {
                    (CompareOp::Eq, CompareValue::Null) => values.is_empty(),
                    (CompareOp::Ne, CompareValue::Null) => !values.is_empty(),
                    (CompareOp::Ne, _) => !values
                        .iter()
                        .any(|v| compare(v, CompareOp::Eq, value, case_exact)),
                    _ => values.iter().any(|v| compare(v, *op, value, case_exact)),
                }
            }
            FilterExpression::Logical { op, left, right } => match op {
                LogicalOp::And => {
                    self.evaluate(left, ctx, parent) && self.evaluate(right, ctx, parent)
                }
                LogicalOp::Or => {
                    self.evaluate(left, ctx, parent) || self.evaluate(right, ctx, parent)
                }
            },
            FilterExpression::Not(inner) => !self.evaluate(inner, ctx, parent),
            FilterExpression::ValuePath { path, filter } => {
                let item_def = definition(path, self.schemas, None);
                self.values(path, ctx, None)
                    .into_iter()
                    .filter_map(AttributeValue::as_map)
                    .any(|item| self.evaluate(filter, item, item_def))
            }
        }
    }

    /// Values addressed by `path` in `ctx`, with multi-valued attributes
    /// flattened into their items.
    fn values<'v>(
        &self,
        path: &AttributePath,
        ctx: &'v AttributeMap,
        parent: Option<&AttributeDefinition>,
    ) -> Vec<&'v AttributeValue> {
        let container = match (&path.uri, parent) {
            (Some(uri), None) if self.schemas.is_extension(uri) => {
                match lookup(ctx, uri).and_then(AttributeValue::as_map) {
                    Some(ext) => ext,
                    None => return Vec::new(),
                }
            }
            _ => ctx,
        };

        let Some(value) = lookup(container, &path.name) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        match &path.sub_attribute {
            None => flatten_into(value, &mut out),
            Some(sub) => match value {
                AttributeValue::List(items) => {
                    for item in items {
                        if let Some(v) = item.as_map().and_then(|m| lookup(m, sub)) {
                            flatten_into(v, &mut out);
                        }
                    }
                }
                AttributeValue::Map(m) => {
                    if let Some(v) = lookup(m, sub) {
                        flatten_into(v, &mut out);
                    }
                }
                AttributeValue::Scalar(_) => {}
            },
        }
        out
    }
}

fn lookup<'v>(map: &'v AttributeMap, name: &str) -> Option<&'v AttributeValue> {
    find_key(map, name).and_then(|i| map.get_index(i).map(|(_, v)| v))
}

fn flatten_into<'v>(value: &'v AttributeValue, out: &mut Vec<&'v AttributeValue>) {
    match value {
        AttributeValue::List(items) => out.extend(items.iter()),
        other => out.push(other),
    }
}

/// Schema definition for `path`. Inside a value filter paths are resolved
/// against the parent attribute's sub-attributes.
fn definition<'s>(
    path: &AttributePath,
    schemas: &'s SchemaSet,
    parent: Option<&'s AttributeDefinition>,
) -> Option<&'s AttributeDefinition> {
    if let Some(parent) = parent {
        if path.uri.is_some() || path.sub_attribute.is_some() {
            return None;
        }
        // simple multi-valued attributes expose their items as "value"
        if parent.sub_attributes.is_empty() && path.name.eq_ignore_ascii_case("value") {
            return Some(parent);
        }
        return parent.sub_attribute(&path.name);
    }

    let attr = schemas.attribute(path.uri.as_deref(), &path.name)?;
    match &path.sub_attribute {
        Some(sub) => attr.sub_attribute(sub),
        None => Some(attr),
    }
}

fn check(
    expr: &FilterExpression,
    schemas: &SchemaSet,
    parent: Option<&AttributeDefinition>,
) -> Result<(), FilterError> {
    match expr {
        FilterExpression::Present(path) => {
            resolve(path, schemas, parent)?;
            Ok(())
        }
        FilterExpression::Comparison { path, op, value } => {
            let def = resolve(path, schemas, parent)?;
            check_operator(path, def, *op, value)
        }
        FilterExpression::Logical { left, right, .. } => {
            check(left, schemas, parent)?;
            check(right, schemas, parent)
        }
        FilterExpression::Not(inner) => check(inner, schemas, parent),
        FilterExpression::ValuePath { path, filter } => {
            let def = resolve(path, schemas, parent)?;
            check(filter, schemas, Some(def))
        }
    }
}

fn resolve<'s>(
    path: &AttributePath,
    schemas: &'s SchemaSet,
    parent: Option<&'s AttributeDefinition>,
) -> Result<&'s AttributeDefinition, FilterError> {
    definition(path, schemas, parent).ok_or_else(|| match parent {
        Some(parent) => FilterError::unknown_attribute(format!("{}.{}", parent.name, path)),
        None => FilterError::unknown_attribute(path.to_string()),
    })
}

fn check_operator(
    path: &AttributePath,
    def: &AttributeDefinition,
    op: CompareOp,
    value: &CompareValue,
) -> Result<(), FilterError> {
    let allowed = match def.kind {
        AttributeType::Complex => false,
        AttributeType::Boolean | AttributeType::Binary => {
            matches!(op, CompareOp::Eq | CompareOp::Ne)
        }
        kind => !(op.is_ordering() || op.is_substring()) || kind.is_ordered(),
    };
    let null_ok = !matches!(value, CompareValue::Null) || matches!(op, CompareOp::Eq | CompareOp::Ne);

    if allowed && null_ok {
        Ok(())
    } else {
        Err(FilterError::InvalidOperator {
            op: op.as_str().to_string(),
            attribute: path.to_string(),
        })
    }
}

fn compare(value: &AttributeValue, op: CompareOp, target: &CompareValue, case_exact: bool) -> bool {
    let Some(scalar) = value.as_scalar() else {
        return false;
    };

    match (scalar, target) {
        (Scalar::String(actual), CompareValue::String(expected)) => {
            if case_exact {
                compare_strings(actual, expected, op)
            } else {
                compare_strings(&actual.to_lowercase(), &expected.to_lowercase(), op)
            }
        }
        (Scalar::Number(actual), CompareValue::Number(expected)) => {
            match (actual.as_f64(), expected.as_f64()) {
                (Some(a), Some(b)) if !op.is_substring() => a
                    .partial_cmp(&b)
                    .is_some_and(|ordering| ordering_matches(op, ordering)),
                _ => false,
            }
        }
        (Scalar::Bool(actual), CompareValue::Bool(expected)) => match op {
            CompareOp::Eq => actual == expected,
            CompareOp::Ne => actual != expected,
            _ => false,
        },
        _ => false,
    }
}

fn compare_strings(actual: &str, expected: &str, op: CompareOp) -> bool {
    match op {
        CompareOp::Co => actual.contains(expected),
        CompareOp::Sw => actual.starts_with(expected),
        CompareOp::Ew => actual.ends_with(expected),
        _ => ordering_matches(op, actual.cmp(expected)),
    }
}

fn ordering_matches(op: CompareOp, ordering: Ordering) -> bool {
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Co | CompareOp::Sw | CompareOp::Ew => false,
    }
}

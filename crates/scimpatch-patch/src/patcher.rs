//! Application of PATCH operations to a resource's attribute tree.

use std::sync::Arc;

use scimpatch_core::{AttributeMap, AttributeTree, AttributeValue, SchemaSet, find_key};
use scimpatch_filter::{Path, Validator, build_filter_string, parse_attr_path};

use crate::error::PatchError;
use crate::operation::{PatchOp, PatchOperation};
use crate::policy::{MalformedItemPolicy, PatchPolicy, SubAttributeRemove};

/// Result of [`AttributePatcher::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    pub tree: AttributeTree,
    /// Whether any operation altered the tree. Callers persist only when set.
    pub changed: bool,
}

/// Applies SCIM PATCH operations to an [`AttributeTree`].
///
/// Operations run in order against the same tree, so each one sees the
/// result of the previous. The first error aborts the whole patch and the
/// partially patched tree is dropped.
#[derive(Debug, Clone)]
pub struct AttributePatcher {
    schemas: Arc<SchemaSet>,
    policy: PatchPolicy,
}

/// Resolved location of a top-level attribute: either the tree root or the
/// container object of an extension schema.
struct Target {
    container: Option<String>,
    name: String,
}

impl AttributePatcher {
    pub fn new(schemas: Arc<SchemaSet>) -> Self {
        Self {
            schemas,
            policy: PatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> PatchPolicy {
        self.policy
    }

    pub fn schemas(&self) -> &SchemaSet {
        &self.schemas
    }

    pub fn apply(
        &self,
        mut tree: AttributeTree,
        operations: &[PatchOperation],
    ) -> Result<PatchOutcome, PatchError> {
        let mut changed = false;
        for (index, operation) in operations.iter().enumerate() {
            let altered = self.apply_operation(&mut tree, operation)?;
            tracing::trace!(index, op = %operation.op, altered, "applied patch operation");
            changed |= altered;
        }
        Ok(PatchOutcome { tree, changed })
    }

    fn apply_operation(
        &self,
        tree: &mut AttributeMap,
        operation: &PatchOperation,
    ) -> Result<bool, PatchError> {
        let value = match (operation.op, operation.value.as_ref()) {
            (PatchOp::Remove, _) => None,
            (_, Some(value)) => Some(value),
            (op, None) => {
                tracing::debug!(%op, "skipping operation without a value");
                return Ok(false);
            }
        };

        let Some(path) = &operation.path else {
            return match value {
                Some(AttributeValue::Map(entries)) => {
                    let mut changed = false;
                    for (key, value) in entries {
                        changed |= self.set_by_key(tree, key, value)?;
                    }
                    Ok(changed)
                }
                Some(other) => Err(PatchError::invalid_value(format!(
                    "{} without a path requires an object value, got {}",
                    operation.op,
                    other.kind()
                ))),
                None => Err(PatchError::no_target("remove requires a path")),
            };
        };

        let target = self.resolve(path.uri(), path.attribute_name());
        let sub = path.sub_attribute_name();
        self.check_mutability(&target, sub)?;

        let Some(container) = self.container(tree, &target, value.is_some())? else {
            return Ok(false);
        };

        let Some(index) = find_key(container, &target.name) else {
            let Some(value) = value else {
                return Ok(false);
            };
            if let Some(sub) = sub {
                container.insert(target.name, nested(sub, value));
            } else if path.value_filter.is_some() {
                return Err(PatchError::not_implemented(format!(
                    "value filter on absent attribute '{path}'"
                )));
            } else {
                container.insert(target.name, value.clone());
            }
            return Ok(true);
        };

        match value {
            Some(value) => {
                self.add_or_replace(container, index, &target.name, path, operation.op, value)
            }
            None => self.remove(container, index, &target.name, path),
        }
    }

    // ========================================================================
    // add / replace
    // ========================================================================

    fn add_or_replace(
        &self,
        container: &mut AttributeMap,
        index: usize,
        name: &str,
        path: &Path,
        op: PatchOp,
        value: &AttributeValue,
    ) -> Result<bool, PatchError> {
        let Some((_, current)) = container.get_index_mut(index) else {
            return Ok(false);
        };

        if let AttributeValue::List(new_items) = value {
            if op == PatchOp::Replace {
                *current = value.clone();
                return Ok(true);
            }
            return match current {
                AttributeValue::List(items) => {
                    items.extend(new_items.iter().cloned());
                    Ok(true)
                }
                other => self.mismatch(name, "multi-valued", other.kind()),
            };
        }

        let Some(filter) = &path.value_filter else {
            return match path.sub_attribute_name() {
                Some(sub) => match current {
                    AttributeValue::Map(fields) => Ok(set_attribute(fields, sub, value, op)),
                    other => self.mismatch(name, "complex", other.kind()),
                },
                None => Ok(set_value(current, value, op)),
            };
        };

        let validator = Validator::new(&build_filter_string(name, filter), &self.schemas)?;
        let kind = current.kind();
        let AttributeValue::List(items) = current else {
            return self.mismatch(name, "multi-valued", kind);
        };

        let mut changed = false;
        for item in items.iter_mut() {
            let kind = item.kind();
            let AttributeValue::Map(fields) = item else {
                self.mismatch(name, "complex", kind)?;
                continue;
            };
            if !item_matches(&validator, name, fields) {
                continue;
            }
            changed |= match (path.sub_attribute_name(), value) {
                (Some(sub), _) => set_attribute(fields, sub, value, op),
                (None, AttributeValue::Map(entries)) => merge(fields, entries),
                (None, other) => {
                    self.mismatch(name, "complex", other.kind())?;
                    false
                }
            };
        }
        Ok(changed)
    }

    /// Path-less set of one `attr` / `attr.sub` / `urn:...:attr` key.
    fn set_by_key(
        &self,
        tree: &mut AttributeMap,
        key: &str,
        value: &AttributeValue,
    ) -> Result<bool, PatchError> {
        let path = parse_attr_path(key).map_err(|e| PatchError::invalid_path(key, e))?;
        let target = self.resolve(path.uri.as_deref(), &path.name);
        let sub = path.sub_attribute_name();
        self.check_mutability(&target, sub)?;

        let Some(container) = self.container(tree, &target, true)? else {
            return Ok(false);
        };

        let Some(index) = find_key(container, &target.name) else {
            let value = match sub {
                Some(sub) => nested(sub, value),
                None => value.clone(),
            };
            container.insert(target.name, value);
            return Ok(true);
        };
        let Some((_, current)) = container.get_index_mut(index) else {
            return Ok(false);
        };

        match sub {
            Some(sub) => match current {
                AttributeValue::Map(fields) => {
                    Ok(set_attribute(fields, sub, value, PatchOp::Replace))
                }
                other => self.mismatch(&target.name, "complex", other.kind()),
            },
            None => Ok(set_value(current, value, PatchOp::Replace)),
        }
    }

    // ========================================================================
    // remove
    // ========================================================================

    fn remove(
        &self,
        container: &mut AttributeMap,
        index: usize,
        name: &str,
        path: &Path,
    ) -> Result<bool, PatchError> {
        let sub = match self.policy.sub_attribute_remove {
            SubAttributeRemove::SubAttribute => path.sub_attribute_name(),
            SubAttributeRemove::Attribute => None,
        };

        let Some(filter) = &path.value_filter else {
            let Some(sub) = sub else {
                container.shift_remove_index(index);
                return Ok(true);
            };
            let Some((_, current)) = container.get_index_mut(index) else {
                return Ok(false);
            };
            return match current {
                AttributeValue::Map(fields) => Ok(remove_key(fields, sub)),
                AttributeValue::List(items) => {
                    let mut changed = false;
                    for item in items.iter_mut() {
                        match item {
                            AttributeValue::Map(fields) => changed |= remove_key(fields, sub),
                            other => {
                                self.mismatch(name, "complex", other.kind())?;
                            }
                        }
                    }
                    Ok(changed)
                }
                other => self.mismatch(name, "complex", other.kind()),
            };
        };

        let validator = Validator::new(&build_filter_string(name, filter), &self.schemas)?;
        let Some((_, current)) = container.get_index_mut(index) else {
            return Ok(false);
        };
        let kind = current.kind();
        let AttributeValue::List(items) = current else {
            return self.mismatch(name, "multi-valued", kind);
        };

        if let Some(sub) = sub {
            let mut changed = false;
            for item in items.iter_mut() {
                let kind = item.kind();
                let AttributeValue::Map(fields) = item else {
                    self.mismatch(name, "complex", kind)?;
                    continue;
                };
                if item_matches(&validator, name, fields) {
                    changed |= remove_key(fields, sub);
                }
            }
            return Ok(changed);
        }

        if let Some(other) = items.iter().find(|item| !matches!(item, AttributeValue::Map(_))) {
            self.mismatch(name, "complex", other.kind())?;
        }
        let before = items.len();
        items.retain(|item| match item {
            AttributeValue::Map(fields) => !item_matches(&validator, name, fields),
            _ => true,
        });
        Ok(items.len() != before)
    }

    // ========================================================================
    // helpers
    // ========================================================================

    fn resolve(&self, uri: Option<&str>, name: &str) -> Target {
        let Some(uri) = uri else {
            return Target {
                container: None,
                name: name.to_string(),
            };
        };

        // `urn:...:enterprise:2.0:User` names the extension container itself
        let full = format!("{uri}:{name}");
        if self.schemas.is_extension(&full) {
            Target {
                container: None,
                name: full,
            }
        } else if self.schemas.is_extension(uri) {
            Target {
                container: Some(uri.to_string()),
                name: name.to_string(),
            }
        } else {
            // core schema URN prefix, attributes live at the root
            Target {
                container: None,
                name: name.to_string(),
            }
        }
    }

    fn check_mutability(&self, target: &Target, sub: Option<&str>) -> Result<(), PatchError> {
        let Some(definition) = self
            .schemas
            .attribute(target.container.as_deref(), &target.name)
        else {
            return Ok(());
        };

        if definition.is_read_only() {
            return Err(PatchError::mutability(&target.name));
        }
        if let Some(sub) = sub {
            if definition
                .sub_attribute(sub)
                .is_some_and(|d| d.is_read_only())
            {
                return Err(PatchError::mutability(format!("{}.{sub}", target.name)));
            }
        }
        Ok(())
    }

    /// The map holding `target`. Extension containers are created on demand
    /// when `create` is set, otherwise a missing container yields `None`.
    fn container<'t>(
        &self,
        tree: &'t mut AttributeMap,
        target: &Target,
        create: bool,
    ) -> Result<Option<&'t mut AttributeMap>, PatchError> {
        let Some(uri) = &target.container else {
            return Ok(Some(tree));
        };

        let index = match find_key(tree, uri) {
            Some(index) => index,
            None if create => {
                tree.insert_full(uri.clone(), AttributeValue::Map(AttributeMap::new()))
                    .0
            }
            None => return Ok(None),
        };

        match tree.get_index_mut(index) {
            Some((_, AttributeValue::Map(fields))) => Ok(Some(fields)),
            Some((_, other)) => {
                let kind = other.kind();
                self.mismatch(uri, "complex", kind).map(|_| None)
            }
            None => Ok(None),
        }
    }

    /// Shape mismatch under the configured policy: skipped (`Ok(false)`) or
    /// reported as [`PatchError::TypeMismatch`].
    fn mismatch(
        &self,
        path: &str,
        expected: &'static str,
        actual: &'static str,
    ) -> Result<bool, PatchError> {
        match self.policy.malformed_items {
            MalformedItemPolicy::Skip => {
                tracing::debug!(attribute = path, expected, actual, "skipping value of unexpected shape");
                Ok(false)
            }
            MalformedItemPolicy::Error => Err(PatchError::TypeMismatch {
                path: path.to_string(),
                expected,
                actual,
            }),
        }
    }
}

fn nested(sub: &str, value: &AttributeValue) -> AttributeValue {
    let mut fields = AttributeMap::with_capacity(1);
    fields.insert(sub.to_string(), value.clone());
    AttributeValue::Map(fields)
}

/// Runs the validator against the item alone, as `{name: [item]}`.
fn item_matches(validator: &Validator<'_>, name: &str, item: &AttributeMap) -> bool {
    let mut projection = AttributeMap::with_capacity(1);
    projection.insert(
        name.to_string(),
        AttributeValue::List(vec![AttributeValue::Map(item.clone())]),
    );
    validator.passes_filter(&projection).is_ok()
}

fn set_attribute(
    fields: &mut AttributeMap,
    name: &str,
    value: &AttributeValue,
    op: PatchOp,
) -> bool {
    match find_key(fields, name) {
        Some(index) => match fields.get_index_mut(index) {
            Some((_, current)) => set_value(current, value, op),
            None => false,
        },
        None => {
            fields.insert(name.to_string(), value.clone());
            true
        }
    }
}

fn set_value(current: &mut AttributeValue, value: &AttributeValue, op: PatchOp) -> bool {
    if op == PatchOp::Add {
        if let (AttributeValue::Map(fields), AttributeValue::Map(entries)) = (&mut *current, value) {
            return merge(fields, entries);
        }
    }
    if *current == *value {
        false
    } else {
        *current = value.clone();
        true
    }
}

fn merge(fields: &mut AttributeMap, entries: &AttributeMap) -> bool {
    let mut changed = false;
    for (key, value) in entries {
        changed |= set_attribute(fields, key, value, PatchOp::Replace);
    }
    changed
}

fn remove_key(fields: &mut AttributeMap, name: &str) -> bool {
    match find_key(fields, name) {
        Some(index) => fields.shift_remove_index(index).is_some(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    const ENTERPRISE: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

    fn patcher() -> AttributePatcher {
        AttributePatcher::new(Arc::new(SchemaSet::user()))
    }

    fn tree(value: Value) -> AttributeTree {
        AttributeTree::from_json(value).unwrap()
    }

    fn op(op: PatchOp, path: Option<&str>, value: Option<Value>) -> PatchOperation {
        PatchOperation::parse(op, path, value).unwrap()
    }

    fn user() -> AttributeTree {
        tree(json!({
            "id": "u-1",
            "userName": "bjensen",
            "name": {"givenName": "Barbara", "familyName": "Jensen"},
            "emails": [
                {"value": "bjensen@example.com", "type": "work", "primary": true},
                {"value": "babs@home.example", "type": "home"}
            ],
            "active": true
        }))
    }

    fn run(patcher: &AttributePatcher, start: AttributeTree, ops: &[PatchOperation]) -> (Value, bool) {
        let outcome = patcher.apply(start, ops).unwrap();
        (outcome.tree.to_json(), outcome.changed)
    }

    #[test]
    fn test_replace_same_value_is_unchanged() {
        let ops = [op(PatchOp::Replace, Some("userName"), Some(json!("bjensen")))];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(!changed);
        assert_eq!(result, user().to_json());
    }

    #[test]
    fn test_replace_is_idempotent() {
        let ops = [op(PatchOp::Replace, Some("userName"), Some(json!("babs")))];
        let (first, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        let (second, changed) = run(&patcher(), tree(first.clone()), &ops);
        assert!(!changed);
        assert_eq!(first, second);
    }

    #[test]
    fn test_add_sub_attribute_to_absent_attribute() {
        let start = tree(json!({"userName": "bjensen"}));
        let ops = [op(PatchOp::Add, Some("name.givenName"), Some(json!("Ann")))];
        let (result, changed) = run(&patcher(), start, &ops);
        assert!(changed);
        assert_eq!(result["name"], json!({"givenName": "Ann"}));
    }

    #[test]
    fn test_replace_sub_attribute() {
        let ops = [op(PatchOp::Replace, Some("name.familyName"), Some(json!("Smith")))];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(result["name"], json!({"givenName": "Barbara", "familyName": "Smith"}));
    }

    #[test]
    fn test_attribute_names_are_case_insensitive() {
        let ops = [op(PatchOp::Replace, Some("USERNAME"), Some(json!("babs")))];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(result["userName"], json!("babs"));
        assert!(result.get("USERNAME").is_none());
    }

    #[test]
    fn test_filtered_replace_touches_only_matching_items() {
        let ops = [op(
            PatchOp::Replace,
            Some("emails[type eq \"work\"].value"),
            Some(json!("barbara@example.com")),
        )];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(result["emails"][0]["value"], json!("barbara@example.com"));
        assert_eq!(result["emails"][1]["value"], json!("babs@home.example"));
    }

    #[test]
    fn test_filtered_value_comparison_respects_case_exact() {
        // type is caseExact=false, so "WORK" matches "work"
        let ops = [op(
            PatchOp::Replace,
            Some("emails[type eq \"WORK\"].display"),
            Some(json!("Work")),
        )];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(result["emails"][0]["display"], json!("Work"));
        assert!(result["emails"][1].get("display").is_none());
    }

    #[test]
    fn test_filtered_replace_without_match_is_unchanged() {
        let ops = [op(
            PatchOp::Replace,
            Some("emails[type eq \"other\"].value"),
            Some(json!("x@example.com")),
        )];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(!changed);
        assert_eq!(result, user().to_json());
    }

    #[test]
    fn test_filtered_merge_of_map_value() {
        let ops = [op(
            PatchOp::Add,
            Some("emails[type eq \"home\"]"),
            Some(json!({"display": "Home", "primary": false})),
        )];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(
            result["emails"][1],
            json!({"value": "babs@home.example", "type": "home", "display": "Home", "primary": false})
        );
    }

    #[test]
    fn test_filtered_remove_drops_matching_items() {
        let ops = [op(PatchOp::Remove, Some("emails[type eq \"work\"]"), None)];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(result["emails"], json!([{"value": "babs@home.example", "type": "home"}]));
    }

    #[test]
    fn test_filtered_remove_leaves_empty_list() {
        let start = tree(json!({"emails": [{"value": "a@example.com", "type": "work"}]}));
        let ops = [op(PatchOp::Remove, Some("emails[type eq \"work\"]"), None)];
        let (result, changed) = run(&patcher(), start, &ops);
        assert!(changed);
        assert_eq!(result["emails"], json!([]));
    }

    #[test]
    fn test_filtered_remove_without_match_is_unchanged() {
        let ops = [op(PatchOp::Remove, Some("emails[type eq \"other\"]"), None)];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(!changed);
        assert_eq!(result, user().to_json());
    }

    #[test]
    fn test_remove_attribute() {
        let ops = [op(PatchOp::Remove, Some("active"), None)];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert!(result.get("active").is_none());
    }

    #[test]
    fn test_remove_absent_attribute_is_unchanged() {
        let ops = [op(PatchOp::Remove, Some("nickName"), None)];
        let (_, changed) = run(&patcher(), user(), &ops);
        assert!(!changed);
    }

    #[test]
    fn test_remove_sub_attribute_removes_attribute_by_default() {
        let ops = [op(PatchOp::Remove, Some("name.givenName"), None)];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert!(result.get("name").is_none());
    }

    #[test]
    fn test_remove_sub_attribute_only_under_policy() {
        let patcher = patcher().with_policy(PatchPolicy {
            sub_attribute_remove: SubAttributeRemove::SubAttribute,
            ..PatchPolicy::default()
        });
        let ops = [
            op(PatchOp::Remove, Some("name.givenName"), None),
            op(PatchOp::Remove, Some("emails[type eq \"work\"].primary"), None),
        ];
        let (result, changed) = run(&patcher, user(), &ops);
        assert!(changed);
        assert_eq!(result["name"], json!({"familyName": "Jensen"}));
        assert!(result["emails"][0].get("primary").is_none());
        assert_eq!(result["emails"][0]["value"], json!("bjensen@example.com"));
    }

    #[test]
    fn test_add_list_appends() {
        let ops = [op(
            PatchOp::Add,
            Some("emails"),
            Some(json!([{"value": "new@example.com", "type": "other"}])),
        )];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(result["emails"].as_array().unwrap().len(), 3);
        assert_eq!(result["emails"][2]["value"], json!("new@example.com"));
    }

    #[test]
    fn test_replace_list_overwrites() {
        let ops = [op(
            PatchOp::Replace,
            Some("emails"),
            Some(json!([{"value": "only@example.com"}])),
        )];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(result["emails"], json!([{"value": "only@example.com"}]));
    }

    #[test]
    fn test_add_map_merges_into_existing_map() {
        let ops = [op(PatchOp::Add, Some("name"), Some(json!({"middleName": "Jane"})))];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(
            result["name"],
            json!({"givenName": "Barbara", "familyName": "Jensen", "middleName": "Jane"})
        );
    }

    #[test]
    fn test_replace_map_overwrites_existing_map() {
        let ops = [op(PatchOp::Replace, Some("name"), Some(json!({"givenName": "Ann"})))];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(result["name"], json!({"givenName": "Ann"}));
    }

    #[test]
    fn test_blind_multi_attribute_set() {
        let ops = [op(
            PatchOp::Replace,
            None,
            Some(json!({"userName": "x", "active": false, "name.givenName": "Babs"})),
        )];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(result["userName"], json!("x"));
        assert_eq!(result["active"], json!(false));
        assert_eq!(result["name"]["givenName"], json!("Babs"));
        assert_eq!(result["name"]["familyName"], json!("Jensen"));
    }

    #[test]
    fn test_blind_set_with_same_values_is_unchanged() {
        let ops = [op(
            PatchOp::Replace,
            None,
            Some(json!({"userName": "bjensen", "active": true})),
        )];
        let (_, changed) = run(&patcher(), user(), &ops);
        assert!(!changed);
    }

    #[test]
    fn test_blind_set_requires_object_value() {
        let ops = [op(PatchOp::Replace, None, Some(json!("x")))];
        let err = patcher().apply(user(), &ops).unwrap_err();
        assert!(matches!(err, PatchError::InvalidValue(_)));
    }

    #[test]
    fn test_remove_without_path_is_no_target() {
        let ops = [op(PatchOp::Remove, None, None)];
        let err = patcher().apply(user(), &ops).unwrap_err();
        assert_eq!(err.scim_type(), Some("noTarget"));
    }

    #[test]
    fn test_missing_value_is_skipped() {
        let ops = [
            op(PatchOp::Add, Some("nickName"), None),
            op(PatchOp::Replace, Some("userName"), None),
        ];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(!changed);
        assert_eq!(result, user().to_json());
    }

    #[test]
    fn test_changed_accumulates_across_operations() {
        let ops = [
            op(PatchOp::Replace, Some("displayName"), Some(json!("Babs"))),
            op(PatchOp::Replace, Some("userName"), Some(json!("bjensen"))),
            op(PatchOp::Remove, Some("nickName"), None),
        ];
        let (_, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
    }

    #[test]
    fn test_operations_see_previous_results() {
        let ops = [
            op(PatchOp::Add, Some("nickName"), Some(json!("Babs"))),
            op(PatchOp::Remove, Some("nickName"), None),
        ];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert!(result.get("nickName").is_none());
    }

    #[test]
    fn test_filter_on_absent_attribute_is_not_implemented() {
        let ops = [op(
            PatchOp::Add,
            Some("phoneNumbers[type eq \"work\"]"),
            Some(json!({"value": "555"})),
        )];
        let err = patcher().apply(user(), &ops).unwrap_err();
        assert!(matches!(err, PatchError::NotImplemented(_)));
    }

    #[test]
    fn test_unknown_filter_attribute_is_invalid_filter() {
        let ops = [op(
            PatchOp::Replace,
            Some("emails[bogus eq \"x\"].value"),
            Some(json!("x")),
        )];
        let err = patcher().apply(user(), &ops).unwrap_err();
        assert_eq!(err.scim_type(), Some("invalidFilter"));
    }

    #[test]
    fn test_read_only_attributes_are_rejected() {
        for path in ["id", "meta.lastModified", "groups"] {
            let ops = [op(PatchOp::Replace, Some(path), Some(json!("x")))];
            let err = patcher().apply(user(), &ops).unwrap_err();
            assert!(matches!(err, PatchError::Mutability(_)), "{path}");
        }

        let ops = [op(PatchOp::Replace, None, Some(json!({"id": "other"})))];
        let err = patcher().apply(user(), &ops).unwrap_err();
        assert!(matches!(err, PatchError::Mutability(_)));
    }

    #[test]
    fn test_malformed_items_are_skipped_by_default() {
        let start = tree(json!({
            "emails": ["not-a-map", {"value": "a@example.com", "type": "work"}]
        }));
        let ops = [op(
            PatchOp::Replace,
            Some("emails[type eq \"work\"].value"),
            Some(json!("b@example.com")),
        )];
        let (result, changed) = run(&patcher(), start, &ops);
        assert!(changed);
        assert_eq!(result["emails"][0], json!("not-a-map"));
        assert_eq!(result["emails"][1]["value"], json!("b@example.com"));
    }

    #[test]
    fn test_filtered_remove_keeps_malformed_items() {
        let start = tree(json!({
            "emails": [
                {"value": "a@example.com", "type": "work"},
                "not-a-map",
                {"value": "b@example.com", "type": "home"},
                {"value": "c@example.com", "type": "work"}
            ]
        }));
        let ops = [op(PatchOp::Remove, Some("emails[type eq \"work\"]"), None)];
        let (result, changed) = run(&patcher(), start, &ops);
        assert!(changed);
        assert_eq!(
            result["emails"],
            json!(["not-a-map", {"value": "b@example.com", "type": "home"}])
        );
    }

    #[test]
    fn test_malformed_items_error_under_strict_policy() {
        let start = tree(json!({
            "emails": ["not-a-map", {"value": "a@example.com", "type": "work"}]
        }));
        let ops = [op(PatchOp::Remove, Some("emails[type eq \"work\"]"), None)];
        let strict = patcher().with_policy(PatchPolicy::strict());
        let err = strict.apply(start, &ops).unwrap_err();
        assert!(matches!(err, PatchError::TypeMismatch { .. }));
    }

    #[test]
    fn test_filtered_operation_on_non_list_is_skipped() {
        let ops = [op(
            PatchOp::Replace,
            Some("name[givenName eq \"Barbara\"].familyName"),
            Some(json!("Smith")),
        )];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(!changed);
        assert_eq!(result["name"]["familyName"], json!("Jensen"));
    }

    #[test]
    fn test_extension_attribute_lives_in_container() {
        let path = format!("{ENTERPRISE}:employeeNumber");
        let ops = [op(PatchOp::Add, Some(path.as_str()), Some(json!("701984")))];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(result[ENTERPRISE]["employeeNumber"], json!("701984"));
    }

    #[test]
    fn test_extension_sub_attribute_via_blind_set() {
        let key = format!("{ENTERPRISE}:manager.value");
        let ops = [op(PatchOp::Replace, None, Some(json!({ key: "26118915-6090-4610-87e4-49d8ca9f808d" })))];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(
            result[ENTERPRISE]["manager"],
            json!({"value": "26118915-6090-4610-87e4-49d8ca9f808d"})
        );
    }

    #[test]
    fn test_extension_container_path() {
        let ops = [op(
            PatchOp::Add,
            Some(ENTERPRISE),
            Some(json!({"department": "Tour Operations"})),
        )];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(result[ENTERPRISE], json!({"department": "Tour Operations"}));
    }

    #[test]
    fn test_core_schema_prefix_is_stripped() {
        let ops = [op(
            PatchOp::Replace,
            Some("urn:ietf:params:scim:schemas:core:2.0:User:displayName"),
            Some(json!("Babs")),
        )];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(changed);
        assert_eq!(result["displayName"], json!("Babs"));
    }

    #[test]
    fn test_remove_from_absent_extension_is_unchanged() {
        let path = format!("{ENTERPRISE}:department");
        let ops = [op(PatchOp::Remove, Some(path.as_str()), None)];
        let (result, changed) = run(&patcher(), user(), &ops);
        assert!(!changed);
        assert!(result.get(ENTERPRISE).is_none());
    }
}

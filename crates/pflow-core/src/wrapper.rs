//! The node wrapper: resolves a node's templated params against the
//! shared store (overlaid with any initial params supplied out-of-band),
//! type-validates the resolved values against the registry's declared
//! param types, and enriches any failure with actionable detail — original
//! template text, expected/actual type, up to three suggested fixes, and
//! (for unresolved identifiers) similar-name suggestions ranked by string
//! distance.
//!
//! Grounded on the teacher's preference for small self-contained
//! algorithms over incidental dependencies (`workflow/validator.rs`'s
//! hand-rolled DFS cycle detector): there is no string-similarity crate
//! anywhere in this dependency stack, so the typo-suggestion ranking below
//! is a hand-rolled Levenshtein distance rather than a new dependency.

use serde_json::Value;

use crate::coercion::{self, ParamType};
use crate::error::{Result, SuggestedFix, WorkflowError};
use crate::ir::{Node, RegistryEntry};
use crate::shared_store::SharedStore;
use crate::template;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Any unresolved `${...}` reference is a fatal `Template` error.
    Strict,
    /// An unresolved reference is left in place as literal text; the
    /// wrapper does not fail, but the node may observe the unreplaced
    /// placeholder in its resolved params.
    Permissive,
}

/// Resolves and type-checks every param of `node`, returning the resolved
/// param map ready to hand to [`crate::node::NodeLifecycle::prep`].
pub fn resolve_params(
    node: &Node,
    initial_params: &Value,
    shared: &SharedStore,
    entry: &RegistryEntry,
    mode: ResolutionMode,
) -> Result<Value> {
    let context = overlay(shared.as_context(), initial_params);

    let mut resolved = serde_json::Map::with_capacity(node.params.len());
    for (param_name, raw_value) in &node.params {
        let was_simple = raw_value.as_str().map(template::is_simple_template).unwrap_or(false);
        let original_template = raw_value.as_str().map(|s| s.to_string());

        let value = match resolve_one(raw_value, &context, mode) {
            Ok(v) => v,
            Err(WorkflowError::Template { message, original_template, suggestions, .. }) => {
                let suggestions = if suggestions.is_empty() {
                    suggest_similar_identifiers(&message, &context)
                } else {
                    suggestions
                };
                return Err(WorkflowError::Template {
                    node_id: node.id.clone(),
                    message,
                    original_template,
                    suggestions,
                });
            }
            Err(other) => return Err(other),
        };

        let value = if let Some(declared) = entry.params.get(param_name) {
            if let Some(param_type) = ParamType::parse(declared) {
                coercion::coerce(&node.id, param_name, value, param_type, was_simple, original_template.as_deref())?
            } else {
                value
            }
        } else {
            value
        };

        resolved.insert(param_name.clone(), value);
    }

    Ok(Value::Object(resolved))
}

/// Resolves `raw` against `context`, leaving any unresolved reference as
/// its literal `${path}` text (§ `template::resolve_string`'s per-match
/// contract). In `Strict` mode, a reference left unresolved anywhere in
/// `raw` is then reported as a fatal error; in `Permissive` mode the
/// partially-resolved value (with unresolved refs still literal) is
/// returned as-is. Multiple unresolved variables in the same template are
/// all collected, not just the first one found, per the spec's requirement
/// that they be "reported individually".
fn resolve_one(raw: &Value, context: &Value, mode: ResolutionMode) -> Result<Value> {
    let resolved = template::resolve_nested(raw, context)?;
    if mode == ResolutionMode::Strict {
        let mut unresolved = Vec::new();
        template::collect_unresolved(raw, context, &mut unresolved);
        if !unresolved.is_empty() {
            let original_template = raw.as_str().map(|s| s.to_string());
            return Err(unresolved_template_error(original_template.as_deref(), &unresolved));
        }
    }
    Ok(resolved)
}

fn unresolved_template_error(original_template: Option<&str>, unresolved: &[String]) -> WorkflowError {
    let primary = &unresolved[0];
    let mut message = format!("unresolved template variable '${{{primary}}}'");
    if unresolved.len() > 1 {
        let rest: Vec<String> = unresolved[1..].iter().map(|v| format!("'${{{v}}}'")).collect();
        message.push_str(&format!(", and {} more unresolved: {}", rest.len(), rest.join(", ")));
    }
    WorkflowError::Template {
        node_id: String::new(),
        message,
        original_template: original_template.map(|s| s.to_string()),
        suggestions: vec![],
    }
}

fn overlay(mut base: Value, initial_params: &Value) -> Value {
    if let (Value::Object(base_map), Value::Object(overlay_map)) = (&mut base, initial_params) {
        for (k, v) in overlay_map {
            base_map.insert(k.clone(), v.clone());
        }
    }
    base
}

/// Extracts the available top-level identifiers from `context` and ranks
/// them by Levenshtein distance against the unresolved name embedded in
/// `error_message`, returning up to three as suggested fixes.
fn suggest_similar_identifiers(error_message: &str, context: &Value) -> Vec<SuggestedFix> {
    let Some(start) = error_message.find('\'') else { return vec![] };
    let Some(rest) = error_message.get(start + 1..) else { return vec![] };
    let Some(end) = rest.find('\'') else { return vec![] };
    let unresolved = &rest[..end];
    let root = unresolved.trim_start_matches("${").trim_end_matches('}').split('.').next().unwrap_or(unresolved);

    let Value::Object(map) = context else { return vec![] };
    let mut candidates: Vec<(usize, &String)> =
        map.keys().map(|k| (levenshtein(root, k), k)).collect();
    candidates.sort_by_key(|(dist, _)| *dist);
    candidates
        .into_iter()
        .filter(|(dist, _)| *dist <= 3)
        .take(3)
        .map(|(_, k)| SuggestedFix::new(format!("did you mean '${{{k}}}'?")))
        .collect()
}

pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut prev = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let cur = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev
            } else {
                1 + prev.min(row[j]).min(row[j - 1])
            };
            prev = cur;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn entry_with_params(params: &[(&str, &str)]) -> RegistryEntry {
        RegistryEntry {
            inputs: HashMap::new(),
            params: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            outputs: HashMap::new(),
            actions: vec![],
            module: None,
            class_name: None,
            file_path: None,
        }
    }

    #[test]
    fn simple_template_keeps_native_type_after_coercion() {
        let mut shared = SharedStore::new();
        shared.set("count", json!(5));
        let node = Node {
            id: "n".to_string(),
            node_type: "value".to_string(),
            purpose: None,
            params: HashMap::from([("n".to_string(), json!("${count}"))]),
            batch: false,
        };
        let entry = entry_with_params(&[("n", "int")]);
        let resolved = resolve_params(&node, &json!({}), &shared, &entry, ResolutionMode::Strict).unwrap();
        assert_eq!(resolved["n"], json!(5));
    }

    #[test]
    fn strict_mode_fails_on_unresolved_reference() {
        let shared = SharedStore::new();
        let node = Node {
            id: "n".to_string(),
            node_type: "value".to_string(),
            purpose: None,
            params: HashMap::from([("greeting".to_string(), json!("hi ${nam}"))]),
            batch: false,
        };
        let entry = entry_with_params(&[]);
        let err = resolve_params(&node, &json!({"name": "Ada"}), &shared, &entry, ResolutionMode::Strict).unwrap_err();
        match err {
            WorkflowError::Template { suggestions, .. } => {
                assert!(suggestions.iter().any(|s| s.description.contains("name")));
            }
            _ => panic!("expected Template error"),
        }
    }

    #[test]
    fn permissive_mode_leaves_unresolved_reference_literal() {
        let shared = SharedStore::new();
        let node = Node {
            id: "n".to_string(),
            node_type: "value".to_string(),
            purpose: None,
            params: HashMap::from([("greeting".to_string(), json!("hi ${missing}"))]),
            batch: false,
        };
        let entry = entry_with_params(&[]);
        let resolved =
            resolve_params(&node, &json!({}), &shared, &entry, ResolutionMode::Permissive).unwrap();
        assert_eq!(resolved["greeting"], json!("hi ${missing}"));
    }

    #[test]
    fn permissive_mode_resolves_partially_when_only_some_variables_are_known() {
        let shared = SharedStore::new();
        let node = Node {
            id: "n".to_string(),
            node_type: "value".to_string(),
            purpose: None,
            params: HashMap::from([("greeting".to_string(), json!("hi ${name}, code ${missing}"))]),
            batch: false,
        };
        let entry = entry_with_params(&[]);
        let resolved =
            resolve_params(&node, &json!({"name": "Ada"}), &shared, &entry, ResolutionMode::Permissive).unwrap();
        assert_eq!(resolved["greeting"], json!("hi Ada, code ${missing}"));
    }

    #[test]
    fn strict_mode_reports_each_unresolved_variable_in_a_multi_variable_template() {
        let shared = SharedStore::new();
        let node = Node {
            id: "n".to_string(),
            node_type: "value".to_string(),
            purpose: None,
            params: HashMap::from([("greeting".to_string(), json!("${a} and ${b}"))]),
            batch: false,
        };
        let entry = entry_with_params(&[]);
        let err = resolve_params(&node, &json!({}), &shared, &entry, ResolutionMode::Strict).unwrap_err();
        match err {
            WorkflowError::Template { message, .. } => {
                assert!(message.contains('a') && message.contains('b'));
            }
            _ => panic!("expected Template error"),
        }
    }

    #[test]
    fn initial_params_overlay_shared_store() {
        let mut shared = SharedStore::new();
        shared.set("name", json!("fromStore"));
        let node = Node {
            id: "n".to_string(),
            node_type: "value".to_string(),
            purpose: None,
            params: HashMap::from([("greeting".to_string(), json!("hi ${name}"))]),
            batch: false,
        };
        let entry = entry_with_params(&[]);
        let resolved =
            resolve_params(&node, &json!({"name": "fromInitial"}), &shared, &entry, ResolutionMode::Strict).unwrap();
        assert_eq!(resolved["greeting"], json!("hi fromInitial"));
    }

    #[test]
    fn levenshtein_distance_basic_cases() {
        assert_eq!(levenshtein("name", "nam"), 1);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
    }
}

//! `${ident.path}` template grammar: detection, extraction, and resolution
//! against a lookup context. A template value is either a *simple*
//! template (the entire string is one reference — the resolved value keeps
//! its native JSON type) or a *complex* template (the reference is
//! embedded in surrounding text — the resolved value is always a string,
//! built by converting each referenced value per [`to_interpolated_string`]).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{Result, WorkflowError};

/// Matches `${ident(.ident)*}`, not preceded by an escaping `$`. Each
/// identifier segment allows hyphens after the first character (node ids
/// are commonly kebab-case, e.g. `${my-node.stdout}`).
static VARIABLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][\w-]*(?:\.[A-Za-z_][\w-]*)*)\}").unwrap());

/// Recursion depth guard for `resolve_nested`, matching the executor's
/// own bound on nested-container resolution.
const MAX_RESOLUTION_DEPTH: usize = 100;

pub fn has_templates(s: &str) -> bool {
    VARIABLE_PATTERN.is_match(s)
}

/// Returns every `${...}` reference path found in `s`, in left-to-right
/// order, with `$${...}` escapes excluded.
pub fn extract_variables(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    for m in VARIABLE_PATTERN.find_iter(s) {
        let escaped = m.start() > 0 && bytes[m.start() - 1] == b'$';
        if escaped {
            continue;
        }
        let path = &m.as_str()[2..m.as_str().len() - 1];
        out.push(path.to_string());
    }
    out
}

/// Whether `s` is exactly one `${...}` reference with no surrounding text
/// (a "simple" template whose resolved value preserves its native type).
pub fn is_simple_template(s: &str) -> bool {
    if let Some(caps) = VARIABLE_PATTERN.captures(s) {
        let m = caps.get(0).unwrap();
        m.start() == 0 && m.end() == s.len() && !has_escape_before(s, m.start())
    } else {
        false
    }
}

fn has_escape_before(s: &str, pos: usize) -> bool {
    pos > 0 && s.as_bytes()[pos - 1] == b'$'
}

/// Looks up a dotted path (`a.b.c`) against a JSON context object.
pub fn lookup_path<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = context;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

pub fn variable_exists(context: &Value, path: &str) -> bool {
    lookup_path(context, path).is_some()
}

/// Converts a value to its string form for *complex*-template
/// interpolation. `nil -> ""`, `bool -> "True"/"False"` (matching the
/// runtime's historical string-interpolation convention, distinct from the
/// lowercase `true`/`false` used for shell stdin adaptation in
/// `pflow-nodes`).
pub fn to_interpolated_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => if *b { "True".to_string() } else { "False".to_string() },
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Resolves a single template string against `context`. Returns a JSON
/// value: the native value for a simple template, a string for a complex
/// one, or `s` unchanged (wrapped as a string) if it contains no templates.
///
/// Never fails: a reference that cannot be resolved is left in the output
/// as its original literal `${path}` text, exactly like every other
/// successfully-resolved reference in the same string is replaced
/// independently. Callers that need to treat an unresolved reference as an
/// error (the node wrapper's strict mode) detect it themselves via
/// [`unresolved_variables`] rather than relying on this function to fail.
pub fn resolve_string(s: &str, context: &Value) -> Value {
    if let Some(unescaped) = unescape_if_pure_escape(s) {
        return Value::String(unescaped);
    }

    if !has_templates(s) {
        return Value::String(s.to_string());
    }

    if is_simple_template(s) {
        let path = &s[2..s.len() - 1];
        return lookup_path(context, path).cloned().unwrap_or_else(|| Value::String(s.to_string()));
    }

    let mut result = String::new();
    let mut last_end = 0;
    for m in VARIABLE_PATTERN.find_iter(s) {
        if m.start() > 0 && s.as_bytes()[m.start() - 1] == b'$' {
            continue;
        }
        result.push_str(&s[last_end..m.start()]);
        let path = &m.as_str()[2..m.as_str().len() - 1];
        match lookup_path(context, path) {
            Some(value) => result.push_str(&to_interpolated_string(value)),
            None => result.push_str(m.as_str()),
        }
        last_end = m.end();
    }
    result.push_str(&s[last_end..]);
    Value::String(result)
}

fn unescape_if_pure_escape(s: &str) -> Option<String> {
    if s.starts_with("$${") && s.ends_with('}') && !s[1..].contains("${") {
        return Some(s[1..].to_string());
    }
    None
}

/// The subset of `${path}` references in `s` whose base path does not
/// resolve against `context`. Checked against the *original* variable
/// names extracted from the source text, not by scanning the resolved
/// output for `${`-shaped substrings — a node's own output may legitimately
/// contain that text, and scanning for it would misreport it as
/// unresolved.
pub fn unresolved_variables(s: &str, context: &Value) -> Vec<String> {
    extract_variables(s).into_iter().filter(|v| !variable_exists(context, v)).collect()
}

/// Recurses through a param value (string/array/object) collecting every
/// unresolved variable found at any string leaf, in document order.
pub fn collect_unresolved(value: &Value, context: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.extend(unresolved_variables(s, context)),
        Value::Array(items) => {
            for item in items {
                collect_unresolved(item, context, out);
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                collect_unresolved(v, context, out);
            }
        }
        _ => {}
    }
}

/// Recursively resolves every string leaf of a JSON value (object/array
/// nesting) against `context`, guarding against runaway recursion.
pub fn resolve_nested(value: &Value, context: &Value) -> Result<Value> {
    resolve_nested_depth(value, context, 0)
}

fn resolve_nested_depth(value: &Value, context: &Value, depth: usize) -> Result<Value> {
    if depth > MAX_RESOLUTION_DEPTH {
        return Err(WorkflowError::Template {
            node_id: String::new(),
            message: "template resolution exceeded maximum nesting depth".to_string(),
            original_template: None,
            suggestions: vec![],
        });
    }
    match value {
        Value::String(s) => Ok(resolve_string(s, context)),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(resolve_nested_depth(item, context, depth + 1)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve_nested_depth(v, context, depth + 1)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_dotted_variable() {
        let vars = extract_variables("hello ${user.name}!");
        assert_eq!(vars, vec!["user.name".to_string()]);
    }

    #[test]
    fn extracts_hyphenated_node_id() {
        let vars = extract_variables("${my-node.stdout}");
        assert_eq!(vars, vec!["my-node.stdout".to_string()]);
    }

    #[test]
    fn escape_is_excluded_from_extraction() {
        let vars = extract_variables("literal $${not.a.var} and ${real.var}");
        assert_eq!(vars, vec!["real.var".to_string()]);
    }

    #[test]
    fn simple_template_preserves_type() {
        let ctx = json!({"count": 3});
        let resolved = resolve_string("${count}", &ctx);
        assert_eq!(resolved, json!(3));
    }

    #[test]
    fn complex_template_interpolates_bool_as_capitalized() {
        let ctx = json!({"flag": true});
        let resolved = resolve_string("value is ${flag}", &ctx);
        assert_eq!(resolved, json!("value is True"));
    }

    #[test]
    fn complex_template_interpolates_null_as_empty() {
        let ctx = json!({"missing": null});
        let resolved = resolve_string("[${missing}]", &ctx);
        assert_eq!(resolved, json!("[]"));
    }

    #[test]
    fn unresolved_simple_template_is_left_literal() {
        let ctx = json!({});
        let resolved = resolve_string("${nope}", &ctx);
        assert_eq!(resolved, json!("${nope}"));
        assert_eq!(unresolved_variables("${nope}", &ctx), vec!["nope".to_string()]);
    }

    #[test]
    fn partial_resolution_leaves_only_unresolved_refs_literal() {
        let ctx = json!({"name": "Ada"});
        let resolved = resolve_string("hi ${name}, code ${missing}", &ctx);
        assert_eq!(resolved, json!("hi Ada, code ${missing}"));
        assert_eq!(unresolved_variables("hi ${name}, code ${missing}", &ctx), vec!["missing".to_string()]);
    }

    #[test]
    fn escape_sequence_unescapes_to_literal() {
        let ctx = json!({});
        let resolved = resolve_string("$${literal}", &ctx);
        assert_eq!(resolved, json!("${literal}"));
    }

    #[test]
    fn resolve_nested_walks_objects_and_arrays() {
        let ctx = json!({"a": 1, "b": "x"});
        let template = json!({"list": ["${a}", "prefix-${b}"]});
        let resolved = resolve_nested(&template, &ctx).unwrap();
        assert_eq!(resolved, json!({"list": [1, "prefix-x"]}));
    }
}

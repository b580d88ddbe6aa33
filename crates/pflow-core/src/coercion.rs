//! Coercion from a resolved template value to the declared parameter type.
//!
//! Coercion only runs against the *result of resolution* (§ template.rs):
//! a simple template keeps its native JSON type from the shared store, and
//! this module decides whether that type is acceptable for the declared
//! parameter type, with a narrow set of forgiving conversions (matching the
//! runtime's "be liberal in what plain strings parse as" policy). A complex
//! template's result is always a string, so coercion is what gives it a
//! chance to become a structured value at all (JSON auto-parse).

use serde_json::Value;

use crate::error::{Result, SuggestedFix, WorkflowError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Str,
    Int,
    Float,
    Bool,
    Dict,
    List,
    Any,
}

impl ParamType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "str" | "string" => Some(ParamType::Str),
            "int" | "integer" => Some(ParamType::Int),
            "float" | "number" => Some(ParamType::Float),
            "bool" | "boolean" => Some(ParamType::Bool),
            "dict" | "object" => Some(ParamType::Dict),
            "list" | "array" => Some(ParamType::List),
            "any" => Some(ParamType::Any),
            _ => None,
        }
    }

}

fn type_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Applies `param_type`'s coercion policy to `value`, which is assumed to
/// already be the result of template resolution.
///
/// `was_simple_template` distinguishes a simple-template result (the
/// string came from a single `${path}` resolving to a JSON string, so
/// auto-parsing it as `dict`/`list` is expected) from a complex-template or
/// literal string result (auto-parse never applies — the string is just
/// text that happens to look like JSON).
pub fn coerce(
    node_id: &str,
    param: &str,
    value: Value,
    param_type: ParamType,
    was_simple_template: bool,
    original_template: Option<&str>,
) -> Result<Value> {
    match param_type {
        ParamType::Any => Ok(value),
        ParamType::Str => Ok(match value {
            Value::String(_) => value,
            other => Value::String(crate::template::to_interpolated_string(&other)),
        }),
        ParamType::Int => coerce_number(node_id, param, value, true, original_template),
        ParamType::Float => coerce_number(node_id, param, value, false, original_template),
        ParamType::Bool => coerce_bool(node_id, param, value, original_template),
        ParamType::Dict => coerce_container(node_id, param, value, was_simple_template, true, original_template),
        ParamType::List => coerce_container(node_id, param, value, was_simple_template, false, original_template),
    }
}

fn coerce_number(
    node_id: &str,
    param: &str,
    value: Value,
    want_int: bool,
    original_template: Option<&str>,
) -> Result<Value> {
    match &value {
        Value::Number(n) => {
            if want_int && !n.is_i64() && !n.is_u64() {
                if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 {
                        return Ok(Value::Number((f as i64).into()));
                    }
                }
            }
            Ok(value)
        }
        Value::String(s) => {
            let trimmed = s.trim();
            let parsed = if want_int {
                trimmed.parse::<i64>().ok().map(|v| Value::Number(v.into()))
            } else {
                trimmed.parse::<f64>().ok().and_then(serde_json::Number::from_f64).map(Value::Number)
            };
            parsed.ok_or_else(|| type_error(node_id, param, if want_int { "int" } else { "float" }, &value, original_template))
        }
        _ => Err(type_error(node_id, param, if want_int { "int" } else { "float" }, &value, original_template)),
    }
}

fn coerce_bool(node_id: &str, param: &str, value: Value, original_template: Option<&str>) -> Result<Value> {
    match &value {
        Value::Bool(_) => Ok(value),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Value::Bool(true)),
            "false" | "0" | "no" => Ok(Value::Bool(false)),
            _ => Err(type_error(node_id, param, "bool", &value, original_template)),
        },
        Value::Number(n) => Ok(Value::Bool(n.as_f64().unwrap_or(0.0) != 0.0)),
        _ => Err(type_error(node_id, param, "bool", &value, original_template)),
    }
}

fn coerce_container(
    node_id: &str,
    param: &str,
    value: Value,
    was_simple_template: bool,
    want_dict: bool,
    original_template: Option<&str>,
) -> Result<Value> {
    let matches = |v: &Value| if want_dict { v.is_object() } else { v.is_array() };
    if matches(&value) {
        return Ok(value);
    }
    // JSON auto-parse only applies to a simple-template result: that's the
    // case where an upstream node produced a JSON string meant for
    // structured consumption here. A complex-template or literal string is
    // left alone — re-parsing arbitrary text as JSON would be surprising.
    if let Value::String(s) = &value {
        if was_simple_template {
            if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                if matches(&parsed) {
                    return Ok(parsed);
                }
            }
            tracing::debug!(node_id, param, "string param failed JSON auto-parse for declared container type");
        }
    }
    Err(type_error(node_id, param, if want_dict { "dict" } else { "list" }, &value, original_template))
}

fn type_error(node_id: &str, param: &str, expected: &str, actual: &Value, original_template: Option<&str>) -> WorkflowError {
    let mut suggestions = Vec::new();
    if let Value::String(s) = actual {
        let preview: String = s.chars().take(80).collect();
        suggestions.push(SuggestedFix::new(format!(
            "value started with '{preview}'{}; does it need to be valid JSON?",
            if s.len() > 80 { "..." } else { "" }
        )));
    }
    if let Some(tmpl) = original_template {
        suggestions.push(SuggestedFix::new(format!(
            "check that '{tmpl}' resolves to a {expected}-shaped value upstream"
        )));
    }
    WorkflowError::NodeType {
        node_id: node_id.to_string(),
        param: param.to_string(),
        expected: expected.to_string(),
        actual: type_label(actual).to_string(),
        original_template: original_template.map(|s| s.to_string()),
        suggestions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn str_param_stringifies_non_string() {
        let out = coerce("n", "p", json!(42), ParamType::Str, true, None).unwrap();
        assert_eq!(out, json!("42"));
    }

    #[test]
    fn int_param_parses_numeric_string() {
        let out = coerce("n", "p", json!("7"), ParamType::Int, false, None).unwrap();
        assert_eq!(out, json!(7));
    }

    #[test]
    fn dict_param_auto_parses_simple_template_json_string() {
        let out = coerce("n", "p", json!(r#"{"a": 1}"#), ParamType::Dict, true, None).unwrap();
        assert_eq!(out, json!({"a": 1}));
    }

    #[test]
    fn dict_param_rejects_complex_template_string_without_reparsing() {
        let err = coerce("n", "p", json!(r#"{"a": 1}"#), ParamType::Dict, false, Some("${x} suffix")).unwrap_err();
        assert!(matches!(err, WorkflowError::NodeType { .. }));
    }

    #[test]
    fn bool_param_accepts_lowercase_literal() {
        let out = coerce("n", "p", json!("false"), ParamType::Bool, false, None).unwrap();
        assert_eq!(out, json!(false));
    }

    #[test]
    fn type_error_carries_suggestions() {
        let err = coerce("n", "p", json!("not a number"), ParamType::Int, false, Some("${x}")).unwrap_err();
        match err {
            WorkflowError::NodeType { suggestions, .. } => assert!(!suggestions.is_empty()),
            _ => panic!("expected NodeType error"),
        }
    }
}

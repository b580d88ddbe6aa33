//! Recursive secret redaction shared by the trace writer and the CLI's
//! JSON/text renderers, so a secret never reaches either surface.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};

const REDACTED: &str = "***REDACTED***";

static SECRET_TOKENS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "password", "passwd", "pwd", "token", "api_key", "apikey", "api-key", "secret",
        "credential", "credentials", "authorization", "auth", "access_token", "auth_token",
        "private_key", "ssh_key", "client_secret",
    ]
});

fn key_looks_secret(key: &str) -> bool {
    let lower = key.to_lowercase();
    SECRET_TOKENS.iter().any(|token| lower.contains(token))
}

/// Redacts any object key matching the fixed secret-token list, recursing
/// into nested objects/arrays. Values under non-matching keys are recursed
/// into but otherwise left untouched.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                if key_looks_secret(k) {
                    out.insert(k.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(k.clone(), redact(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

/// Marks which keys in `env_param_names` came from the environment so the
/// trace writer can redact them even when their key name doesn't match the
/// fixed token list (e.g. a workflow input named `db_connection` that
/// happens to carry a credential because it was sourced from the
/// environment).
pub fn redact_with_env_hints(value: &Value, env_param_names: &[String]) -> Value {
    let redacted = redact(value);
    match redacted {
        Value::Object(mut map) => {
            for name in env_param_names {
                if map.contains_key(name) {
                    map.insert(name.clone(), Value::String(REDACTED.to_string()));
                }
            }
            Value::Object(map)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_matching_keys_case_insensitively() {
        let input = json!({"API_KEY": "sk-123", "name": "ok"});
        let out = redact(&input);
        assert_eq!(out["API_KEY"], json!(REDACTED));
        assert_eq!(out["name"], json!("ok"));
    }

    #[test]
    fn redacts_recursively_into_nested_objects() {
        let input = json!({"config": {"password": "hunter2"}});
        let out = redact(&input);
        assert_eq!(out["config"]["password"], json!(REDACTED));
    }

    #[test]
    fn redacts_inside_arrays() {
        let input = json!([{"token": "abc"}, {"name": "ok"}]);
        let out = redact(&input);
        assert_eq!(out[0]["token"], json!(REDACTED));
        assert_eq!(out[1]["name"], json!("ok"));
    }

    #[test]
    fn env_hints_redact_unmatched_key_names() {
        let input = json!({"db_connection": "postgres://..."});
        let out = redact_with_env_hints(&input, &["db_connection".to_string()]);
        assert_eq!(out["db_connection"], json!(REDACTED));
    }
}

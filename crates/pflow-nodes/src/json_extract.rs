//! Extracts a dotted path out of a resolved `data` param, used to pick a
//! single field out of an upstream node's structured output — the
//! representative "type-mismatch-prone" node: feeding it a non-object
//! `data` when its own `path` is non-trivial is the scenario strict-mode
//! type validation exists to catch.

use pflow_core::error::{Result, WorkflowError};
use pflow_core::node::NodeLifecycle;
use pflow_core::shared_store::SharedStore;
use serde_json::Value;

#[derive(Default)]
pub struct JsonExtractNode;

impl NodeLifecycle for JsonExtractNode {
    fn prep(&self, node_id: &str, params: &Value, _shared: &SharedStore) -> Result<Value> {
        let data = params
            .get("data")
            .cloned()
            .ok_or_else(|| WorkflowError::Input { message: format!("node '{node_id}' is missing required param 'data'") })?;
        let path = params
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| WorkflowError::Input { message: format!("node '{node_id}' is missing required param 'path'") })?
            .to_string();
        Ok(serde_json::json!({ "data": data, "path": path }))
    }

    fn exec(&self, node_id: &str, prep_result: &Value) -> Result<Value> {
        let data = prep_result.get("data").cloned().unwrap_or(Value::Null);
        let path = prep_result.get("path").and_then(Value::as_str).unwrap_or_default();
        let extracted = pflow_core::template::lookup_path(&data, path).cloned().ok_or_else(|| WorkflowError::NodeExecFatal {
            node_id: node_id.to_string(),
            message: format!("path '{path}' not found in extracted data"),
        })?;
        Ok(serde_json::json!({ "value": extracted }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pflow_core::shared_store::SharedStore;
    use serde_json::json;

    #[test]
    fn extracts_nested_field() {
        let node = JsonExtractNode;
        let shared = SharedStore::new();
        let prep = node
            .prep("n", &json!({"data": {"a": {"b": 5}}, "path": "a.b"}), &shared)
            .unwrap();
        let exec = node.exec("n", &prep).unwrap();
        assert_eq!(exec["value"], json!(5));
    }

    #[test]
    fn missing_path_is_fatal() {
        let node = JsonExtractNode;
        let shared = SharedStore::new();
        let prep = node.prep("n", &json!({"data": {"a": 1}, "path": "missing"}), &shared).unwrap();
        let err = node.exec("n", &prep).unwrap_err();
        assert!(matches!(err, WorkflowError::NodeExecFatal { .. }));
    }
}

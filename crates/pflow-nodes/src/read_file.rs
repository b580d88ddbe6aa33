//! Reads a file's contents into the shared store under `contents`. A
//! missing or unreadable file is a retriable `NodeExec` error (the file
//! may appear moments later in a race with another process), distinct
//! from a malformed `path` param which fails during `prep`.

use std::fs;

use pflow_core::error::{Result, WorkflowError};
use pflow_core::node::NodeLifecycle;
use pflow_core::shared_store::SharedStore;
use serde_json::Value;

#[derive(Default)]
pub struct ReadFileNode;

impl NodeLifecycle for ReadFileNode {
    fn prep(&self, node_id: &str, params: &Value, _shared: &SharedStore) -> Result<Value> {
        let path = params
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| WorkflowError::Input { message: format!("node '{node_id}' is missing required param 'path'") })?;
        Ok(Value::String(path.to_string()))
    }

    fn exec(&self, node_id: &str, prep_result: &Value) -> Result<Value> {
        let path = prep_result.as_str().unwrap_or_default();
        let contents = fs::read_to_string(path).map_err(|e| WorkflowError::NodeExec {
            node_id: node_id.to_string(),
            message: format!("failed to read '{path}': {e}"),
            attempt: 1,
            max_retries: 1,
        })?;
        Ok(serde_json::json!({ "contents": contents }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pflow_core::shared_store::SharedStore;
    use serde_json::json;

    #[test]
    fn reads_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello world").unwrap();

        let node = ReadFileNode;
        let shared = SharedStore::new();
        let prep = node.prep("n", &json!({"path": path.to_str().unwrap()}), &shared).unwrap();
        let exec = node.exec("n", &prep).unwrap();
        assert_eq!(exec["contents"], json!("hello world"));
    }

    #[test]
    fn missing_file_is_retriable() {
        let node = ReadFileNode;
        let shared = SharedStore::new();
        let prep = node.prep("n", &json!({"path": "/nonexistent/path"}), &shared).unwrap();
        let err = node.exec("n", &prep).unwrap_err();
        assert!(matches!(err, WorkflowError::NodeExec { .. }));
    }
}

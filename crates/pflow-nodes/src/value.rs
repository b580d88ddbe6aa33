//! The simplest possible node: emits its resolved params unchanged. Used
//! to exercise the executor and wrapper without any external side effects
//! — most of the runtime's own test fixtures are built from this node.

use pflow_core::error::Result;
use pflow_core::node::NodeLifecycle;
use pflow_core::shared_store::SharedStore;
use serde_json::Value;

#[derive(Default)]
pub struct ValueNode;

impl NodeLifecycle for ValueNode {
    fn prep(&self, _node_id: &str, params: &Value, _shared: &SharedStore) -> Result<Value> {
        Ok(params.clone())
    }

    fn exec(&self, _node_id: &str, prep_result: &Value) -> Result<Value> {
        Ok(prep_result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emits_params_unchanged() {
        let node = ValueNode;
        let shared = SharedStore::new();
        let prep = node.prep("n", &json!({"x": 1}), &shared).unwrap();
        let exec = node.exec("n", &prep).unwrap();
        assert_eq!(exec, json!({"x": 1}));
    }
}

//! Per-run shared store: a string-keyed value map seeded with workflow
//! inputs, with each node's output written to `shared[nodeId]` after the
//! node runs.
//!
//! Grounded on the node-id/event-data split used by the teacher's
//! `TaskContext` (workflow-level data plus a per-node results map), adapted
//! from a `HashMap<TypeId, Value>`-shaped design to the spec's flat,
//! string-keyed, JSON-object model.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    data: Map<String, Value>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self { data: Map::new() }
    }

    /// Seeds the store with workflow inputs, each placed at its own
    /// top-level key.
    pub fn seed(inputs: Map<String, Value>) -> Self {
        Self { data: inputs }
    }

    /// Writes a node's `post`-stage output to `shared[nodeId]`, making
    /// `${nodeId.key}` resolve directly against the top-level store. The
    /// executor additionally re-exposes any output declared in the node's
    /// registry interface as a bare top-level key (legacy compatibility,
    /// see [`SharedStore::set`]); that aliasing needs the registry entry,
    /// so it happens in the executor rather than here.
    pub fn record_node_output(&mut self, node_id: &str, output: Value) {
        self.data.insert(node_id.to_string(), output);
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// The whole store as a JSON object, the context every template
    /// resolution call is run against.
    pub fn as_context(&self) -> Value {
        Value::Object(self.data.clone())
    }

    pub fn node_output(&self, node_id: &str) -> Option<&Value> {
        self.data.get(node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_node_output_lands_at_top_level_under_node_id() {
        let mut store = SharedStore::new();
        store.record_node_output("fetch", json!({"status": 200}));
        assert_eq!(store.node_output("fetch"), Some(&json!({"status": 200})));
        assert_eq!(store.get("fetch"), Some(&json!({"status": 200})));
    }

    #[test]
    fn seeded_inputs_are_visible_in_context() {
        let mut inputs = Map::new();
        inputs.insert("name".to_string(), json!("world"));
        let store = SharedStore::seed(inputs);
        assert_eq!(store.get("name"), Some(&json!("world")));
    }

    #[test]
    fn multiple_node_outputs_coexist() {
        let mut store = SharedStore::new();
        store.record_node_output("a", json!(1));
        store.record_node_output("b", json!(2));
        assert_eq!(store.node_output("a"), Some(&json!(1)));
        assert_eq!(store.node_output("b"), Some(&json!(2)));
    }
}

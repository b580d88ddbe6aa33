//! The node-type registry the executor and validator consult: a string
//! type-id maps to a constructor and the [`RegistryEntry`] metadata used to
//! validate params/outputs before any node runs.
//!
//! Grounded on the shape of the teacher's `AgentRegistry` trait
//! (`registry/agent_registry.rs`): a small trait plus a concrete in-memory
//! implementation, rather than the doc-comment-only `NodeRegistry` referenced
//! from `nodes/mod.rs` (which has no corresponding source file in this
//! codebase to adapt).

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, WorkflowError};
use crate::ir::RegistryEntry;
use crate::node::NodeLifecycle;

pub type NodeFactory = Arc<dyn Fn() -> Arc<dyn NodeLifecycle> + Send + Sync>;

struct Registration {
    entry: RegistryEntry,
    factory: NodeFactory,
}

/// In-memory node-type registry. Discovery/indexing of registry entries
/// from disk is an external concern (the spec scopes it out); this type
/// only holds what has already been registered.
#[derive(Default)]
pub struct NodeRegistry {
    registrations: HashMap<String, Registration>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self { registrations: HashMap::new() }
    }

    pub fn register<F>(&mut self, type_name: impl Into<String>, entry: RegistryEntry, factory: F)
    where
        F: Fn() -> Arc<dyn NodeLifecycle> + Send + Sync + 'static,
    {
        self.registrations.insert(type_name.into(), Registration { entry, factory: Arc::new(factory) });
    }

    pub fn entry(&self, type_name: &str) -> Option<&RegistryEntry> {
        self.registrations.get(type_name).map(|r| &r.entry)
    }

    pub fn instantiate(&self, type_name: &str) -> Result<Arc<dyn NodeLifecycle>> {
        self.registrations
            .get(type_name)
            .map(|r| (r.factory)())
            .ok_or_else(|| WorkflowError::Structural {
                message: format!("unknown node type '{type_name}'"),
            })
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.registrations.contains_key(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Action, NodeLifecycle};
    use crate::shared_store::SharedStore;
    use serde_json::{json, Value};
    use std::collections::HashMap as StdHashMap;

    struct NoopNode;
    impl NodeLifecycle for NoopNode {
        fn prep(&self, _node_id: &str, _params: &Value, _shared: &SharedStore) -> Result<Value> {
            Ok(json!(null))
        }
        fn exec(&self, _node_id: &str, _prep_result: &Value) -> Result<Value> {
            Ok(json!(null))
        }
    }

    #[test]
    fn register_then_instantiate_roundtrips() {
        let mut registry = NodeRegistry::new();
        registry.register(
            "noop",
            RegistryEntry {
                inputs: StdHashMap::new(),
                params: StdHashMap::new(),
                outputs: StdHashMap::new(),
                actions: vec![],
                module: None,
                class_name: None,
                file_path: None,
            },
            || Arc::new(NoopNode),
        );
        assert!(registry.contains("noop"));
        let node = registry.instantiate("noop").unwrap();
        let mut shared = SharedStore::new();
        let prep = node.prep("n", &json!(null), &shared).unwrap();
        let exec = node.exec("n", &prep).unwrap();
        let action = node.post("n", &mut shared, &prep, &exec).unwrap();
        assert_eq!(action, Action::Default);
    }

    #[test]
    fn unknown_type_is_structural_error() {
        let registry = NodeRegistry::new();
        let result = registry.instantiate("missing");
        assert!(matches!(result, Err(WorkflowError::Structural { .. })));
    }
}

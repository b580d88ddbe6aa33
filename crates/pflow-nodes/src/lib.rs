//! Built-in node types for the pflow runtime: `shell`, `value`,
//! `read-file`, and `json-extract`. Each implements
//! [`pflow_core::node::NodeLifecycle`]; [`register_builtin_nodes`] wires
//! all four into a [`pflow_core::registry::NodeRegistry`] with the param
//! type declarations the validator checks against.

pub mod json_extract;
pub mod read_file;
pub mod shell;
pub mod value;

use std::collections::HashMap;
use std::sync::Arc;

use pflow_core::ir::RegistryEntry;
use pflow_core::registry::NodeRegistry;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn register_builtin_nodes(registry: &mut NodeRegistry) {
    registry.register(
        "shell",
        RegistryEntry {
            inputs: HashMap::new(),
            params: HashMap::from([
                ("command".to_string(), "str".to_string()),
                ("stdin".to_string(), "any".to_string()),
                ("timeout_ms".to_string(), "int".to_string()),
            ]),
            outputs: HashMap::from([
                ("stdout".to_string(), "str".to_string()),
                ("stderr".to_string(), "str".to_string()),
                ("exit_code".to_string(), "int".to_string()),
            ]),
            actions: vec!["default".to_string()],
            module: Some("pflow_nodes::shell".to_string()),
            class_name: Some("ShellNode".to_string()),
            file_path: None,
        },
        || Arc::new(shell::ShellNode::default()),
    );

    registry.register(
        "value",
        RegistryEntry {
            inputs: HashMap::new(),
            params: HashMap::new(),
            outputs: HashMap::new(),
            actions: vec!["default".to_string()],
            module: Some("pflow_nodes::value".to_string()),
            class_name: Some("ValueNode".to_string()),
            file_path: None,
        },
        || Arc::new(value::ValueNode),
    );

    registry.register(
        "read-file",
        RegistryEntry {
            inputs: HashMap::new(),
            params: HashMap::from([("path".to_string(), "str".to_string())]),
            outputs: HashMap::from([("contents".to_string(), "str".to_string())]),
            actions: vec!["default".to_string()],
            module: Some("pflow_nodes::read_file".to_string()),
            class_name: Some("ReadFileNode".to_string()),
            file_path: None,
        },
        || Arc::new(read_file::ReadFileNode),
    );

    registry.register(
        "json-extract",
        RegistryEntry {
            inputs: HashMap::new(),
            params: HashMap::from([
                ("data".to_string(), "any".to_string()),
                ("path".to_string(), "str".to_string()),
            ]),
            outputs: HashMap::from([("value".to_string(), "any".to_string())]),
            actions: vec!["default".to_string()],
            module: Some("pflow_nodes::json_extract".to_string()),
            class_name: Some("JsonExtractNode".to_string()),
            file_path: None,
        },
        || Arc::new(json_extract::JsonExtractNode),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_builtin_types_register() {
        let mut registry = NodeRegistry::new();
        register_builtin_nodes(&mut registry);
        for name in ["shell", "value", "read-file", "json-extract"] {
            assert!(registry.contains(name), "{name} should be registered");
        }
    }
}

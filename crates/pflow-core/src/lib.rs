//! Deterministic workflow runtime core: IR model and validation, template
//! resolution and type coercion, and the node lifecycle executor.
//!
//! This crate has no opinion on where a workflow's IR comes from (the
//! `.pflow.md` markdown format lives in `pflow-cli`) or what node types
//! exist (concrete nodes live in `pflow-nodes`); it only implements the
//! three subsystems every workflow run passes through:
//!
//! - [`ir`]: the `WorkflowIr` data model and `Normalize`.
//! - [`template`] / [`coercion`]: the `${ident.path}` grammar and the
//!   per-type coercion policy applied to a resolved value.
//! - [`validator`]: structural, data-flow, template and node-type checks,
//!   run once before any node executes.
//! - [`wrapper`]: per-node param resolution plus enriched error reporting.
//! - [`executor`]: the lifecycle state machine that actually runs nodes.
//!
//! ```rust
//! use pflow_core::ir::{WorkflowIr, Node, InputSpec};
//! use pflow_core::registry::NodeRegistry;
//! use pflow_core::executor::Executor;
//! use pflow_core::wrapper::ResolutionMode;
//! use pflow_core::node::NodeLifecycle;
//! use pflow_core::shared_store::SharedStore;
//! use pflow_core::error::Result;
//! use serde_json::{json, Value};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! struct EchoNode;
//! impl NodeLifecycle for EchoNode {
//!     fn prep(&self, _id: &str, params: &Value, _shared: &SharedStore) -> Result<Value> {
//!         Ok(params.clone())
//!     }
//!     fn exec(&self, _id: &str, prep_result: &Value) -> Result<Value> {
//!         Ok(prep_result.clone())
//!     }
//! }
//!
//! let mut registry = NodeRegistry::new();
//! registry.register("echo", pflow_core::ir::RegistryEntry {
//!     inputs: HashMap::new(),
//!     params: HashMap::new(),
//!     outputs: HashMap::new(),
//!     actions: vec![],
//!     module: None,
//!     class_name: None,
//!     file_path: None,
//! }, || Arc::new(EchoNode));
//!
//! let ir = WorkflowIr {
//!     ir_version: "1".to_string(),
//!     inputs: HashMap::new(),
//!     nodes: vec![Node {
//!         id: "only".to_string(),
//!         node_type: "echo".to_string(),
//!         purpose: None,
//!         params: HashMap::from([("msg".to_string(), json!("hi"))]),
//!         batch: false,
//!     }],
//!     edges: vec![],
//!     outputs: HashMap::new(),
//! };
//!
//! let executor = Executor::new(&registry);
//! let (_shared, trace) = executor.run(&ir, json!({}), ResolutionMode::Strict).unwrap();
//! assert_eq!(trace.steps.len(), 1);
//! ```

pub mod coercion;
pub mod error;
pub mod executor;
pub mod ir;
pub mod node;
pub mod registry;
pub mod secrets;
pub mod shared_store;
pub mod template;
pub mod validator;
pub mod wrapper;

pub use error::{ErrorCategory, Result, WorkflowError};
pub use ir::WorkflowIr;
pub use node::{Action, NodeLifecycle, RetryPolicy};
pub use shared_store::SharedStore;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use crate::error::{ErrorCategory, Result, WorkflowError};
    pub use crate::ir::{Edge, InputSpec, Node, OutputSpec, RegistryEntry, WorkflowIr};
    pub use crate::node::{Action, NodeLifecycle, RetryPolicy};
    pub use crate::registry::NodeRegistry;
    pub use crate::shared_store::SharedStore;
    pub use crate::wrapper::ResolutionMode;
}

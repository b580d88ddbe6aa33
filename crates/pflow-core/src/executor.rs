//! The node lifecycle executor: computes a topological plan, seeds the
//! shared store from workflow inputs, steps through nodes in order running
//! `prep`/`exec`(retried)/`exec_fallback`/`post`, and materialises declared
//! outputs only after every node has completed.
//!
//! Single-threaded cooperative execution: nodes run one at a time in plan
//! order, `exec` may internally suspend (e.g. block on a subprocess) but
//! the executor never interleaves two nodes' lifecycles, and cancellation
//! is only checked between nodes, never inside one. This mirrors the
//! teacher's sequential `Workflow::run` loop (`workflow/mod.rs`) with the
//! `TypeId`-keyed dispatch and `thread::spawn`-based parallel branch
//! execution removed, since this IR never has more than one live branch at
//! a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::{ErrorCategory, Result, WorkflowError};
use crate::ir::WorkflowIr;
use crate::node::Action;
use crate::registry::NodeRegistry;
use crate::shared_store::SharedStore;
use crate::validator;
use crate::wrapper::{self, ResolutionMode};

/// Installs the process-wide SIGPIPE policy this runtime requires: ignore
/// it rather than let the default disposition terminate the process, so a
/// shell node whose downstream reader closes early (e.g. `cmd | head`)
/// surfaces as a normal non-zero exit code instead of killing the whole
/// `pflow` process. Must be called once, early, before any subprocess is
/// spawned — node implementations rely on this having already happened.
pub fn ignore_sigpipe() -> Result<()> {
    // SAFETY: SIG_IGN is one of the two well-defined dispositions for
    // SIGPIPE and this call has no preconditions beyond "not inside a
    // signal handler", which holds here.
    unsafe {
        nix::sys::signal::signal(nix::sys::signal::Signal::SIGPIPE, nix::sys::signal::SigHandler::SigIgn)
            .map_err(|e| WorkflowError::Structural { message: format!("failed to install SIGPIPE policy: {e}") })?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ExecutionStep {
    pub node_id: String,
    pub duration_ms: u64,
    pub action: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExecutionTrace {
    pub steps: Vec<ExecutionStep>,
}

pub struct Executor<'a> {
    registry: &'a NodeRegistry,
    cancelled: Arc<AtomicBool>,
}

impl<'a> Executor<'a> {
    pub fn new(registry: &'a NodeRegistry) -> Self {
        Self { registry, cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// A cloneable handle the caller can flip from another thread/signal
    /// handler to request cancellation; checked only between nodes.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn run(&self, ir: &WorkflowIr, inputs: Value, mode: ResolutionMode) -> Result<(SharedStore, ExecutionTrace)> {
        let (plan, _report) = validator::validate(ir, self.registry)?;

        let mut shared = seed_shared_store(ir, inputs)?;
        let mut trace = ExecutionTrace { steps: vec![] };

        for node_id in &plan {
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(WorkflowError::Cancellation { node_id: node_id.clone() });
            }

            let node = ir.node_by_id(node_id).expect("plan only contains known node ids");
            let entry = self
                .registry
                .entry(&node.node_type)
                .expect("validator already confirmed the node type is registered");
            let lifecycle = self.registry.instantiate(&node.node_type)?;

            let started = Instant::now();
            let resolved_params = wrapper::resolve_params(node, &Value::Null, &shared, entry, mode)?;

            let prep_result = lifecycle.prep(node_id, &resolved_params, &shared)?;

            let policy = lifecycle.retry_policy();
            let mut attempt = 0;
            let exec_result = loop {
                attempt += 1;
                match lifecycle.exec(node_id, &prep_result) {
                    Ok(value) => break value,
                    Err(err) if err.category() == ErrorCategory::NodeExec && attempt <= policy.max_retries => {
                        tracing::warn!(node_id, attempt, "node exec failed, retrying");
                        if policy.wait_ms > 0 {
                            std::thread::sleep(Duration::from_millis(policy.wait_ms));
                        }
                        continue;
                    }
                    Err(err) if err.category() == ErrorCategory::NodeExec => {
                        match lifecycle.exec_fallback(node_id, &prep_result, &err) {
                            Ok(value) => break value,
                            Err(fallback_err) => {
                                trace.steps.push(ExecutionStep {
                                    node_id: node_id.clone(),
                                    duration_ms: started.elapsed().as_millis() as u64,
                                    action: "failed".to_string(),
                                    error: Some(fallback_err.to_string()),
                                });
                                return Err(fallback_err);
                            }
                        }
                    }
                    Err(err) => {
                        trace.steps.push(ExecutionStep {
                            node_id: node_id.clone(),
                            duration_ms: started.elapsed().as_millis() as u64,
                            action: "failed".to_string(),
                            error: Some(err.to_string()),
                        });
                        return Err(err);
                    }
                }
            };

            let action = lifecycle.post(node_id, &mut shared, &prep_result, &exec_result)?;
            if let Value::Object(output_map) = &exec_result {
                for key in entry.outputs.keys() {
                    if let Some(value) = output_map.get(key) {
                        shared.set(key.clone(), value.clone());
                    }
                }
            }
            trace.steps.push(ExecutionStep {
                node_id: node_id.clone(),
                duration_ms: started.elapsed().as_millis() as u64,
                action: action_label(&action),
                error: None,
            });
        }

        Ok((shared, trace))
    }

    /// Resolves declared workflow outputs against the final shared store.
    /// Only ever called after every planned node has completed.
    pub fn materialize_outputs(&self, ir: &WorkflowIr, shared: &SharedStore) -> Result<Value> {
        let context = shared.as_context();
        let mut out = serde_json::Map::with_capacity(ir.outputs.len());
        for (name, spec) in &ir.outputs {
            let resolved = crate::template::resolve_string(&spec.source, &context);
            out.insert(name.clone(), resolved);
        }
        Ok(Value::Object(out))
    }
}

fn action_label(action: &Action) -> String {
    match action {
        Action::Default => "default".to_string(),
        Action::Named(name) => name.clone(),
    }
}

fn seed_shared_store(ir: &WorkflowIr, inputs: Value) -> Result<SharedStore> {
    let Value::Object(mut map) = inputs else {
        return Err(WorkflowError::Input { message: "workflow inputs must be a JSON object".to_string() });
    };
    for (name, spec) in &ir.inputs {
        if !map.contains_key(name) {
            if spec.required {
                return Err(WorkflowError::Input { message: format!("missing required input '{name}'") });
            }
            if let Some(default) = &spec.default {
                map.insert(name.clone(), default.clone());
            }
        }
        if let Some(value) = map.get(name).cloned() {
            if let Some(param_type) = crate::coercion::ParamType::parse(&spec.input_type) {
                let coerced = crate::coercion::coerce(name, name, value, param_type, false, None)?;
                map.insert(name.clone(), coerced);
            }
        }
    }
    Ok(SharedStore::seed(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Edge, InputSpec, Node, OutputSpec, RegistryEntry};
    use crate::node::NodeLifecycle;
    use crate::shared_store::SharedStore as Store;
    use serde_json::json;
    use std::collections::HashMap;

    struct PassthroughNode;
    impl NodeLifecycle for PassthroughNode {
        fn prep(&self, _node_id: &str, params: &Value, _shared: &Store) -> Result<Value> {
            Ok(params.clone())
        }
        fn exec(&self, _node_id: &str, prep_result: &Value) -> Result<Value> {
            Ok(prep_result.clone())
        }
    }

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register(
            "value",
            RegistryEntry {
                inputs: HashMap::new(),
                params: HashMap::from([("out".to_string(), "any".to_string())]),
                outputs: HashMap::new(),
                actions: vec![],
                module: None,
                class_name: None,
                file_path: None,
            },
            || Arc::new(PassthroughNode),
        );
        registry
    }

    #[test]
    fn linear_chain_executes_in_document_order_and_materializes_outputs() {
        let registry = registry();
        let ir = WorkflowIr {
            ir_version: "1".to_string(),
            inputs: HashMap::from([(
                "name".to_string(),
                InputSpec { input_type: "str".to_string(), required: true, default: None, description: None },
            )]),
            nodes: vec![
                Node {
                    id: "greet".to_string(),
                    node_type: "value".to_string(),
                    purpose: None,
                    params: HashMap::from([("out".to_string(), json!("hello ${name}"))]),
                    batch: false,
                },
                Node {
                    id: "shout".to_string(),
                    node_type: "value".to_string(),
                    purpose: None,
                    params: HashMap::from([("out".to_string(), json!("${greet.out}!!!"))]),
                    batch: false,
                },
            ],
            edges: vec![Edge { from: "greet".to_string(), to: "shout".to_string() }],
            outputs: HashMap::from([(
                "final".to_string(),
                OutputSpec { source: "${shout.out}".to_string(), description: None },
            )]),
        };

        let executor = Executor::new(&registry);
        let (shared, trace) = executor.run(&ir, json!({"name": "Ada"}), ResolutionMode::Strict).unwrap();
        assert_eq!(trace.steps.len(), 2);
        let outputs = executor.materialize_outputs(&ir, &shared).unwrap();
        assert_eq!(outputs["final"], json!("hello Ada!!!"));
    }

    #[test]
    fn missing_required_input_is_rejected_before_any_node_runs() {
        let registry = registry();
        let ir = WorkflowIr {
            ir_version: "1".to_string(),
            inputs: HashMap::from([(
                "name".to_string(),
                InputSpec { input_type: "str".to_string(), required: true, default: None, description: None },
            )]),
            nodes: vec![Node {
                id: "greet".to_string(),
                node_type: "value".to_string(),
                purpose: None,
                params: HashMap::from([("out".to_string(), json!("hello ${name}"))]),
                batch: false,
            }],
            edges: vec![],
            outputs: HashMap::new(),
        };
        let executor = Executor::new(&registry);
        let err = executor.run(&ir, json!({}), ResolutionMode::Strict).unwrap_err();
        assert!(matches!(err, WorkflowError::Input { .. }));
    }

    #[test]
    fn cancellation_before_a_node_short_circuits() {
        let registry = registry();
        let ir = WorkflowIr {
            ir_version: "1".to_string(),
            inputs: HashMap::new(),
            nodes: vec![
                Node { id: "a".to_string(), node_type: "value".to_string(), purpose: None, params: HashMap::from([("out".to_string(), json!(1))]), batch: false },
                Node { id: "b".to_string(), node_type: "value".to_string(), purpose: None, params: HashMap::from([("out".to_string(), json!(2))]), batch: false },
            ],
            edges: vec![Edge { from: "a".to_string(), to: "b".to_string() }],
            outputs: HashMap::new(),
        };
        let executor = Executor::new(&registry);
        executor.cancellation_flag().store(true, Ordering::SeqCst);
        let err = executor.run(&ir, json!({}), ResolutionMode::Strict).unwrap_err();
        assert!(matches!(err, WorkflowError::Cancellation { .. }));
    }
}

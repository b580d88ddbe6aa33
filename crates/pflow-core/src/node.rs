//! The node lifecycle contract: `prep` -> `exec` (retried) -> `post`, with
//! `exec_fallback` as the last resort when retries are exhausted.
//!
//! Adapted from the teacher's single-method `Node::process(&self, context)`
//! contract (`nodes/mod.rs`) into the four-stage lifecycle this runtime
//! requires: `prep` reads the shared store once and is never retried,
//! `exec` does the node's actual work and is retried up to `max_retries`
//! times on a retriable error, `exec_fallback` is given a chance to recover
//! after retries are exhausted and must not itself raise, and `post` writes
//! results back to the shared store and returns the next action.

use serde_json::Value;

use crate::error::{Result, WorkflowError};
use crate::shared_store::SharedStore;

/// The action a node's `post` stage returns. In this runtime the graph has
/// no conditional branches, so `Action::Default` is the only action that
/// advances execution; `Action::Named` is retained for forward
/// compatibility with node types that want to record a named outcome in
/// the trace without it affecting dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Default,
    Named(String),
}

impl Default for Action {
    fn default() -> Self {
        Action::Default
    }
}

/// Retry policy for a node's `exec` stage.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub wait_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 1, wait_ms: 0 }
    }
}

/// A concrete node type implements this trait. `prep_result`/`exec_result`
/// are left as `serde_json::Value` (rather than an associated type per
/// node) because the executor dispatches across heterogeneous node types
/// looked up by string id at runtime, not by a compile-time type parameter
/// — unlike the teacher's `TypeId`-indexed dispatch, this IR is data, and
/// the set of node types is only known at registry-lookup time.
pub trait NodeLifecycle: Send + Sync {
    /// Reads whatever this node needs from the shared store and resolved
    /// params. Not retried: any error here is immediately fatal.
    fn prep(&self, node_id: &str, params: &Value, shared: &SharedStore) -> Result<Value>;

    /// Performs the node's actual work. May be retried by the executor
    /// according to [`NodeLifecycle::retry_policy`] when it returns a
    /// `WorkflowError::NodeExec` (retriable). Any other error variant
    /// short-circuits retries.
    fn exec(&self, node_id: &str, prep_result: &Value) -> Result<Value>;

    /// Invoked when `exec` fails even after all retries are exhausted.
    /// Must not raise: if the node cannot recover, it should return the
    /// original error by converting it into an `Ok` discriminated value,
    /// or the executor's default fallback (propagate the last error) is
    /// used. The default implementation re-raises as `NodeExecFatal`.
    fn exec_fallback(&self, node_id: &str, _prep_result: &Value, last_error: &WorkflowError) -> Result<Value> {
        Err(WorkflowError::NodeExecFatal {
            node_id: node_id.to_string(),
            message: last_error.to_string(),
        })
    }

    /// Writes `exec_result` into the shared store and returns the next
    /// action. Not retried.
    fn post(&self, node_id: &str, shared: &mut SharedStore, prep_result: &Value, exec_result: &Value) -> Result<Action> {
        let _ = prep_result;
        shared.record_node_output(node_id, exec_result.clone());
        Ok(Action::Default)
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }
}

//! Error taxonomy for the runtime.
//!
//! Every failure surfaced by the IR validator, the template resolver, the
//! type coercion layer, the node wrapper or the executor is represented as
//! one [`WorkflowError`] variant. Variants are grouped by [`ErrorCategory`]
//! rather than by the layer that raised them, since the category (not the
//! layer) decides whether the executor retries, falls back, or aborts.

use std::fmt;

/// Broad classification used by the executor to decide retry/fallback
/// behaviour and by the CLI to decide exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// IR failed structural, data-flow, template, or node-type validation.
    Validation,
    /// A required input was missing or failed coercion at the workflow boundary.
    Input,
    /// A node's `exec` raised a retriable error.
    NodeExec,
    /// A node's `exec` raised a non-retriable error; no more attempts are made.
    NodeExecFatal,
    /// A node exceeded its configured timeout.
    Timeout,
    /// The run was cancelled between node boundaries.
    Cancellation,
}

impl ErrorCategory {
    /// Whether errors in this category are retriable by the executor's
    /// per-node retry loop (distinct from whether the *run* as a whole can
    /// proceed afterward).
    pub fn is_retriable(self) -> bool {
        matches!(self, ErrorCategory::NodeExec | ErrorCategory::Timeout)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Input => "input",
            ErrorCategory::NodeExec => "node_exec",
            ErrorCategory::NodeExecFatal => "node_exec_fatal",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Cancellation => "cancellation",
        };
        write!(f, "{s}")
    }
}

/// One suggested fix attached to a template/type error, rendered as part of
/// the multi-section error enrichment the node wrapper produces.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SuggestedFix {
    pub description: String,
}

impl SuggestedFix {
    pub fn new(description: impl Into<String>) -> Self {
        Self { description: description.into() }
    }
}

/// The runtime's single error type. Variants map onto the nine error kinds
/// named by the contract between validator, wrapper and executor.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// IR is malformed: duplicate node ids, dangling edges, missing start,
    /// input/node-id collisions.
    #[error("structural error: {message}")]
    Structural { message: String },

    /// IR fails data-flow validation: a cycle, an unreachable node, or a
    /// node reading an output that cannot have been produced yet.
    #[error("dataflow error: {message}")]
    Dataflow { message: String },

    /// A template string references an identifier that does not exist in
    /// the shared store/initial params, or the grammar itself is malformed.
    #[error("template error in node '{node_id}': {message}")]
    Template {
        node_id: String,
        message: String,
        original_template: Option<String>,
        suggestions: Vec<SuggestedFix>,
    },

    /// A resolved value failed the declared parameter type's coercion
    /// policy (e.g. a `dict`-typed param received a bare string that does
    /// not parse as JSON).
    #[error("type error in node '{node_id}' param '{param}': expected {expected}, got {actual}")]
    NodeType {
        node_id: String,
        param: String,
        expected: String,
        actual: String,
        original_template: Option<String>,
        suggestions: Vec<SuggestedFix>,
    },

    /// A required workflow input was missing, or an input's declared type
    /// coercion failed.
    #[error("input error: {message}")]
    Input { message: String },

    /// A node's `exec` raised an error that is retriable per its own
    /// classification (e.g. a subprocess returned a non-zero but
    /// transient-looking exit code).
    #[error("node '{node_id}' exec failed (attempt {attempt}/{max_retries}): {message}")]
    NodeExec {
        node_id: String,
        message: String,
        attempt: u32,
        max_retries: u32,
    },

    /// A node's `exec` raised a non-retriable error, or retries were
    /// exhausted and no `exec_fallback` recovered it.
    #[error("node '{node_id}' failed fatally: {message}")]
    NodeExecFatal { node_id: String, message: String },

    /// A node did not complete within its configured timeout.
    #[error("node '{node_id}' timed out after {elapsed_ms}ms")]
    Timeout { node_id: String, elapsed_ms: u64 },

    /// The run was cancelled before the next node began.
    #[error("run cancelled before node '{node_id}'")]
    Cancellation { node_id: String },
}

impl WorkflowError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            WorkflowError::Structural { .. }
            | WorkflowError::Dataflow { .. }
            | WorkflowError::Template { .. }
            | WorkflowError::NodeType { .. } => ErrorCategory::Validation,
            WorkflowError::Input { .. } => ErrorCategory::Input,
            WorkflowError::NodeExec { .. } => ErrorCategory::NodeExec,
            WorkflowError::NodeExecFatal { .. } => ErrorCategory::NodeExecFatal,
            WorkflowError::Timeout { .. } => ErrorCategory::Timeout,
            WorkflowError::Cancellation { .. } => ErrorCategory::Cancellation,
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        match self {
            WorkflowError::Template { node_id, .. }
            | WorkflowError::NodeType { node_id, .. }
            | WorkflowError::NodeExec { node_id, .. }
            | WorkflowError::NodeExecFatal { node_id, .. }
            | WorkflowError::Timeout { node_id, .. }
            | WorkflowError::Cancellation { node_id, .. } => Some(node_id),
            WorkflowError::Structural { .. }
            | WorkflowError::Dataflow { .. }
            | WorkflowError::Input { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_exec_is_retriable_but_fatal_is_not() {
        assert!(ErrorCategory::NodeExec.is_retriable());
        assert!(!ErrorCategory::NodeExecFatal.is_retriable());
    }

    #[test]
    fn category_derivation_matches_variant() {
        let err = WorkflowError::Dataflow { message: "cycle".into() };
        assert_eq!(err.category(), ErrorCategory::Validation);
    }
}

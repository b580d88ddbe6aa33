//! Text and JSON rendering of validation reports, execution results, and
//! errors. The JSON shape is meant for scripting consumers; text is for a
//! human at a terminal.

use pflow_core::error::WorkflowError;
use pflow_core::executor::ExecutionTrace;
use pflow_core::validator::ValidationReport;
use serde_json::json;

use crate::OutputFormat;

pub fn print_validation_ok(report: &ValidationReport, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            println!("workflow is valid");
            for warning in &report.warnings {
                println!("warning: {}", warning.message);
            }
        }
        OutputFormat::Json => {
            let payload = json!({
                "valid": true,
                "warnings": report.warnings.iter().map(|w| &w.message).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&payload).unwrap());
        }
    }
}

pub fn print_result(trace: &ExecutionTrace, outputs: &serde_json::Value, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            for step in &trace.steps {
                println!("{} -> {} ({}ms)", step.node_id, step.action, step.duration_ms);
            }
            println!("---");
            println!("{}", serde_json::to_string_pretty(outputs).unwrap());
        }
        OutputFormat::Json => {
            let steps: Vec<_> = trace
                .steps
                .iter()
                .map(|s| json!({"node_id": s.node_id, "action": s.action, "duration_ms": s.duration_ms, "error": s.error}))
                .collect();
            let payload = json!({ "steps": steps, "outputs": outputs });
            println!("{}", serde_json::to_string_pretty(&payload).unwrap());
        }
    }
}

pub fn print_error(error: &WorkflowError, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            eprintln!("error ({}): {}", error.category(), error);
            if let WorkflowError::Template { suggestions, .. } | WorkflowError::NodeType { suggestions, .. } = error {
                for fix in suggestions {
                    eprintln!("  hint: {}", fix.description);
                }
            }
        }
        OutputFormat::Json => {
            let suggestions: Vec<&str> = match error {
                WorkflowError::Template { suggestions, .. } | WorkflowError::NodeType { suggestions, .. } => {
                    suggestions.iter().map(|s| s.description.as_str()).collect()
                }
                _ => vec![],
            };
            let payload = json!({
                "category": error.category().to_string(),
                "node_id": error.node_id(),
                "message": error.to_string(),
                "suggestions": suggestions,
            });
            eprintln!("{}", serde_json::to_string_pretty(&payload).unwrap());
        }
    }
}

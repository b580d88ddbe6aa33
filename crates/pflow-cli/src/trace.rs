//! Writes a sanitized JSON execution trace to disk after a run, named
//! `workflow-trace-YYYYMMDD-HHMMSS.json` inside the given directory.
//! Secret-shaped values are redacted before the trace ever touches disk.

use std::fs;
use std::path::Path;

use pflow_core::executor::ExecutionTrace;
use serde_json::json;

pub fn write_trace(dir: &Path, trace: &ExecutionTrace, outputs: &serde_json::Value) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;

    let steps: Vec<_> = trace
        .steps
        .iter()
        .map(|s| json!({"node_id": s.node_id, "action": s.action, "duration_ms": s.duration_ms, "error": s.error}))
        .collect();
    let payload = json!({ "steps": steps, "outputs": pflow_core::secrets::redact(outputs) });

    let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!("workflow-trace-{timestamp}.json"));
    fs::write(path, serde_json::to_vec_pretty(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pflow_core::executor::ExecutionStep;
    use serde_json::json;

    #[test]
    fn writes_redacted_trace_file() {
        let dir = tempfile::tempdir().unwrap();
        let trace = ExecutionTrace {
            steps: vec![ExecutionStep {
                node_id: "a".to_string(),
                duration_ms: 5,
                action: "default".to_string(),
                error: None,
            }],
        };
        let outputs = json!({"api_key": "sk-secret", "result": "ok"});
        write_trace(dir.path(), &trace, &outputs).unwrap();

        let mut entries = fs::read_dir(dir.path()).unwrap();
        let entry = entries.next().unwrap().unwrap();
        let contents = fs::read_to_string(entry.path()).unwrap();
        assert!(contents.contains("REDACTED"));
        assert!(!contents.contains("sk-secret"));
    }
}

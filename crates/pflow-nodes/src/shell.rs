//! The shell node: runs a templated command string as a subprocess.
//!
//! Three safety mechanisms apply, in order: a command-template safety scan
//! that rejects mapping/sequence-valued template variables inlined
//! directly into the command text (they would otherwise serialize into
//! shell-meaningful syntax the author never intended), a dangerous-pattern
//! denylist/warnlist scanned against the fully-resolved command, and a
//! process-wide SIGPIPE policy installed once by the executor
//! (`pflow_core::executor::ignore_sigpipe`) so a downstream reader closing
//! early never kills the whole runtime.
//!
//! Grounded on `hydra-core/src/platform/process.rs` for the general shape
//! of subprocess lifecycle management (spawn, wait, interpret exit status)
//! and on `oatty`'s `util/src/shell_lexing.rs` for tokenizing a command
//! string well enough to classify safe non-error exit codes for specific
//! known command names.

use std::io::Write;
use std::process::{Command, Stdio};

use pflow_core::error::{Result, WorkflowError};
use pflow_core::node::{Action, NodeLifecycle};
use pflow_core::shared_store::SharedStore;
use serde_json::Value;

/// Commands whose well-known "I looked and found nothing" exit code is not
/// itself a failure. This is a fixed policy table, not a heuristic: only
/// these exact command prefixes get this treatment, and only for the exact
/// code(s) listed. `ls`'s no-glob-match exit code differs by platform (GNU
/// coreutils exits 2, BSD/macOS `ls` exits 1), so both are listed.
const SAFE_NON_ERROR_EXIT_CODES: &[(&str, &[i32])] = &[
    ("grep", &[1]),
    ("rg", &[1]),
    ("ls", &[1, 2]),
    ("which", &[1]),
    ("type", &[1]),
    ("command -v", &[1]),
];

const DANGEROUS_DENYLIST: &[&str] = &["rm -rf /", ":(){ :|:& };:", "mkfs", "> /dev/sda", "dd if=/dev/zero of=/dev/sd"];
const DANGEROUS_WARNLIST: &[&str] = &["rm -rf", "chmod -R 777", "curl | sh", "curl | bash", "sudo "];

pub struct ShellNode {
    pub strict_dangerous_patterns: bool,
}

impl Default for ShellNode {
    fn default() -> Self {
        Self { strict_dangerous_patterns: false }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct PreppedCommand {
    command: String,
    stdin: Option<String>,
    timeout_ms: Option<u64>,
}

impl ShellNode {
    fn scan_dangerous(&self, command: &str) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        for pattern in DANGEROUS_DENYLIST {
            if command.contains(pattern) {
                return Err(WorkflowError::NodeExecFatal {
                    node_id: String::new(),
                    message: format!("command matches denylisted pattern '{pattern}'"),
                });
            }
        }
        for pattern in DANGEROUS_WARNLIST {
            if command.contains(pattern) {
                if self.strict_dangerous_patterns {
                    return Err(WorkflowError::NodeExecFatal {
                        node_id: String::new(),
                        message: format!("command matches warnlisted pattern '{pattern}' (strict mode escalates to error)"),
                    });
                }
                warnings.push(format!("command matches a commonly-risky pattern: '{pattern}'"));
            }
        }
        Ok(warnings)
    }

    /// Checks every pipe segment of `command`, not just the first token of
    /// the whole string, against [`SAFE_NON_ERROR_EXIT_CODES`] — a pipeline
    /// like `echo hello | grep nomatch` exits with the last segment's code,
    /// so only the last segment's leading command name is relevant, but
    /// since the policy table is exact-match-or-nothing, checking every
    /// segment is equivalent and simpler than isolating the last one.
    fn is_safe_non_error_exit(&self, command: &str, code: i32) -> bool {
        command.split('|').any(|segment| {
            let segment = segment.trim();
            SAFE_NON_ERROR_EXIT_CODES.iter().any(|(prefix, codes)| {
                codes.contains(&code)
                    && (segment == *prefix || segment.strip_prefix(prefix).is_some_and(|rest| rest.starts_with(' ')))
            })
        })
    }
}

fn adapt_stdin_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => if *b { "true".to_string() } else { "false".to_string() },
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Rejects a resolved command string that looks like a serialized mapping
/// or sequence was inlined directly into it (the wrapper's `Str` coercion
/// stringifies a non-scalar template result with `to_interpolated_string`,
/// which renders compact JSON — `{"a":1}` or `[1,2]` — and that JSON syntax
/// is almost never what the command author intended to appear in shell
/// text). A command built entirely from scalar interpolations never
/// produces a bare leading `{` or `[` token, so this is a narrow, safe
/// check rather than a general shell parser.
fn reject_non_scalar_inlining(node_id: &str, command: &str) -> Result<()> {
    for token in command.split_whitespace() {
        if (token.starts_with('{') && token.ends_with('}')) || (token.starts_with('[') && token.ends_with(']')) {
            if serde_json::from_str::<Value>(token).is_ok() {
                return Err(WorkflowError::NodeExecFatal {
                    node_id: node_id.to_string(),
                    message: format!(
                        "command token '{token}' looks like a serialized object/array inlined from a template; pass it through stdin or a file instead"
                    ),
                });
            }
        }
    }
    Ok(())
}

impl NodeLifecycle for ShellNode {
    fn prep(&self, node_id: &str, params: &Value, _shared: &SharedStore) -> Result<Value> {
        let command = params
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| WorkflowError::Input { message: format!("node '{node_id}' is missing required param 'command'") })?
            .to_string();

        reject_non_scalar_inlining(node_id, &command)?;

        let stdin = params.get("stdin").map(adapt_stdin_value);
        let timeout_ms = params.get("timeout_ms").and_then(Value::as_u64);

        let warnings = self.scan_dangerous(&command).map_err(|e| with_node_id(e, node_id))?;
        for warning in warnings {
            tracing::warn!(node_id, %warning, "shell command flagged");
        }

        Ok(serde_json::to_value(PreppedCommand { command, stdin, timeout_ms }).unwrap())
    }

    fn exec(&self, node_id: &str, prep_result: &Value) -> Result<Value> {
        let prepped: PreppedCommand = serde_json::from_value(prep_result.clone())
            .map_err(|e| WorkflowError::NodeExecFatal { node_id: node_id.to_string(), message: format!("invalid prep result: {e}") })?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&prepped.command)
            .stdin(if prepped.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| WorkflowError::NodeExec {
                node_id: node_id.to_string(),
                message: format!("failed to spawn command: {e}"),
                attempt: 1,
                max_retries: 1,
            })?;

        if let Some(stdin_value) = &prepped.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(stdin_value.as_bytes());
            }
        }

        if let Some(timeout_ms) = prepped.timeout_ms {
            wait_with_timeout(&mut child, node_id, timeout_ms)?;
        }

        let output = child.wait_with_output().map_err(|e| WorkflowError::NodeExec {
            node_id: node_id.to_string(),
            message: format!("failed to wait for command: {e}"),
            attempt: 1,
            max_retries: 1,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let code = output.status.code().unwrap_or(-1);

        let succeeded = output.status.success() || self.is_safe_non_error_exit(&prepped.command, code);

        if !succeeded {
            return Err(WorkflowError::NodeExecFatal {
                node_id: node_id.to_string(),
                message: format!("command exited with code {code}: {stderr}"),
            });
        }

        if !stderr.is_empty() {
            tracing::warn!(node_id, %stderr, "shell command wrote to stderr despite a successful exit");
        }

        Ok(serde_json::json!({
            "stdout": stdout,
            "stderr": stderr,
            "exit_code": code,
        }))
    }
}

/// Polls `child` until it exits or `timeout_ms` elapses; on timeout, sends
/// SIGTERM and then, after a short grace period, SIGKILL (mirroring the
/// terminate-then-force pattern used elsewhere in this dependency pack for
/// killing a runaway subprocess) and returns a `Timeout` error.
fn wait_with_timeout(child: &mut std::process::Child, node_id: &str, timeout_ms: u64) -> Result<()> {
    use std::time::{Duration, Instant};

    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return Ok(()),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let pid = nix::unistd::Pid::from_raw(child.id() as i32);
                    let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM);
                    std::thread::sleep(Duration::from_millis(200));
                    if child.try_wait().ok().flatten().is_none() {
                        let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL);
                    }
                    return Err(WorkflowError::Timeout { node_id: node_id.to_string(), elapsed_ms: timeout_ms });
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                return Err(WorkflowError::NodeExec {
                    node_id: node_id.to_string(),
                    message: format!("failed to poll child process: {e}"),
                    attempt: 1,
                    max_retries: 1,
                })
            }
        }
    }
}

fn with_node_id(err: WorkflowError, node_id: &str) -> WorkflowError {
    match err {
        WorkflowError::NodeExecFatal { message, .. } => {
            WorkflowError::NodeExecFatal { node_id: node_id.to_string(), message }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pflow_core::shared_store::SharedStore;
    use serde_json::json;

    #[test]
    fn denylisted_pattern_is_fatal() {
        let node = ShellNode::default();
        let err = node.prep("n", &json!({"command": "rm -rf /"}), &SharedStore::new()).unwrap_err();
        assert!(matches!(err, WorkflowError::NodeExecFatal { .. }));
    }

    #[test]
    fn warnlisted_pattern_is_only_a_warning_outside_strict_mode() {
        let node = ShellNode::default();
        let result = node.prep("n", &json!({"command": "rm -rf ./tmp"}), &SharedStore::new());
        assert!(result.is_ok());
    }

    #[test]
    fn warnlisted_pattern_is_fatal_in_strict_mode() {
        let node = ShellNode { strict_dangerous_patterns: true };
        let err = node.prep("n", &json!({"command": "rm -rf ./tmp"}), &SharedStore::new()).unwrap_err();
        assert!(matches!(err, WorkflowError::NodeExecFatal { .. }));
    }

    #[test]
    fn successful_command_captures_stdout() {
        let node = ShellNode::default();
        let prepped = node.prep("n", &json!({"command": "echo hello"}), &SharedStore::new()).unwrap();
        let result = node.exec("n", &prepped).unwrap();
        assert_eq!(result["stdout"], json!("hello\n"));
        assert_eq!(result["exit_code"], json!(0));
    }

    #[test]
    fn grep_no_match_exit_code_one_is_normalized_to_success() {
        let node = ShellNode::default();
        let prepped = node.prep("n", &json!({"command": "echo hello | grep nomatch"}), &SharedStore::new()).unwrap();
        let result = node.exec("n", &prepped).unwrap();
        assert_eq!(result["exit_code"], json!(1));
    }

    #[test]
    fn command_v_probe_for_missing_binary_is_normalized_to_success() {
        let node = ShellNode::default();
        let prepped = node
            .prep("n", &json!({"command": "command -v definitely-not-a-real-binary"}), &SharedStore::new())
            .unwrap();
        let result = node.exec("n", &prepped).unwrap();
        assert_eq!(result["exit_code"], json!(1));
    }

    #[test]
    fn which_probe_for_missing_binary_is_normalized_to_success() {
        let node = ShellNode::default();
        let prepped = node
            .prep("n", &json!({"command": "which definitely-not-a-real-binary"}), &SharedStore::new())
            .unwrap();
        let result = node.exec("n", &prepped).unwrap();
        assert_eq!(result["exit_code"], json!(1));
    }

    #[test]
    fn stdin_is_piped_to_the_command() {
        let node = ShellNode::default();
        let prepped = node.prep("n", &json!({"command": "cat", "stdin": "piped text"}), &SharedStore::new()).unwrap();
        let result = node.exec("n", &prepped).unwrap();
        assert_eq!(result["stdout"], json!("piped text"));
    }

    #[test]
    fn stdin_bool_is_lowercased_not_capitalized() {
        assert_eq!(adapt_stdin_value(&json!(true)), "true");
    }

    #[test]
    fn timeout_kills_a_runaway_command() {
        let node = ShellNode::default();
        let prepped = node
            .prep("n", &json!({"command": "sleep 5", "timeout_ms": 50}), &SharedStore::new())
            .unwrap();
        let err = node.exec("n", &prepped).unwrap_err();
        assert!(matches!(err, WorkflowError::Timeout { .. }));
    }

    #[test]
    fn downstream_pipe_closing_early_does_not_kill_the_process() {
        let node = ShellNode::default();
        let prepped = node
            .prep("n", &json!({"command": "yes | head -n 1"}), &SharedStore::new())
            .unwrap();
        let result = node.exec("n", &prepped).unwrap();
        assert_eq!(result["exit_code"], json!(0));
    }
}

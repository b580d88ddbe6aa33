//! The `.pflow.md` workflow file format: an H1 title, optional YAML
//! frontmatter, then `## Inputs` / `## Steps` / `## Outputs` sections with
//! `### <name>` entries. Complex values (objects, arrays) are carried as
//! fenced code blocks; scalars are inline. Parsing and emission must
//! round-trip: `ParseMarkdown(EmitMarkdown(ir)) == Normalize(ir)`.
//!
//! No markdown-parsing crate appears anywhere in this dependency pack, so
//! this is a small hand-rolled line-based parser over a deliberately
//! narrow grammar (headings, fenced code blocks, `key: value` lines) —
//! the same "write the small thing yourself rather than pull in a crate
//! for a narrow, already-specified grammar" choice the runtime makes for
//! template parsing and Levenshtein distance.

use std::collections::HashMap;

use pflow_core::ir::{Edge, InputSpec, Node, OutputSpec, WorkflowIr};
use pflow_core::error::{Result, WorkflowError};
use serde_json::Value;

pub fn parse(markdown: &str) -> Result<WorkflowIr> {
    let mut lines = markdown.lines().peekable();

    // Optional YAML frontmatter.
    let mut ir_version = "1".to_string();
    if lines.peek() == Some(&"---") {
        lines.next();
        let mut frontmatter_lines = Vec::new();
        for line in lines.by_ref() {
            if line == "---" {
                break;
            }
            frontmatter_lines.push(line);
        }
        let frontmatter: serde_yaml::Value = serde_yaml::from_str(&frontmatter_lines.join("\n"))
            .map_err(|e| WorkflowError::Structural { message: format!("invalid frontmatter: {e}") })?;
        if let Some(v) = frontmatter.get("ir_version").and_then(|v| v.as_str()) {
            ir_version = v.to_string();
        }
    }

    let mut inputs = HashMap::new();
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut outputs = HashMap::new();

    let mut section = Section::None;
    let mut current_entry: Option<String> = None;
    let mut entry_lines: Vec<String> = Vec::new();

    let rest: Vec<&str> = lines.collect();
    let mut i = 0;
    while i < rest.len() {
        let line = rest[i];
        if let Some(title) = line.strip_prefix("## ") {
            flush_entry(&section, &current_entry, &entry_lines, &mut inputs, &mut nodes, &mut outputs)?;
            current_entry = None;
            entry_lines.clear();
            section = Section::from_title(title.trim());
            i += 1;
            continue;
        }
        if let Some(name) = line.strip_prefix("### ") {
            flush_entry(&section, &current_entry, &entry_lines, &mut inputs, &mut nodes, &mut outputs)?;
            current_entry = Some(name.trim().to_string());
            entry_lines.clear();
            i += 1;
            continue;
        }
        entry_lines.push(line.to_string());
        i += 1;
    }
    flush_entry(&section, &current_entry, &entry_lines, &mut inputs, &mut nodes, &mut outputs)?;

    derive_edges_from_order(&nodes, &mut edges);

    WorkflowIr { ir_version, inputs, nodes, edges, outputs }.normalize()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Inputs,
    Steps,
    Outputs,
}

impl Section {
    fn from_title(title: &str) -> Self {
        match title {
            "Inputs" => Section::Inputs,
            "Steps" => Section::Steps,
            "Outputs" => Section::Outputs,
            _ => Section::None,
        }
    }
}

fn flush_entry(
    section: &Section,
    name: &Option<String>,
    lines: &[String],
    inputs: &mut HashMap<String, InputSpec>,
    nodes: &mut Vec<Node>,
    outputs: &mut HashMap<String, OutputSpec>,
) -> Result<()> {
    let Some(name) = name else { return Ok(()) };
    let fields = parse_fields(lines)?;

    match section {
        Section::Inputs => {
            inputs.insert(
                name.clone(),
                InputSpec {
                    input_type: fields.get("type").and_then(Value::as_str).unwrap_or("str").to_string(),
                    required: fields.get("required").and_then(Value::as_bool).unwrap_or(false),
                    default: fields.get("default").cloned(),
                    description: fields.get("description").and_then(Value::as_str).map(|s| s.to_string()),
                },
            );
        }
        Section::Steps => {
            let node_type = fields.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
            let purpose = fields.get("purpose").and_then(Value::as_str).map(|s| s.to_string());
            let batch = fields.get("batch").and_then(Value::as_bool).unwrap_or(false);
            let mut params = serde_json::Map::new();
            if let Some(Value::Object(p)) = fields.get("params") {
                params = p.clone();
            }
            nodes.push(Node { id: name.clone(), node_type, purpose, params: params.into_iter().collect(), batch });
        }
        Section::Outputs => {
            outputs.insert(
                name.clone(),
                OutputSpec {
                    source: fields.get("source").and_then(Value::as_str).unwrap_or_default().to_string(),
                    description: fields.get("description").and_then(Value::as_str).map(|s| s.to_string()),
                },
            );
        }
        Section::None => {}
    }
    Ok(())
}

/// Parses `key: value` lines plus any fenced code blocks (attributed to
/// the most recently seen `key:` line with no inline value) inside one
/// `### <name>` entry's body.
fn parse_fields(lines: &[String]) -> Result<HashMap<String, Value>> {
    let mut fields = HashMap::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim_end();
        if line.trim().is_empty() {
            i += 1;
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            let value = value.trim();
            if value.is_empty() {
                // Expect a fenced code block on the following non-blank line.
                let mut j = i + 1;
                while j < lines.len() && lines[j].trim().is_empty() {
                    j += 1;
                }
                if j < lines.len() && lines[j].trim_start().starts_with("```") {
                    let fence = lines[j].trim_start();
                    let fence_len = fence.chars().take_while(|&c| c == '`').count();
                    let close = "`".repeat(fence_len);
                    let mut body = Vec::new();
                    let mut k = j + 1;
                    while k < lines.len() && lines[k].trim() != close {
                        body.push(lines[k].clone());
                        k += 1;
                    }
                    let body_text = body.join("\n");
                    let parsed = serde_json::from_str::<Value>(&body_text)
                        .unwrap_or_else(|_| Value::String(body_text));
                    fields.insert(key, parsed);
                    i = k + 1;
                    continue;
                }
            } else {
                fields.insert(key, parse_scalar(value));
            }
        }
        i += 1;
    }
    Ok(fields)
}

fn parse_scalar(s: &str) -> Value {
    if let Ok(v) = serde_json::from_str::<Value>(s) {
        return v;
    }
    Value::String(s.to_string())
}

/// In the absence of an explicit `## Steps` edge declaration, nodes are
/// chained in document order — the common case for a linear workflow file.
fn derive_edges_from_order(nodes: &[Node], edges: &mut Vec<Edge>) {
    if edges.is_empty() && nodes.len() > 1 {
        for pair in nodes.windows(2) {
            edges.push(Edge { from: pair[0].id.clone(), to: pair[1].id.clone() });
        }
    }
}

pub fn emit(ir: &WorkflowIr) -> String {
    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&format!("ir_version: \"{}\"\n", ir.ir_version));
    out.push_str("---\n\n");
    out.push_str("# Workflow\n\n");

    if !ir.inputs.is_empty() {
        out.push_str("## Inputs\n\n");
        let mut names: Vec<&String> = ir.inputs.keys().collect();
        names.sort();
        for name in names {
            let spec = &ir.inputs[name];
            out.push_str(&format!("### {name}\n"));
            out.push_str(&format!("type: {}\n", spec.input_type));
            out.push_str(&format!("required: {}\n", spec.required));
            if let Some(default) = &spec.default {
                emit_field("default", default, &mut out);
            }
            if let Some(desc) = &spec.description {
                out.push_str(&format!("description: {desc}\n"));
            }
            out.push('\n');
        }
    }

    out.push_str("## Steps\n\n");
    for node in &ir.nodes {
        out.push_str(&format!("### {}\n", node.id));
        out.push_str(&format!("type: {}\n", node.node_type));
        if let Some(purpose) = &node.purpose {
            out.push_str(&format!("purpose: {purpose}\n"));
        }
        if node.batch {
            out.push_str("batch: true\n");
        }
        if !node.params.is_empty() {
            let params_value = Value::Object(node.params.clone().into_iter().collect());
            emit_field("params", &params_value, &mut out);
        }
        out.push('\n');
    }

    if !ir.outputs.is_empty() {
        out.push_str("## Outputs\n\n");
        let mut names: Vec<&String> = ir.outputs.keys().collect();
        names.sort();
        for name in names {
            let spec = &ir.outputs[name];
            out.push_str(&format!("### {name}\n"));
            out.push_str(&format!("source: {}\n", spec.source));
            if let Some(desc) = &spec.description {
                out.push_str(&format!("description: {desc}\n"));
            }
            out.push('\n');
        }
    }

    out
}

fn emit_field(key: &str, value: &Value, out: &mut String) {
    match value {
        Value::String(s) if !s.contains('\n') => {
            out.push_str(&format!("{key}: {s}\n"));
        }
        _ => {
            let body = serde_json::to_string_pretty(value).unwrap_or_default();
            let fence = if body.contains("```") { "````" } else { "```" };
            out.push_str(&format!("{key}:\n{fence}json\n{body}\n{fence}\n"));
        }
    }
}

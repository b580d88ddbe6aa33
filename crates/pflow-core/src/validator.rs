//! Four-layer IR validation: structural, data-flow, template, node-type.
//! Each layer runs in sequence and the validator never executes a node —
//! it only ever calls [`crate::template::extract_variables`] and registry
//! metadata lookups.
//!
//! The sequential-checks-returning-first-fatal-error shape is grounded on
//! the teacher's `WorkflowValidator::validate()` (`workflow/validator.rs`),
//! which calls `validate_connections`/`validate_dag`/
//! `validate_complex_cycles` in turn. That validator keys everything on
//! `TypeId` and a hand-rolled DFS cycle detector; this one keys on string
//! node ids and uses Kahn's algorithm (§ data-flow validation requires a
//! stable topological order, not just cycle detection, so Kahn's algorithm
//! does both jobs at once).

use std::collections::{HashMap, HashSet, VecDeque};

use crate::coercion::ParamType;
use crate::error::{Result, SuggestedFix, WorkflowError};
use crate::ir::WorkflowIr;
use crate::registry::NodeRegistry;
use crate::template::extract_variables;
use crate::wrapper::levenshtein;

#[derive(Debug, Clone)]
pub struct Warning {
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub warnings: Vec<Warning>,
}

/// Runs all four layers and, on success, returns the topological order
/// computed by the data-flow layer (the executor's plan).
pub fn validate(ir: &WorkflowIr, registry: &NodeRegistry) -> Result<(Vec<String>, ValidationReport)> {
    validate_structural(ir)?;
    let order = validate_dataflow(ir)?;
    let mut report = ValidationReport::default();
    validate_templates(ir, &mut report)?;
    validate_node_types(ir, registry, &mut report)?;
    Ok((order, report))
}

fn validate_structural(ir: &WorkflowIr) -> Result<()> {
    if ir.nodes.is_empty() {
        return Err(WorkflowError::Structural { message: "workflow has no nodes".to_string() });
    }

    let mut seen_ids = HashSet::new();
    for node in &ir.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(WorkflowError::Structural {
                message: format!("duplicate node id '{}'", node.id),
            });
        }
    }

    for edge in &ir.edges {
        if ir.node_by_id(&edge.from).is_none() {
            return Err(WorkflowError::Structural {
                message: format!("edge references unknown source node '{}'", edge.from),
            });
        }
        if ir.node_by_id(&edge.to).is_none() {
            return Err(WorkflowError::Structural {
                message: format!("edge references unknown target node '{}'", edge.to),
            });
        }
    }

    Ok(())
}

/// Kahn's algorithm with document-order tie-breaking: among nodes whose
/// in-degree has just reached zero, the one appearing earliest in
/// `ir.nodes` is scheduled first. This makes the topological order
/// deterministic across repeated validations of the same IR, which the
/// executor depends on for reproducible traces.
fn validate_dataflow(ir: &WorkflowIr) -> Result<Vec<String>> {
    let order_index: HashMap<&str, usize> =
        ir.nodes.iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();

    let mut in_degree: HashMap<&str, usize> = ir.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    let mut adjacency: HashMap<&str, Vec<&str>> = ir.nodes.iter().map(|n| (n.id.as_str(), Vec::new())).collect();

    for edge in &ir.edges {
        adjacency.get_mut(edge.from.as_str()).unwrap().push(edge.to.as_str());
        *in_degree.get_mut(edge.to.as_str()).unwrap() += 1;
    }

    let mut ready: VecDeque<&str> = ir
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut order = Vec::with_capacity(ir.nodes.len());

    while let Some(next_id) = pop_lowest_document_order(&mut ready, &order_index) {
        order.push(next_id.to_string());
        for &neighbor in &adjacency[next_id] {
            let degree = in_degree.get_mut(neighbor).unwrap();
            *degree -= 1;
            if *degree == 0 {
                ready.push_back(neighbor);
            }
        }
    }

    if order.len() != ir.nodes.len() {
        let unresolved: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, deg)| *deg > 0)
            .map(|(id, _)| id.to_string())
            .collect();
        return Err(WorkflowError::Dataflow {
            message: format!("cycle detected among nodes: {}", unresolved.join(", ")),
        });
    }

    let reachable: HashSet<&str> = order.iter().map(|s| s.as_str()).collect();
    let unreachable: Vec<&str> = ir.nodes.iter().map(|n| n.id.as_str()).filter(|id| !reachable.contains(id)).collect();
    if !unreachable.is_empty() {
        return Err(WorkflowError::Dataflow {
            message: format!("unreachable nodes: {}", unreachable.join(", ")),
        });
    }

    Ok(order)
}

fn pop_lowest_document_order<'a>(ready: &mut VecDeque<&'a str>, order_index: &HashMap<&str, usize>) -> Option<&'a str> {
    if ready.is_empty() {
        return None;
    }
    let (idx, _) = ready.iter().enumerate().min_by_key(|(_, id)| order_index[*id])?;
    ready.remove(idx)
}

fn validate_templates(ir: &WorkflowIr, report: &mut ValidationReport) -> Result<()> {
    let known_node_ids: HashSet<&str> = ir.nodes.iter().map(|n| n.id.as_str()).collect();
    let known_inputs: HashSet<&str> = ir.inputs.keys().map(|s| s.as_str()).collect();

    for node in &ir.nodes {
        for value in node.params.values() {
            check_template_value(value, &known_node_ids, &known_inputs, &node.id, report)?;
        }
    }
    Ok(())
}

fn check_template_value(
    value: &serde_json::Value,
    known_node_ids: &HashSet<&str>,
    known_inputs: &HashSet<&str>,
    node_id: &str,
    report: &mut ValidationReport,
) -> Result<()> {
    match value {
        serde_json::Value::String(s) => {
            for var in extract_variables(s) {
                let root = var.split('.').next().unwrap_or(&var);
                if !known_inputs.contains(root) && !known_node_ids.contains(root) {
                    return Err(WorkflowError::Template {
                        node_id: node_id.to_string(),
                        message: format!("'${{{var}}}' references unknown identifier '{root}' (not a declared input or node id)"),
                        original_template: Some(s.clone()),
                        suggestions: suggest_similar_identifiers(root, known_inputs, known_node_ids),
                    });
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                check_template_value(item, known_node_ids, known_inputs, node_id, report)?;
            }
        }
        serde_json::Value::Object(map) => {
            for v in map.values() {
                check_template_value(v, known_node_ids, known_inputs, node_id, report)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Ranks every declared input and node id by Levenshtein distance against
/// `root`, surfacing up to three close matches as typo-tolerant fixes (e.g.
/// `${mynode.stdout}` -> "did you mean `${my-node.stdout}`?").
fn suggest_similar_identifiers(
    root: &str,
    known_inputs: &HashSet<&str>,
    known_node_ids: &HashSet<&str>,
) -> Vec<SuggestedFix> {
    let mut candidates: Vec<(usize, &str)> = known_inputs
        .iter()
        .chain(known_node_ids.iter())
        .map(|id| (levenshtein(root, id), *id))
        .collect();
    candidates.sort_by_key(|(dist, _)| *dist);
    candidates
        .into_iter()
        .filter(|(dist, _)| *dist <= 3)
        .take(3)
        .map(|(_, id)| SuggestedFix::new(format!("did you mean '${{{id}}}'?")))
        .collect()
}

fn validate_node_types(ir: &WorkflowIr, registry: &NodeRegistry, report: &mut ValidationReport) -> Result<()> {
    for node in &ir.nodes {
        let entry = registry.entry(&node.node_type).ok_or_else(|| WorkflowError::Structural {
            message: format!("node '{}' has unknown type '{}'", node.id, node.node_type),
        })?;

        for (param_name, declared_type) in &entry.params {
            let Some(value) = node.params.get(param_name) else {
                report.warnings.push(Warning {
                    message: format!("node '{}' is missing declared param '{}'", node.id, param_name),
                });
                continue;
            };
            if let Some(param_type) = ParamType::parse(declared_type) {
                // A literal (non-template) value is validated eagerly here;
                // template-carrying values are validated after resolution
                // by the node wrapper, since their runtime type is not yet
                // known.
                let as_str = value.as_str();
                let is_template = as_str.map(crate::template::has_templates).unwrap_or(false);
                if !is_template {
                    crate::coercion::coerce(&node.id, param_name, value.clone(), param_type, false, None)?;
                }
            }
        }
    }
    Ok(())
}

//! Workflow step and workflow definitions (spec.md §3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub name: String,
    pub description: String,
    pub order: u32,
    pub required: bool,
    pub actions: Vec<String>,
    pub expected_outputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    pub version: String,
    pub steps: Vec<WorkflowStep>,
}

/// Outcome of one `executeNextStep` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step: String,
    pub success: bool,
    pub outputs: std::collections::HashMap<String, serde_json::Value>,
    pub evidence: Vec<EvidenceItem>,
    pub next_actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

/// Result handed back by a per-step handler before the engine validates
/// and records it.
#[derive(Debug, Clone, Default)]
pub struct HandlerOutcome {
    pub outputs: std::collections::HashMap<String, serde_json::Value>,
    pub evidence: Vec<EvidenceItem>,
}

/// Validate the invariants spec.md §3/§4.4 place on a [`Workflow`] at
/// construction time. Returns the joined list of violated invariants
/// (empty when valid).
pub fn validate_workflow(workflow: &Workflow) -> Vec<String> {
    let mut errors = Vec::new();

    if workflow.steps.is_empty() {
        errors.push("Workflow must have at least one step".to_string());
        return errors;
    }

    if !workflow.steps.iter().any(|s| s.required) {
        errors.push("Workflow must have at least one required step".to_string());
    }

    let mut names = std::collections::HashSet::new();
    for step in &workflow.steps {
        if !names.insert(step.name.as_str()) {
            errors.push("Workflow steps must have unique names".to_string());
            break;
        }
    }

    let mut orders: Vec<u32> = workflow.steps.iter().map(|s| s.order).collect();
    orders.sort_unstable();
    let expected: Vec<u32> = (1..=workflow.steps.len() as u32).collect();
    if orders != expected {
        errors.push("Workflow step orders must be the consecutive sequence 1..N".to_string());
    }

    for step in &workflow.steps {
        if step.description.trim().is_empty() {
            errors.push(format!("Step '{}' must have a non-empty description", step.name));
        }
        if step.actions.is_empty() {
            errors.push(format!("Step '{}' must have at least one action", step.name));
        }
        if step.expected_outputs.is_empty() {
            errors.push(format!(
                "Step '{}' must have at least one expected output",
                step.name
            ));
        }
    }

    errors
}

//! C4 — Workflow Engine: ordered, validated multi-step audit pipeline
//! with evidence accumulation and configurable skip/continue policies.

pub mod engine;
pub mod evidence;
pub mod step;

pub use engine::{EngineConfig, StepHandler, WorkflowEngine, WorkflowError, WorkflowExecutionState, WorkflowStatus};
pub use step::{EvidenceItem, HandlerOutcome, Severity, StepResult, Workflow, WorkflowStep};

/// The default eight-step audit workflow named in spec.md §4.4.
pub fn default_workflow() -> Workflow {
    let specs = [
        ("INIT", "Initialize audit context", true),
        ("REPRO", "Reproduce the reported behavior", true),
        ("STATIC", "Run static analysis", false),
        ("TESTS", "Run the test suite", true),
        ("DYNAMIC", "Run dynamic checks", false),
        ("CONFORM", "Check conformance to conventions", false),
        ("TRACE", "Trace evidence back to source", false),
        ("VERDICT", "Render final verdict", true),
    ];

    let steps = specs
        .into_iter()
        .enumerate()
        .map(|(i, (name, description, required))| WorkflowStep {
            name: name.to_string(),
            description: description.to_string(),
            order: (i + 1) as u32,
            required,
            actions: vec![format!("run_{}", name.to_lowercase())],
            expected_outputs: vec!["summary".to_string()],
        })
        .collect();

    Workflow {
        name: "default-audit-workflow".to_string(),
        version: "1".to_string(),
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_workflow_is_valid() {
        assert!(step::validate_workflow(&default_workflow()).is_empty());
    }
}

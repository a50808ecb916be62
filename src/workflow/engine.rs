//! Workflow execution engine (C4, spec.md §4.4).
//!
//! Grounded on the teacher's `verifier/pipeline.rs` gated-step-sequence
//! shape (validate at construction, run steps in order, accumulate a
//! report, fail-fast vs. continue policy) generalized from a fixed
//! cargo-check pipeline to an arbitrary named [`Workflow`] with
//! pluggable step handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::evidence::{next_actions, EvidenceLedger};
use super::step::{validate_workflow, HandlerOutcome, StepResult, Workflow, WorkflowStep};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Step(String),
    #[error("Workflow validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub enforce_order: bool,
    pub allow_skipping: bool,
    pub continue_on_failure: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enforce_order: true,
            allow_skipping: false,
            continue_on_failure: false,
        }
    }
}

/// A per-step-name handler. Implementations do the actual audit work
/// (static analysis, test runs, …); the engine only sequences and
/// validates their outputs.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn handle(&self, step: &WorkflowStep, inputs: Option<Value>) -> Result<HandlerOutcome, String>;
}

/// Serializable snapshot matching spec.md §3's `WorkflowExecutionState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecutionState {
    pub workflow: Workflow,
    pub current_step_index: usize,
    pub completed_steps: Vec<StepResult>,
    pub status: WorkflowStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub all_evidence: Vec<super::step::EvidenceItem>,
    pub errors: Vec<String>,
}

pub struct WorkflowEngine {
    workflow: Workflow,
    config: EngineConfig,
    handlers: HashMap<String, Arc<dyn StepHandler>>,
    current_step_index: usize,
    status: WorkflowStatus,
    completed_steps: Vec<StepResult>,
    start_time: Option<DateTime<Utc>>,
    evidence: EvidenceLedger,
    errors: Vec<String>,
}

impl WorkflowEngine {
    /// `createAuditWorkflowEngine`: validates the workflow up front and
    /// throws (returns `Err`) immediately on any violated invariant.
    pub fn new(
        workflow: Workflow,
        config: EngineConfig,
        handlers: HashMap<String, Arc<dyn StepHandler>>,
    ) -> Result<Self, WorkflowError> {
        let violations = validate_workflow(&workflow);
        if !violations.is_empty() {
            return Err(WorkflowError::Validation(violations.join("; ")));
        }
        Ok(Self {
            workflow,
            config,
            handlers,
            current_step_index: 0,
            status: WorkflowStatus::NotStarted,
            completed_steps: Vec::new(),
            start_time: None,
            evidence: EvidenceLedger::default(),
            errors: Vec::new(),
        })
    }

    pub fn start_execution(&mut self) -> Result<(), WorkflowError> {
        if self.status != WorkflowStatus::NotStarted {
            return Err(WorkflowError::Step(format!(
                "Cannot start workflow in status: {}",
                self.status
            )));
        }
        self.status = WorkflowStatus::InProgress;
        self.start_time = Some(Utc::now());
        Ok(())
    }

    pub fn skip_to_step(&mut self, name: &str) -> Result<(), WorkflowError> {
        if !self.config.allow_skipping {
            return Err(WorkflowError::Step(
                "Step skipping is not allowed in current configuration".to_string(),
            ));
        }
        let idx = self
            .workflow
            .steps
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| WorkflowError::Step(format!("Step '{name}' not found in workflow")))?;

        if self.config.enforce_order {
            let expected = self.workflow.steps.get(self.current_step_index).map(|s| s.name.as_str());
            if expected != Some(name) {
                return Err(WorkflowError::Step("Step order violation".to_string()));
            }
        }
        self.current_step_index = idx;
        Ok(())
    }

    /// `executeNextStep(inputs?) -> StepResult`.
    pub async fn execute_next_step(&mut self, inputs: Option<Value>) -> Result<StepResult, WorkflowError> {
        match self.status {
            WorkflowStatus::Completed => {
                return Err(WorkflowError::Step(
                    "All workflow steps have been completed".to_string(),
                ))
            }
            WorkflowStatus::Failed | WorkflowStatus::NotStarted => {
                return Err(WorkflowError::Step(format!(
                    "Cannot execute step in status: {}",
                    self.status
                )))
            }
            WorkflowStatus::InProgress => {}
        }

        if self.current_step_index >= self.workflow.steps.len() {
            self.status = WorkflowStatus::Completed;
            return Err(WorkflowError::Step(
                "All workflow steps have been completed".to_string(),
            ));
        }

        let step = self.workflow.steps[self.current_step_index].clone();
        let handler = self
            .handlers
            .get(&step.name)
            .cloned()
            .ok_or_else(|| WorkflowError::Step(format!("No handler registered for step '{}'", step.name)))?;

        let outcome = handler.handle(&step, inputs).await;

        let result = match outcome {
            Ok(handler_outcome) => self.finish_step(&step, handler_outcome, None)?,
            Err(handler_error) => self.finish_step(&step, HandlerOutcome::default(), Some(handler_error))?,
        };

        self.current_step_index += 1;
        self.completed_steps.push(result.clone());
        if self.current_step_index == self.workflow.steps.len() && self.status == WorkflowStatus::InProgress {
            self.status = WorkflowStatus::Completed;
        }
        Ok(result)
    }

    /// Validate outputs, accumulate evidence, and apply the
    /// fail-fast/continue policy for one step's outcome.
    fn finish_step(
        &mut self,
        step: &WorkflowStep,
        outcome: HandlerOutcome,
        handler_error: Option<String>,
    ) -> Result<StepResult, WorkflowError> {
        let mut step_errors = Vec::new();
        if let Some(err) = &handler_error {
            step_errors.push(err.clone());
        } else {
            for key in &step.expected_outputs {
                if !outcome.outputs.contains_key(key) {
                    step_errors.push(format!("Missing required output '{key}'"));
                }
            }
        }

        if !step_errors.is_empty() {
            self.errors.extend(step_errors.clone());
            if !self.config.continue_on_failure {
                self.status = WorkflowStatus::Failed;
                return Err(WorkflowError::Step(step_errors.join("; ")));
            }
            return Ok(StepResult {
                step: step.name.clone(),
                success: false,
                outputs: outcome.outputs,
                evidence: outcome.evidence,
                next_actions: vec!["Review step failure before proceeding".to_string()],
                errors: Some(step_errors),
            });
        }

        self.evidence.append(outcome.evidence.clone());
        let next_actions = next_actions(&outcome.evidence);
        Ok(StepResult {
            step: step.name.clone(),
            success: true,
            outputs: outcome.outputs,
            evidence: outcome.evidence,
            next_actions,
            errors: None,
        })
    }

    pub fn get_all_evidence(&self) -> &[super::step::EvidenceItem] {
        self.evidence.all()
    }

    pub fn get_evidence_by_severity(&self, severity: super::step::Severity) -> Vec<&super::step::EvidenceItem> {
        self.evidence.by_severity(severity)
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    pub fn state_snapshot(&self) -> WorkflowExecutionState {
        WorkflowExecutionState {
            workflow: self.workflow.clone(),
            current_step_index: self.current_step_index,
            completed_steps: self.completed_steps.clone(),
            status: self.status,
            start_time: self.start_time,
            all_evidence: self.evidence.all().to_vec(),
            errors: self.errors.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::step::Severity;

    fn workflow(steps: Vec<WorkflowStep>) -> Workflow {
        Workflow {
            name: "audit".to_string(),
            version: "1".to_string(),
            steps,
        }
    }

    fn step(name: &str, order: u32) -> WorkflowStep {
        WorkflowStep {
            name: name.to_string(),
            description: "d".to_string(),
            order,
            required: order == 1,
            actions: vec!["act".to_string()],
            expected_outputs: vec!["summary".to_string()],
        }
    }

    struct AlwaysOutputs;

    #[async_trait]
    impl StepHandler for AlwaysOutputs {
        async fn handle(&self, _step: &WorkflowStep, _inputs: Option<Value>) -> Result<HandlerOutcome, String> {
            let mut outputs = HashMap::new();
            outputs.insert("summary".to_string(), serde_json::json!("ok"));
            Ok(HandlerOutcome {
                outputs,
                evidence: vec![],
            })
        }
    }

    struct MissingOutput;

    #[async_trait]
    impl StepHandler for MissingOutput {
        async fn handle(&self, _step: &WorkflowStep, _inputs: Option<Value>) -> Result<HandlerOutcome, String> {
            Ok(HandlerOutcome::default())
        }
    }

    fn handlers_of(handler: Arc<dyn StepHandler>, names: &[&str]) -> HashMap<String, Arc<dyn StepHandler>> {
        names.iter().map(|n| (n.to_string(), handler.clone())).collect()
    }

    #[test]
    fn test_duplicate_step_names_fail_construction() {
        let wf = workflow(vec![step("INIT", 1), step("INIT", 2)]);
        let err = WorkflowEngine::new(wf, EngineConfig::default(), HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("Workflow steps must have unique names"));
    }

    #[tokio::test]
    async fn test_sequential_execution_runs_steps_in_order() {
        let wf = workflow(vec![step("INIT", 1), step("VERDICT", 2)]);
        let handlers = handlers_of(Arc::new(AlwaysOutputs), &["INIT", "VERDICT"]);
        let mut engine = WorkflowEngine::new(wf, EngineConfig::default(), handlers).unwrap();
        engine.start_execution().unwrap();

        let r1 = engine.execute_next_step(None).await.unwrap();
        assert_eq!(r1.step, "INIT");
        let r2 = engine.execute_next_step(None).await.unwrap();
        assert_eq!(r2.step, "VERDICT");
        assert_eq!(engine.status(), WorkflowStatus::Completed);
    }

    #[tokio::test]
    async fn test_execute_after_completion_fails() {
        let wf = workflow(vec![step("INIT", 1)]);
        let handlers = handlers_of(Arc::new(AlwaysOutputs), &["INIT"]);
        let mut engine = WorkflowEngine::new(wf, EngineConfig::default(), handlers).unwrap();
        engine.start_execution().unwrap();
        engine.execute_next_step(None).await.unwrap();

        let err = engine.execute_next_step(None).await.unwrap_err();
        assert!(err.to_string().contains("All workflow steps have been completed"));
    }

    #[tokio::test]
    async fn test_double_start_fails() {
        let wf = workflow(vec![step("INIT", 1)]);
        let mut engine = WorkflowEngine::new(wf, EngineConfig::default(), HashMap::new()).unwrap();
        engine.start_execution().unwrap();
        let err = engine.start_execution().unwrap_err();
        assert!(err.to_string().contains("Cannot start workflow in status"));
    }

    #[tokio::test]
    async fn test_missing_output_fails_fast_by_default() {
        let wf = workflow(vec![step("INIT", 1)]);
        let handlers = handlers_of(Arc::new(MissingOutput), &["INIT"]);
        let mut engine = WorkflowEngine::new(wf, EngineConfig::default(), handlers).unwrap();
        engine.start_execution().unwrap();
        let err = engine.execute_next_step(None).await.unwrap_err();
        assert!(err.to_string().contains("Missing required output 'summary'"));
        assert_eq!(engine.status(), WorkflowStatus::Failed);
    }

    #[tokio::test]
    async fn test_missing_output_continues_when_configured() {
        let wf = workflow(vec![step("INIT", 1), step("VERDICT", 2)]);
        let handlers = handlers_of(Arc::new(MissingOutput), &["INIT", "VERDICT"]);
        let mut engine = WorkflowEngine::new(
            wf,
            EngineConfig {
                continue_on_failure: true,
                ..Default::default()
            },
            handlers,
        )
        .unwrap();
        engine.start_execution().unwrap();
        let r1 = engine.execute_next_step(None).await.unwrap();
        assert!(!r1.success);
        let r2 = engine.execute_next_step(None).await.unwrap();
        assert!(!r2.success);
        assert_eq!(engine.status(), WorkflowStatus::Completed);
    }

    #[tokio::test]
    async fn test_skip_to_step_rejected_without_allow_skipping() {
        let wf = workflow(vec![step("INIT", 1), step("VERDICT", 2)]);
        let mut engine = WorkflowEngine::new(wf, EngineConfig::default(), HashMap::new()).unwrap();
        engine.start_execution().unwrap();
        let err = engine.skip_to_step("VERDICT").unwrap_err();
        assert!(err.to_string().contains("Step skipping is not allowed"));
    }

    #[tokio::test]
    async fn test_skip_to_unknown_step_name() {
        let wf = workflow(vec![step("INIT", 1), step("VERDICT", 2)]);
        let mut engine = WorkflowEngine::new(
            wf,
            EngineConfig {
                allow_skipping: true,
                enforce_order: false,
                ..Default::default()
            },
            HashMap::new(),
        )
        .unwrap();
        engine.start_execution().unwrap();
        let err = engine.skip_to_step("NOPE").unwrap_err();
        assert!(err.to_string().contains("Step 'NOPE' not found in workflow"));
    }

    #[tokio::test]
    async fn test_skip_to_step_order_violation() {
        let wf = workflow(vec![step("INIT", 1), step("VERDICT", 2)]);
        let mut engine = WorkflowEngine::new(
            wf,
            EngineConfig {
                allow_skipping: true,
                enforce_order: true,
                ..Default::default()
            },
            HashMap::new(),
        )
        .unwrap();
        engine.start_execution().unwrap();
        let err = engine.skip_to_step("VERDICT").unwrap_err();
        assert!(err.to_string().contains("Step order violation"));
    }

    #[test]
    fn test_evidence_by_severity_is_queryable() {
        let wf = workflow(vec![step("INIT", 1)]);
        let engine = WorkflowEngine::new(wf, EngineConfig::default(), HashMap::new()).unwrap();
        assert!(engine.get_evidence_by_severity(Severity::Critical).is_empty());
    }

    struct EvidenceProducer;

    #[async_trait]
    impl StepHandler for EvidenceProducer {
        async fn handle(&self, _step: &WorkflowStep, _inputs: Option<Value>) -> Result<HandlerOutcome, String> {
            let mut outputs = HashMap::new();
            outputs.insert("summary".to_string(), serde_json::json!("ok"));
            Ok(HandlerOutcome {
                outputs,
                evidence: vec![super::super::step::EvidenceItem {
                    kind: "finding".to_string(),
                    severity: Severity::Major,
                    description: "found something".to_string(),
                    location: None,
                }],
            })
        }
    }

    #[tokio::test]
    async fn test_state_snapshot_carries_accumulated_evidence() {
        let wf = workflow(vec![step("INIT", 1)]);
        let handlers = handlers_of(Arc::new(EvidenceProducer), &["INIT"]);
        let mut engine = WorkflowEngine::new(wf, EngineConfig::default(), handlers).unwrap();
        engine.start_execution().unwrap();
        engine.execute_next_step(None).await.unwrap();

        assert_eq!(engine.get_all_evidence().len(), 1);
        let snapshot = engine.state_snapshot();
        assert_eq!(snapshot.all_evidence.len(), 1);
        assert_eq!(snapshot.all_evidence[0].description, "found something");
    }
}

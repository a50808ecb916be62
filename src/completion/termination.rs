//! Termination report (spec.md §4.5 `shouldTerminate`).

use serde::{Deserialize, Serialize};

use crate::model::{HistoryEntry, Verdict};

use super::criteria::CompletionCriteria;
use super::evaluate_completion;
use super::stagnation::StagnationResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminationReport {
    pub should_terminate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_assessment: Option<String>,
    pub failure_rate: f64,
    pub critical_issues: Vec<String>,
}

pub fn should_terminate(
    history: &[HistoryEntry],
    current_loop: u32,
    criteria: &CompletionCriteria,
    stagnation: Option<&StagnationResult>,
) -> TerminationReport {
    let last_score = history.last().map(|h| h.review.overall).unwrap_or(0.0);
    let decision = evaluate_completion(last_score, current_loop, stagnation, criteria);

    let hard_stopped = current_loop >= criteria.hard_stop.max_loops;
    let stagnated = stagnation
        .map(|s| s.is_stagnant && current_loop >= criteria.stagnation_check.start_loop)
        .unwrap_or(false);
    let should_terminate = hard_stopped || stagnated;

    let failure_rate = if history.is_empty() {
        0.0
    } else {
        let rejects = history.iter().filter(|h| h.review.verdict == Verdict::Reject).count();
        (rejects as f64 / history.len() as f64) * 100.0
    };

    let critical_issues = history
        .last()
        .map(|entry| {
            let mut issues: Vec<String> = entry
                .review
                .review
                .inline
                .iter()
                .filter(|c| c.comment.contains("Critical") || c.comment.contains("Security"))
                .map(|c| c.comment.clone())
                .collect();
            if entry.review.verdict == Verdict::Reject {
                issues.push(entry.review.review.summary.clone());
            }
            issues
        })
        .unwrap_or_default();

    let final_assessment = if should_terminate {
        let verdict = history
            .last()
            .map(|h| format!("{:?}", h.review.verdict))
            .unwrap_or_else(|| "unknown".to_string());
        Some(format!(
            "Terminated after {current_loop} loop(s) with final score {last_score:.0}, verdict {verdict}, failure rate {failure_rate:.0}%. {}",
            recommendation_for(hard_stopped, stagnated)
        ))
    } else {
        None
    };

    TerminationReport {
        should_terminate,
        reason: if should_terminate { decision.reason } else { None },
        final_assessment,
        failure_rate,
        critical_issues,
    }
}

fn recommendation_for(hard_stopped: bool, stagnated: bool) -> &'static str {
    if stagnated {
        "Recommend a fresh approach rather than further iteration."
    } else if hard_stopped {
        "Recommend manual review; automated loop budget exhausted."
    } else {
        "Recommend proceeding to merge."
    }
}

//! C5 — Completion Evaluator: tiered thresholds, stagnation detection,
//! hard stop, and termination reporting.
//!
//! Grounded on the teacher's `escalation/engine.rs` decision-dispatch
//! shape (an ordered chain of "does this condition fire?" checks ending
//! in a default) and `escalation/state.rs`'s sliding iteration window,
//! reused here for plain score/loop tier thresholds rather than
//! `SwarmTier` model-routing (see DESIGN.md).

pub mod criteria;
pub mod stagnation;
pub mod termination;

pub use criteria::{validate_completion_criteria, CompletionCriteria, HardStop, StagnationCheck, Tier};
pub use stagnation::{detect_stagnation, similarity, StagnationResult};
pub use termination::{should_terminate, TerminationReport};

use serde::{Deserialize, Serialize};

pub const REASON_STAGNATION: &str = "stagnation_detected";
pub const REASON_HARD_STOP: &str = "max_loops_reached";
pub const REASON_TIER1: &str = "score_95_at_10";
pub const REASON_TIER2: &str = "score_90_at_15";
pub const REASON_TIER3: &str = "score_85_at_20";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionDecision {
    pub is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub next_thought_needed: bool,
    pub message: String,
}

/// `evaluateCompletion(score, loop, stagnation?)` (spec.md §4.5).
/// Priority, highest first: stagnation, hard stop, tier1, tier2, tier3,
/// otherwise in-progress.
pub fn evaluate_completion(
    score: f64,
    current_loop: u32,
    stagnation: Option<&StagnationResult>,
    criteria: &CompletionCriteria,
) -> CompletionDecision {
    if let Some(stagnation) = stagnation {
        if stagnation.is_stagnant && current_loop >= criteria.stagnation_check.start_loop {
            return CompletionDecision {
                is_complete: true,
                reason: Some(REASON_STAGNATION.to_string()),
                next_thought_needed: false,
                message: "Stagnation detected: recent iterations show no meaningful progress".to_string(),
            };
        }
    }

    if current_loop >= criteria.hard_stop.max_loops {
        return CompletionDecision {
            is_complete: true,
            reason: Some(REASON_HARD_STOP.to_string()),
            next_thought_needed: false,
            message: format!("Hard stop reached at loop {current_loop}"),
        };
    }

    for (tier, reason) in [
        (criteria.tier1, REASON_TIER1),
        (criteria.tier2, REASON_TIER2),
        (criteria.tier3, REASON_TIER3),
    ] {
        if score >= tier.score && current_loop >= tier.max_loops {
            return CompletionDecision {
                is_complete: true,
                reason: Some(reason.to_string()),
                next_thought_needed: false,
                message: format!("score {score:.0}% meets threshold, minimum loops reached"),
            };
        }
    }

    let target = current_target_tier(current_loop, criteria);
    let message = if score >= target.score {
        format!(
            "score {score:.0}% meets threshold, minimum loops not reached ({current_loop}/{} loops)",
            target.max_loops
        )
    } else {
        let remaining = target.max_loops.saturating_sub(current_loop);
        format!(
            "score {score:.0}% needs {:.0}% improvement to reach {:.0}% threshold ({remaining} loops remaining)",
            (target.score - score).max(0.0),
            target.score
        )
    };

    CompletionDecision {
        is_complete: false,
        reason: None,
        next_thought_needed: true,
        message,
    }
}

/// `getCompletionStatus`'s notion of the tier currently in force: T1
/// while `loop < tier2.maxLoops`, then T2 while `loop < tier3.maxLoops`,
/// else T3.
pub fn current_target_tier(current_loop: u32, criteria: &CompletionCriteria) -> Tier {
    if current_loop < criteria.tier2.max_loops {
        criteria.tier1
    } else if current_loop < criteria.tier3.max_loops {
        criteria.tier2
    } else {
        criteria.tier3
    }
}

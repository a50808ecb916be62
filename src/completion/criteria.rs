//! Completion thresholds and their validation (spec.md §3, §4.5).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub score: f64,
    pub max_loops: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardStop {
    pub max_loops: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagnationCheck {
    pub start_loop: u32,
    pub similarity_threshold: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionCriteria {
    pub tier1: Tier,
    pub tier2: Tier,
    pub tier3: Tier,
    pub hard_stop: HardStop,
    pub stagnation_check: StagnationCheck,
}

impl Default for CompletionCriteria {
    fn default() -> Self {
        Self {
            tier1: Tier {
                score: 95.0,
                max_loops: 10,
            },
            tier2: Tier {
                score: 90.0,
                max_loops: 15,
            },
            tier3: Tier {
                score: 85.0,
                max_loops: 20,
            },
            hard_stop: HardStop { max_loops: 30 },
            stagnation_check: StagnationCheck {
                start_loop: 10,
                similarity_threshold: 0.95,
            },
        }
    }
}

/// `validateCompletionCriteria`: every message below is stable, tests
/// rely on exact wording (spec.md §4.5).
pub fn validate_completion_criteria(criteria: &CompletionCriteria) -> Vec<String> {
    let mut errors = Vec::new();

    for (label, tier) in [
        ("tier1", criteria.tier1),
        ("tier2", criteria.tier2),
        ("tier3", criteria.tier3),
    ] {
        if !(0.0..=100.0).contains(&tier.score) {
            errors.push(format!("{label}.score must be in [0,100]"));
        }
        if tier.max_loops < 1 {
            errors.push(format!("{label}.maxLoops must be >= 1"));
        }
    }

    if criteria.tier2.max_loops < criteria.tier1.max_loops {
        errors.push("tier2.maxLoops must be >= tier1.maxLoops".to_string());
    }
    if criteria.tier3.max_loops < criteria.tier2.max_loops {
        errors.push("tier3.maxLoops must be >= tier2.maxLoops".to_string());
    }
    if criteria.hard_stop.max_loops < criteria.tier3.max_loops {
        errors.push("hardStop.maxLoops must be >= tier3.maxLoops".to_string());
    }

    if !(criteria.tier1.score >= criteria.tier2.score && criteria.tier2.score >= criteria.tier3.score) {
        errors.push("tier scores must be monotonically non-increasing: tier1 >= tier2 >= tier3".to_string());
    }

    if criteria.stagnation_check.start_loop < 1 {
        errors.push("stagnationCheck.startLoop must be >= 1".to_string());
    }
    if !(0.0..=1.0).contains(&criteria.stagnation_check.similarity_threshold) {
        errors.push("stagnationCheck.similarityThreshold must be in [0,1]".to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_criteria_are_valid() {
        assert!(validate_completion_criteria(&CompletionCriteria::default()).is_empty());
    }

    #[test]
    fn test_score_monotonicity_enforced() {
        let mut criteria = CompletionCriteria::default();
        criteria.tier3.score = 99.0;
        let errors = validate_completion_criteria(&criteria);
        assert!(errors.iter().any(|e| e.contains("monotonically")));
    }

    #[test]
    fn test_max_loops_ordering_enforced() {
        let mut criteria = CompletionCriteria::default();
        criteria.tier3.max_loops = 5;
        let errors = validate_completion_criteria(&criteria);
        assert!(errors.iter().any(|e| e.contains("tier3.maxLoops")));
    }
}

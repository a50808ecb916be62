//! Stagnation / loop-detection companion analyzer (spec.md §4.5).
//!
//! Grounded on the teacher's `escalation/state.rs` sliding-window
//! iteration history (a fixed-size tape of recent attempts consulted by
//! a heuristic) and on the windowed-comparison shape of the now-removed
//! `escalation/friction.rs` detectors — reimplemented here against
//! spec.md's generic `IterationData`/`Review` model instead of rustc
//! error categories.

use serde::{Deserialize, Serialize};

use crate::fingerprint::normalize;
use crate::model::IterationData;

use super::criteria::StagnationCheck;

const WINDOW: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagnationResult {
    pub is_stagnant: bool,
    pub detected_at_loop: u32,
    pub similarity_score: f64,
    pub recommendation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative_suggestions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_progression: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<String>>,
}

/// Token-Jaccard similarity over whitespace/case-folded normalized code.
/// 1.0 when both sides are empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    let tokenize = |s: &str| -> std::collections::HashSet<String> {
        normalize(s).to_lowercase().split_whitespace().map(str::to_string).collect()
    };
    let ta = tokenize(a);
    let tb = tokenize(b);
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        1.0
    } else {
        intersection as f64 / union as f64
    }
}

pub fn detect_stagnation(iterations: &[IterationData], current_loop: u32, config: StagnationCheck) -> StagnationResult {
    if current_loop < config.start_loop || iterations.len() < 2 {
        return StagnationResult {
            recommendation: "Insufficient history to assess stagnation".to_string(),
            ..Default::default()
        };
    }

    let window_size = WINDOW.min(iterations.len());
    let window = &iterations[iterations.len() - window_size..];

    let mut progression = Vec::new();
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for i in 0..window.len() {
        for j in (i + 1)..window.len() {
            let sim = similarity(&window[i].code, &window[j].code);
            sum += sim;
            pairs += 1;
            if j == i + 1 {
                progression.push(sim);
            }
        }
    }
    let avg_similarity = if pairs == 0 { 0.0 } else { sum / pairs as f64 };
    let is_stagnant = avg_similarity >= config.similarity_threshold;

    let mut patterns = Vec::new();
    if is_cosmetic_only(window) {
        patterns.push("cosmetic_only".to_string());
    }
    if is_reverting(window) {
        patterns.push("reverting".to_string());
    }
    if is_declining(window) {
        patterns.push("declining".to_string());
    }
    if is_repeated_issue(window) {
        patterns.push("repeated_issue".to_string());
    }

    let alternative_suggestions = alternative_suggestions_for(&patterns);

    let recommendation = if is_stagnant {
        "No meaningful progress detected across recent iterations; consider a different approach".to_string()
    } else {
        "Iterations show meaningful change; continue current approach".to_string()
    };

    StagnationResult {
        is_stagnant,
        detected_at_loop: if is_stagnant { current_loop } else { 0 },
        similarity_score: avg_similarity,
        recommendation,
        progress_analysis: Some(progress_analysis(window)),
        alternative_suggestions: if alternative_suggestions.is_empty() {
            None
        } else {
            Some(alternative_suggestions)
        },
        similarity_progression: Some(progression),
        patterns: if patterns.is_empty() { None } else { Some(patterns) },
    }
}

fn is_cosmetic_only(window: &[IterationData]) -> bool {
    window.windows(2).all(|pair| {
        let (a, b) = (&pair[0], &pair[1]);
        a.code != b.code && normalize(&a.code) == normalize(&b.code)
    })
}

fn is_reverting(window: &[IterationData]) -> bool {
    if window.len() < 3 {
        return false;
    }
    window.windows(3).any(|triple| normalize(&triple[0].code) == normalize(&triple[2].code) && normalize(&triple[0].code) != normalize(&triple[1].code))
}

fn is_declining(window: &[IterationData]) -> bool {
    window.windows(2).all(|pair| pair[1].audit_result.overall <= pair[0].audit_result.overall)
        && window.first().map(|f| f.audit_result.overall).unwrap_or(0.0)
            > window.last().map(|l| l.audit_result.overall).unwrap_or(0.0)
}

fn is_repeated_issue(window: &[IterationData]) -> bool {
    let mut counts = std::collections::HashMap::new();
    for it in window {
        *counts.entry(it.audit_result.review.summary.clone()).or_insert(0) += 1;
    }
    counts.values().any(|&count| count >= 2)
}

fn progress_analysis(window: &[IterationData]) -> String {
    let first = window.first().map(|f| f.audit_result.overall).unwrap_or(0.0);
    let last = window.last().map(|l| l.audit_result.overall).unwrap_or(0.0);
    format!("score moved from {first:.0} to {last:.0} over {} iterations", window.len())
}

fn alternative_suggestions_for(patterns: &[String]) -> Vec<String> {
    let mut suggestions = Vec::new();
    for pattern in patterns {
        let suggestion = match pattern.as_str() {
            "cosmetic_only" => "Changes are formatting-only; target the substantive issue directly",
            "reverting" => "Code is oscillating between two prior states; pick one and commit to it",
            "declining" => "Score is trending down; revert to the last highest-scoring iteration",
            "repeated_issue" => "The same issue keeps recurring; address the root cause rather than symptoms",
            _ => continue,
        };
        suggestions.push(suggestion.to_string());
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Review;
    use chrono::Utc;

    fn iteration(thought_number: u32, code: &str, score: f64) -> IterationData {
        let mut review = Review::synthetic_pass();
        review.overall = score;
        IterationData {
            thought_number,
            code: code.to_string(),
            audit_result: review,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_identical_code_window_is_stagnant() {
        let iterations: Vec<_> = (11..=15).map(|n| iteration(n, "fn x() {}", 60.0)).collect();
        let config = StagnationCheck {
            start_loop: 10,
            similarity_threshold: 0.95,
        };
        let result = detect_stagnation(&iterations, 15, config);
        assert!(result.is_stagnant);
        assert_eq!(result.detected_at_loop, 15);
        assert!(result.similarity_score >= 0.95);
    }

    #[test]
    fn test_before_start_loop_never_stagnant() {
        let iterations: Vec<_> = (1..=5).map(|n| iteration(n, "fn x() {}", 60.0)).collect();
        let config = StagnationCheck {
            start_loop: 10,
            similarity_threshold: 0.95,
        };
        let result = detect_stagnation(&iterations, 5, config);
        assert!(!result.is_stagnant);
    }

    #[test]
    fn test_diverse_code_not_stagnant() {
        let codes = ["fn a(){}", "struct B;", "enum C { X }", "trait D {}", "impl E {}"];
        let iterations: Vec<_> = codes.iter().enumerate().map(|(i, c)| iteration(11 + i as u32, c, 60.0)).collect();
        let config = StagnationCheck {
            start_loop: 10,
            similarity_threshold: 0.95,
        };
        let result = detect_stagnation(&iterations, 15, config);
        assert!(!result.is_stagnant);
    }

    #[test]
    fn test_similarity_symmetric_and_bounded() {
        let s = similarity("fn a() { 1 }", "fn a ( ) { 1 }");
        assert!((0.0..=1.0).contains(&s));
        assert_eq!(s, similarity("fn a ( ) { 1 }", "fn a() { 1 }"));
    }
}

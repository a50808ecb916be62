//! Shared data model (spec.md §3).
//!
//! Types in this module are owned by value, not by back-pointer: a
//! `SessionState` owns its `HistoryEntry`/`IterationData` vectors, a
//! `CacheEntry` owns its `Review`. Lookups elsewhere in the crate go
//! through IDs, never through shared pointers into these structures —
//! the acyclic-owner-tree discipline spec.md §9 asks for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user-submitted unit containing (possibly) code and optional inline
/// config. `thought_number` is 1-based; invariant: `thought_number >= 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thought {
    pub thought_number: u32,
    pub thought: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_thoughts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_thought_needed: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl Thought {
    pub fn new(thought_number: u32, thought: impl Into<String>) -> Self {
        Self {
            thought_number,
            thought: thought.into(),
            branch_id: None,
            total_thoughts: None,
            next_thought_needed: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }
}

/// Pass/revise/reject verdict attached to a [`Review`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Revise,
    Reject,
}

/// A single named scoring dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScore {
    pub name: String,
    pub score: f64,
}

/// An inline review comment anchored to a file/line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineComment {
    pub path: String,
    pub line: u32,
    pub comment: String,
}

/// Prose portion of a [`Review`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewBody {
    pub summary: String,
    #[serde(default)]
    pub inline: Vec<InlineComment>,
    #[serde(default)]
    pub citations: Vec<String>,
}

/// Per-model scoring card, one per judge variant consulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeCard {
    pub model: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The structured verdict produced by a judge. See spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub overall: f64,
    pub dimensions: Vec<DimensionScore>,
    pub verdict: Verdict,
    pub review: ReviewBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_diff: Option<String>,
    pub iterations: u32,
    pub judge_cards: Vec<JudgeCard>,
}

impl Review {
    /// A synthetic passing review used when auditing is skipped or
    /// disabled (spec.md §4.7 step 1).
    pub fn synthetic_pass() -> Self {
        Self {
            overall: 100.0,
            dimensions: Vec::new(),
            verdict: Verdict::Pass,
            review: ReviewBody {
                summary: "Audit skipped: no code artifact detected in thought.".to_string(),
                inline: Vec::new(),
                citations: Vec::new(),
            },
            proposed_diff: None,
            iterations: 1,
            judge_cards: Vec::new(),
        }
    }

    /// A fallback review used when the judge times out or errors
    /// (spec.md §4.7 step 6 / §7 "codex" error kind).
    pub fn fallback(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            overall: 50.0,
            dimensions: Vec::new(),
            verdict: Verdict::Revise,
            review: ReviewBody {
                summary: reason,
                inline: Vec::new(),
                citations: Vec::new(),
            },
            proposed_diff: None,
            iterations: 1,
            judge_cards: vec![JudgeCard {
                model: "fallback".to_string(),
                score: 50.0,
                notes: None,
            }],
        }
    }
}

/// One entry in a session's append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub thought_number: u32,
    pub review: Review,
    pub config: crate::config::SessionConfig,
    pub timestamp: DateTime<Utc>,
}

/// One entry retained for stagnation detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationData {
    pub thought_number: u32,
    pub code: String,
    pub audit_result: Review,
    pub timestamp: DateTime<Utc>,
}

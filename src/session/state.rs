//! Per-session state (spec.md §3 "SessionState").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::completion::StagnationResult;
use crate::config::SessionConfig;
use crate::model::{HistoryEntry, IterationData, Review};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub id: String,
    pub config: SessionConfig,
    pub history: Vec<HistoryEntry>,
    pub iterations: Vec<IterationData>,
    pub current_loop: u32,
    pub is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none", rename = "lastGan")]
    pub last_review: Option<Review>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stagnation_info: Option<StagnationResult>,
    pub codex_context_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            config: SessionConfig::default(),
            history: Vec::new(),
            iterations: Vec::new(),
            current_loop: 0,
            is_complete: false,
            last_review: None,
            stagnation_info: None,
            codex_context_active: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append one audit to history, enforcing spec.md §5's ordering
    /// invariant: `thoughtNumber` must equal `history.len() + 1`.
    pub fn append_history(&mut self, entry: HistoryEntry) -> Result<(), String> {
        if self.is_complete {
            return Err("cannot append history to a completed session".to_string());
        }
        let expected = self.history.len() as u32 + 1;
        if entry.thought_number != expected {
            return Err(format!(
                "out-of-order append: expected thoughtNumber {expected}, got {}",
                entry.thought_number
            ));
        }
        let now = Utc::now();
        self.last_review = Some(entry.review.clone());
        self.history.push(entry);
        self.current_loop = self.history.len() as u32;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Review, ReviewBody, Verdict};

    fn history_entry(n: u32) -> HistoryEntry {
        HistoryEntry {
            thought_number: n,
            review: Review {
                overall: 80.0,
                dimensions: vec![],
                verdict: Verdict::Pass,
                review: ReviewBody::default(),
                proposed_diff: None,
                iterations: 1,
                judge_cards: vec![],
            },
            config: SessionConfig::default(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_append_history_enforces_order() {
        let mut session = SessionState::new("s1");
        assert!(session.append_history(history_entry(1)).is_ok());
        assert!(session.append_history(history_entry(3)).is_err());
        assert!(session.append_history(history_entry(2)).is_ok());
        assert_eq!(session.current_loop, 2);
    }

    #[test]
    fn test_completed_session_rejects_further_history() {
        let mut session = SessionState::new("s1");
        session.append_history(history_entry(1)).unwrap();
        session.is_complete = true;
        assert!(session.append_history(history_entry(2)).is_err());
    }
}

//! C7 — Orchestrator: ties C1-C6 together for one thought.
//!
//! Grounded on the teacher's top-level `main.rs` tool-dispatch shape in
//! spirit only (a single entry point resolving request -> subsystem
//! calls -> response); the actual decide/cache/enqueue/evaluate/persist
//! sequence below is built directly from spec.md §4.7, since the
//! teacher has no equivalent "one call touches every subsystem" path.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;

use crate::cache::AuditCache;
use crate::completion::should_terminate;
use crate::config::{AuditorConfig, PartialSessionConfig, PARTIAL_SESSION_CONFIG_FIELDS};
use crate::error::{AuditError, AuditResult};
use crate::model::{IterationData, Review, Thought};
use crate::queue::{AuditQueue, EnqueueOptions, QueueError};
use crate::session::SessionStore;

static GAN_CONFIG_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:gan-config|json)[^\n]*\n(.*?)```").unwrap());
static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static LINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"//[^\n]*").unwrap());
static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",(\s*[}\]])").unwrap());
static SINGLE_QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'([^'\\]*)'").unwrap());

static AUDIT_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(function|class|import|interface)\b|export default function|\b(const|let|var)\s+\w+\s*=|/\*|//").unwrap()
});

/// `isAuditRequired(thought)` (spec.md §4.7).
pub fn is_audit_required(thought: &Thought) -> bool {
    let text = &thought.thought;
    if text.trim().is_empty() {
        return false;
    }
    text.contains("```") || text.contains('`') || AUDIT_KEYWORDS.is_match(text)
}

/// Extract and repair the first `gan-config`/`json` fenced block, per
/// spec.md §4.7's "Inline configuration extraction". Malformed JSON
/// that doesn't survive the repair pass yields `Ok(None)` (spec.md
/// §4.7: "on continued failure return null"). In `strict` mode, a
/// syntactically valid object carrying a key outside
/// [`PARTIAL_SESSION_CONFIG_FIELDS`] is a hard error (spec.md §3:
/// "Unknown fields: rejected in strict mode; coerced/clamped
/// otherwise") rather than a field silently dropped by `serde`.
pub fn extract_inline_config(thought: &Thought, strict: bool) -> AuditResult<Option<PartialSessionConfig>> {
    let captures = match GAN_CONFIG_BLOCK.captures(&thought.thought) {
        Some(c) => c,
        None => return Ok(None),
    };
    let body = match captures.get(1) {
        Some(m) => m.as_str().trim(),
        None => return Ok(None),
    };
    if body.is_empty() {
        return Ok(None);
    }

    let raw = if serde_json::from_str::<serde_json::Value>(body).is_ok() {
        body.to_string()
    } else {
        repair_json(body)
    };

    let value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    if strict {
        if let serde_json::Value::Object(map) = &value {
            for key in map.keys() {
                if !PARTIAL_SESSION_CONFIG_FIELDS.contains(&key.as_str()) {
                    return Err(AuditError::Validation(format!(
                        "unknown field '{key}' rejected in strict mode"
                    )));
                }
            }
        }
    }

    Ok(serde_json::from_value(value).ok())
}

fn repair_json(body: &str) -> String {
    let no_block_comments = BLOCK_COMMENT.replace_all(body, "");
    let no_line_comments = LINE_COMMENT.replace_all(&no_block_comments, "");
    let no_trailing_commas = TRAILING_COMMA.replace_all(&no_line_comments, "$1");
    SINGLE_QUOTED.replace_all(&no_trailing_commas, "\"$1\"").to_string()
}

pub struct Orchestrator {
    cache: Arc<AuditCache>,
    queue: Arc<AuditQueue>,
    session_store: Arc<SessionStore>,
    auditor_config: AuditorConfig,
    enabled: bool,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<AuditCache>,
        queue: Arc<AuditQueue>,
        session_store: Arc<SessionStore>,
        auditor_config: AuditorConfig,
    ) -> Self {
        Self {
            cache,
            queue,
            session_store,
            auditor_config,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// `auditThought(thought, sessionId?)` (spec.md §4.7).
    pub async fn audit_thought(&self, thought: Thought, session_id: Option<String>) -> AuditResult<Review> {
        if !self.enabled || !is_audit_required(&thought) {
            return Ok(Review::synthetic_pass());
        }

        let session_key = session_id
            .or_else(|| thought.branch_id.clone())
            .unwrap_or_else(|| self.session_store.generate_session_id());

        let mut session = match self.session_store.get_session(&session_key).await {
            Some(session) => session,
            None => self.session_store.create_session(Some(session_key.clone())).await,
        };

        if let Some(partial) = extract_inline_config(&thought, self.auditor_config.strict_config)? {
            session.config.merge(&partial);
            let _ = self.session_store.update_session(session.clone()).await;
        }

        let thought_number = session.history.len() as u32 + 1;

        if let Some(cached) = self.cache.get(&thought).await {
            let _ = self
                .session_store
                .add_audit_to_history(&session_key, cached.clone(), session.config.clone(), thought_number)
                .await;
            self.evaluate_completion(&session_key, &thought, cached.clone()).await;
            return Ok(cached);
        }

        let timeout = Duration::from_millis(self.auditor_config.audit_timeout_ms);
        let dispatched = tokio::time::timeout(
            timeout,
            self.queue
                .enqueue(thought.clone(), Some(session_key.clone()), EnqueueOptions::default()),
        )
        .await;

        let review = match dispatched {
            Ok(Ok(review)) => review,
            Ok(Err(QueueError::Full(msg))) => return Err(AuditError::QueueFull(msg)),
            Ok(Err(QueueError::Rejected(msg))) => Review::fallback(format!("Audit failed: {msg}")),
            Err(_) => Review::fallback(format!(
                "Audit timed out after {}ms",
                self.auditor_config.audit_timeout_ms
            )),
        };

        self.cache.set(&thought, review.clone()).await;
        let _ = self
            .session_store
            .add_audit_to_history(&session_key, review.clone(), session.config.clone(), thought_number)
            .await;
        self.evaluate_completion(&session_key, &thought, review.clone()).await;

        Ok(review)
    }

    /// `Session.appendHistory → CompletionEvaluator.evaluate` (spec.md
    /// §2's data flow): record this thought's review as an iteration,
    /// run `evaluateCompletion`/`detectStagnation` over the session's
    /// iteration tape, and persist the resulting `isComplete`/
    /// `stagnationInfo`. Logs rather than propagates: completion
    /// evaluation informs the caller's next decision, it does not change
    /// the review just produced (spec.md §4.7 step 7 only requires the
    /// review be returned).
    async fn evaluate_completion(&self, session_key: &str, thought: &Thought, review: Review) {
        let iteration = IterationData {
            thought_number: thought.thought_number,
            code: thought.thought.clone(),
            audit_result: review,
            timestamp: chrono::Utc::now(),
        };

        let criteria = &self.auditor_config.completion_criteria;
        match self.session_store.record_completion(session_key, iteration, criteria).await {
            Ok((decision, session)) => {
                tracing::debug!(
                    session_id = session_key,
                    is_complete = decision.is_complete,
                    reason = decision.reason.as_deref().unwrap_or("in_progress"),
                    "completion evaluated"
                );
                let termination = should_terminate(&session.history, session.current_loop, criteria, session.stagnation_info.as_ref());
                if termination.should_terminate {
                    tracing::info!(
                        session_id = session_key,
                        failure_rate = termination.failure_rate,
                        "session terminated: {}",
                        termination.final_assessment.unwrap_or_default()
                    );
                }
            }
            Err(e) => {
                tracing::warn!(session_id = session_key, error = %e, "completion evaluation failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_required_for_fenced_code() {
        let thought = Thought::new(1, "```rust\nfn x() {}\n```");
        assert!(is_audit_required(&thought));
    }

    #[test]
    fn test_audit_not_required_for_prose() {
        let thought = Thought::new(1, "just some plain prose here");
        assert!(!is_audit_required(&thought));
    }

    #[test]
    fn test_audit_required_for_keyword() {
        let thought = Thought::new(1, "export default function App() {}");
        assert!(is_audit_required(&thought));
    }

    #[test]
    fn test_extract_inline_config_valid_json() {
        let thought = Thought::new(1, "```gan-config\n{\"threshold\": 90}\n```");
        let partial = extract_inline_config(&thought, false).unwrap().unwrap();
        assert_eq!(partial.threshold, Some(90.0));
    }

    #[test]
    fn test_extract_inline_config_repairs_trailing_comma_and_comments() {
        let thought = Thought::new(
            1,
            "```json\n{\n  // preferred threshold\n  'threshold': 90,\n}\n```",
        );
        let partial = extract_inline_config(&thought, false).unwrap().unwrap();
        assert_eq!(partial.threshold, Some(90.0));
    }

    #[test]
    fn test_extract_inline_config_empty_body_is_none() {
        let thought = Thought::new(1, "```gan-config\n\n```");
        assert!(extract_inline_config(&thought, false).unwrap().is_none());
    }

    #[test]
    fn test_extract_inline_config_absent_block_is_none() {
        let thought = Thought::new(1, "no config here");
        assert!(extract_inline_config(&thought, false).unwrap().is_none());
    }

    #[test]
    fn test_extract_inline_config_lenient_ignores_unknown_field() {
        let thought = Thought::new(1, "```gan-config\n{\"threshold\": 90, \"wat\": 1}\n```");
        let partial = extract_inline_config(&thought, false).unwrap().unwrap();
        assert_eq!(partial.threshold, Some(90.0));
    }

    #[test]
    fn test_extract_inline_config_strict_rejects_unknown_field() {
        let thought = Thought::new(1, "```gan-config\n{\"threshold\": 90, \"wat\": 1}\n```");
        let err = extract_inline_config(&thought, true).unwrap_err();
        assert!(matches!(err, AuditError::Validation(_)));
    }

    #[test]
    fn test_extract_inline_config_strict_accepts_known_fields() {
        let thought = Thought::new(1, "```gan-config\n{\"threshold\": 90, \"applyFixes\": true}\n```");
        let partial = extract_inline_config(&thought, true).unwrap().unwrap();
        assert_eq!(partial.threshold, Some(90.0));
        assert_eq!(partial.apply_fixes, Some(true));
    }
}

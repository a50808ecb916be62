//! Queue element (spec.md §3 "Job").

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::model::{Review, Thought};

/// `high > normal > low`; derived `Ord` follows declaration order, so
/// keep the variants listed low-to-high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub priority: Priority,
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            priority: Priority::Normal,
            timeout_ms: None,
            max_retries: None,
        }
    }
}

/// One unit of queued audit work. `resolver` is consumed exactly once,
/// on final success or on exhausted-retries failure.
pub struct Job {
    pub id: Uuid,
    pub thought: Thought,
    pub session_id: Option<String>,
    pub priority: Priority,
    pub enqueued_at: DateTime<Utc>,
    pub start_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub cancelled: bool,
    pub resolver: Option<oneshot::Sender<Result<Review, String>>>,
}

impl Job {
    pub fn new(
        thought: Thought,
        session_id: Option<String>,
        opts: EnqueueOptions,
        default_timeout_ms: u64,
        default_max_retries: u32,
        resolver: oneshot::Sender<Result<Review, String>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            thought,
            session_id,
            priority: opts.priority,
            enqueued_at: Utc::now(),
            start_at: None,
            attempts: 0,
            max_retries: opts.max_retries.unwrap_or(default_max_retries),
            timeout_ms: opts.timeout_ms.unwrap_or(default_timeout_ms),
            cancelled: false,
            resolver,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < 1 + self.max_retries
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("attempts", &self.attempts)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

//! Crate-wide error taxonomy.
//!
//! Each subsystem (cache, queue, workflow, session) owns a focused
//! `thiserror` enum for its own internal failure modes. [`AuditError`]
//! unifies them at the orchestrator/CLI boundary and exposes the stable
//! [`ErrorKind`] used in log fields, mirroring the source design's
//! "names are stable, used in log/metric fields, not in user messages".

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheError;
use crate::queue::QueueError;
use crate::session::SessionStoreError;
use crate::workflow::WorkflowError;

/// Stable error kind, independent of the specific variant's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Codex,
    Filesystem,
    Session,
    QueueFull,
    Workflow,
    Validation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Codex => "codex",
            Self::Filesystem => "filesystem",
            Self::Session => "session",
            Self::QueueFull => "queue_full",
            Self::Workflow => "workflow",
            Self::Validation => "validation",
        };
        write!(f, "{s}")
    }
}

/// Top-level error returned across the orchestrator boundary.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("config error: {0}")]
    Config(String),

    #[error("judge error: {0}")]
    Codex(String),

    #[error("persistence error: {0}")]
    Filesystem(String),

    #[error("session error: {0}")]
    Session(#[from] SessionStoreError),

    #[error("queue is full: {0}")]
    QueueFull(String),

    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl AuditError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Codex(_) => ErrorKind::Codex,
            Self::Filesystem(_) => ErrorKind::Filesystem,
            Self::Session(_) => ErrorKind::Session,
            Self::QueueFull(_) => ErrorKind::QueueFull,
            Self::Workflow(_) => ErrorKind::Workflow,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Cache(_) => ErrorKind::Filesystem,
        }
    }
}

impl From<QueueError> for AuditError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Full(msg) => Self::QueueFull(msg),
            other => Self::Codex(other.to_string()),
        }
    }
}

pub type AuditResult<T> = Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(AuditError::Config("x".into()).kind(), ErrorKind::Config);
        assert_eq!(
            AuditError::QueueFull("Queue is full".into()).kind(),
            ErrorKind::QueueFull
        );
    }

    #[test]
    fn test_kind_display_is_stable() {
        assert_eq!(ErrorKind::QueueFull.to_string(), "queue_full");
        assert_eq!(ErrorKind::Codex.to_string(), "codex");
    }

    #[test]
    fn test_queue_full_conversion_preserves_message() {
        let qerr = QueueError::Full("Queue is full (max_queue_size=4)".to_string());
        let aerr: AuditError = qerr.into();
        assert!(matches!(aerr, AuditError::QueueFull(_)));
        assert!(aerr.to_string().contains("Queue is full"));
    }
}

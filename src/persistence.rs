//! External collaborator: session persistence (spec.md §6).
//!
//! The core treats persistence as injected and best-effort: errors here
//! are logged and swallowed by the orchestrator, never surfaced as a
//! failed audit (spec.md §4.7 step 7, §7 "filesystem" error kind).

use async_trait::async_trait;
use thiserror::Error;

use crate::session::SessionState;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read session {session_id}: {source}")]
    Read {
        session_id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write session {session_id}: {source}")]
    Write {
        session_id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize session {session_id}: {source}")]
    Serialize {
        session_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("session {0} not found")]
    NotFound(String),
}

#[async_trait]
pub trait SessionManager: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<SessionState, PersistenceError>;
    async fn save(&self, session: &SessionState) -> Result<(), PersistenceError>;
    async fn delete(&self, session_id: &str) -> Result<(), PersistenceError>;
}

/// Reference file-based implementation: one `<sessionId>.json` per
/// session under `root_dir`, with a `.bak` copy written before any
/// overwrite (spec.md §6 "Persisted session layout").
pub struct FileSessionManager {
    root_dir: std::path::PathBuf,
}

impl FileSessionManager {
    pub fn new(root_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn path_for(&self, session_id: &str) -> std::path::PathBuf {
        self.root_dir.join(format!("{session_id}.json"))
    }

    fn backup_path_for(&self, session_id: &str) -> std::path::PathBuf {
        self.root_dir.join(format!("{session_id}.json.bak"))
    }
}

#[async_trait]
impl SessionManager for FileSessionManager {
    async fn load(&self, session_id: &str) -> Result<SessionState, PersistenceError> {
        let path = self.path_for(session_id);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => PersistenceError::NotFound(session_id.to_string()),
                _ => PersistenceError::Read {
                    session_id: session_id.to_string(),
                    source,
                },
            })?;
        serde_json::from_str(&contents).map_err(|source| PersistenceError::Serialize {
            session_id: session_id.to_string(),
            source,
        })
    }

    async fn save(&self, session: &SessionState) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.root_dir)
            .await
            .map_err(|source| PersistenceError::Write {
                session_id: session.id.clone(),
                source,
            })?;

        let path = self.path_for(&session.id);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let backup = self.backup_path_for(&session.id);
            let _ = tokio::fs::copy(&path, &backup).await;
        }

        let serialized = serde_json::to_vec_pretty(session).map_err(|source| PersistenceError::Serialize {
            session_id: session.id.clone(),
            source,
        })?;

        tokio::fs::write(&path, serialized).await.map_err(|source| PersistenceError::Write {
            session_id: session.id.clone(),
            source,
        })
    }

    async fn delete(&self, session_id: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(session_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::Write {
                session_id: session_id.to_string(),
                source,
            }),
        }
    }
}

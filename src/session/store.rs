//! Session Store façade (C6, spec.md §4.6).
//!
//! Grounded on the teacher's `state/store.rs`: a single map behind a
//! lock exposing a small CRUD surface. Generalized here to give each
//! session its own `Mutex`, so one session is "exclusively owned by one
//! in-flight audit at a time" (spec.md §4.6) without contending with
//! audits running against other sessions, which a single global lock
//! over the whole map would not provide.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::completion::{detect_stagnation, evaluate_completion, CompletionCriteria, CompletionDecision};
use crate::config::SessionConfig;
use crate::model::{HistoryEntry, IterationData, Review};
use crate::persistence::SessionManager;

use super::state::SessionState;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("session update rejected: {0}")]
    Conflict(String),
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionState>>>>,
    persistence: Option<Arc<dyn SessionManager>>,
}

impl SessionStore {
    pub fn new(persistence: Option<Arc<dyn SessionManager>>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            persistence,
        }
    }

    pub fn generate_session_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    async fn handle_for(&self, id: &str) -> Option<Arc<Mutex<SessionState>>> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn persisted_load(&self, id: &str) -> Option<SessionState> {
        match &self.persistence {
            Some(persistence) => match persistence.load(id).await {
                Ok(state) => Some(state),
                Err(e) => {
                    tracing::warn!(session_id = id, error = %e, "session persistence load failed, starting fresh");
                    None
                }
            },
            None => None,
        }
    }

    async fn persist(&self, state: &SessionState) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save(state).await {
                tracing::warn!(session_id = %state.id, error = %e, "session persistence save failed");
            }
        }
    }

    /// `getSession(id)`: memory first, then the persistence collaborator,
    /// returning `None` only when neither has it.
    pub async fn get_session(&self, id: &str) -> Option<SessionState> {
        if let Some(handle) = self.handle_for(id).await {
            return Some(handle.lock().await.clone());
        }
        let loaded = self.persisted_load(id).await?;
        let mut guard = self.sessions.write().await;
        let handle = guard
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(loaded)));
        Some(handle.lock().await.clone())
    }

    /// `createSession(id?)`. Idempotent: returns the existing session if
    /// one is already registered under `id`.
    pub async fn create_session(&self, id: Option<String>) -> SessionState {
        let id = id.unwrap_or_else(|| self.generate_session_id());
        let mut guard = self.sessions.write().await;
        let handle = guard
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(SessionState::new(id.clone()))))
            .clone();
        drop(guard);
        handle.lock().await.clone()
    }

    /// `updateSession(session)`: replaces the in-memory record wholesale.
    pub async fn update_session(&self, session: SessionState) -> Result<(), SessionStoreError> {
        let handle = self
            .handle_for(&session.id)
            .await
            .ok_or_else(|| SessionStoreError::NotFound(session.id.clone()))?;
        {
            let mut guard = handle.lock().await;
            *guard = session;
        }
        let snapshot = handle.lock().await.clone();
        self.persist(&snapshot).await;
        Ok(())
    }

    /// `addAuditToHistory(sessionId, review, config, thoughtNumber)`.
    /// Creates the session on demand if it does not exist yet.
    pub async fn add_audit_to_history(
        &self,
        session_id: &str,
        review: Review,
        config: SessionConfig,
        thought_number: u32,
    ) -> Result<SessionState, SessionStoreError> {
        let handle = match self.handle_for(session_id).await {
            Some(handle) => handle,
            None => {
                let mut guard = self.sessions.write().await;
                guard
                    .entry(session_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(SessionState::new(session_id.to_string()))))
                    .clone()
            }
        };

        let snapshot = {
            let mut state = handle.lock().await;
            let entry = HistoryEntry {
                thought_number,
                review,
                config,
                timestamp: Utc::now(),
            };
            state
                .append_history(entry)
                .map_err(SessionStoreError::Conflict)?;
            state.clone()
        };
        self.persist(&snapshot).await;
        Ok(snapshot)
    }

    /// Appends an [`IterationData`] to the session's iteration tape,
    /// runs `detectStagnation`/`evaluateCompletion` over it (spec.md §2's
    /// data flow: `Session.appendHistory → CompletionEvaluator.evaluate`),
    /// and records the resulting `isComplete`/`stagnationInfo` on the
    /// session (spec.md §3 "stagnation cache" belongs to the session
    /// store façade, not the stateless evaluator). Creates the session on
    /// demand, mirroring `addAuditToHistory`.
    pub async fn record_completion(
        &self,
        session_id: &str,
        iteration: IterationData,
        criteria: &CompletionCriteria,
    ) -> Result<(CompletionDecision, SessionState), SessionStoreError> {
        let handle = match self.handle_for(session_id).await {
            Some(handle) => handle,
            None => {
                let mut guard = self.sessions.write().await;
                guard
                    .entry(session_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(SessionState::new(session_id.to_string()))))
                    .clone()
            }
        };

        let (decision, snapshot) = {
            let mut state = handle.lock().await;
            let score = iteration.audit_result.overall;
            state.iterations.push(iteration);

            let stagnation = detect_stagnation(&state.iterations, state.current_loop, criteria.stagnation_check);
            let decision = evaluate_completion(score, state.current_loop, Some(&stagnation), criteria);

            state.stagnation_info = Some(stagnation);
            state.is_complete = decision.is_complete;
            state.updated_at = Utc::now();
            (decision, state.clone())
        };
        self.persist(&snapshot).await;
        Ok((decision, snapshot))
    }

    /// `cleanupSessions(olderThan)`: drop in-memory sessions whose
    /// `updatedAt` predates the cutoff. Returns the count removed.
    pub async fn cleanup_sessions(&self, older_than: DateTime<Utc>) -> usize {
        let mut guard = self.sessions.write().await;
        let mut stale = Vec::new();
        for (id, handle) in guard.iter() {
            if handle.lock().await.updated_at < older_than {
                stale.push(id.clone());
            }
        }
        for id in &stale {
            guard.remove(id);
        }
        stale.len()
    }

    pub async fn destroy(&self) {
        self.sessions.write().await.clear();
    }
}

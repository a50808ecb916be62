//! External collaborator: the Judge that actually scores code
//! (spec.md §6, out of scope for this core — only the trait and a
//! couple of reference implementations live here).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::Review;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricDimension {
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub max_cycles: u32,
    pub candidates: u32,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRequest {
    pub task: String,
    pub candidate: String,
    pub context_pack: String,
    pub rubric_dimensions: Vec<RubricDimension>,
    pub budget: Budget,
}

#[async_trait]
pub trait Judge: Send + Sync {
    async fn audit(&self, request: AuditRequest) -> Result<Review, String>;
    async fn is_available(&self) -> bool;
    async fn get_version(&self) -> String;
}

/// Deterministic stand-in judge: always passes with a fixed score.
/// Useful for tests and as a default when no real judge is configured.
pub struct EchoJudge;

#[async_trait]
impl Judge for EchoJudge {
    async fn audit(&self, _request: AuditRequest) -> Result<Review, String> {
        Ok(Review::synthetic_pass())
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn get_version(&self) -> String {
        "echo-judge-0".to_string()
    }
}

/// Reference judge that forwards audit requests to an HTTP endpoint
/// returning a JSON-encoded [`Review`]. Grounded on the teacher's
/// `ensemble/coordinator.rs` `query_model` pattern (POST a JSON body,
/// deserialize the response, map transport errors to a string).
#[cfg(feature = "http-judge")]
pub struct HttpJudge {
    client: reqwest::Client,
    endpoint: String,
}

#[cfg(feature = "http-judge")]
impl HttpJudge {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[cfg(feature = "http-judge")]
#[async_trait]
impl Judge for HttpJudge {
    async fn audit(&self, request: AuditRequest) -> Result<Review, String> {
        let response = self
            .client
            .post(format!("{}/audit", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        response.json::<Review>().await.map_err(|e| e.to_string())
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/health", self.endpoint))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn get_version(&self) -> String {
        match self.client.get(format!("{}/version", self.endpoint)).send().await {
            Ok(response) => response.text().await.unwrap_or_else(|_| "unknown".to_string()),
            Err(_) => "unknown".to_string(),
        }
    }
}

//! External collaborator: context packing (diff/workspace/paths),
//! spec.md §6. Out of scope; only the trait and a stub live here.

use async_trait::async_trait;

use crate::config::Scope;

#[derive(Debug, Clone, Default)]
pub struct ContextPackRequest {
    pub scope: Scope,
    pub paths: Option<Vec<String>>,
    pub diff: Option<String>,
}

#[async_trait]
pub trait ContextPacker: Send + Sync {
    /// Must never throw (spec.md §6): on internal error, return a short
    /// stub beginning with "Context building failed".
    async fn build_context_pack(&self, request: ContextPackRequest) -> String;
}

/// Stub implementation: no filesystem/git access, always returns a
/// deterministic placeholder pack.
pub struct StubContextPacker;

#[async_trait]
impl ContextPacker for StubContextPacker {
    async fn build_context_pack(&self, request: ContextPackRequest) -> String {
        match request.scope {
            Scope::Diff => "Context building failed: diff scope not implemented by stub packer".to_string(),
            Scope::Paths => "Context building failed: paths scope not implemented by stub packer".to_string(),
            Scope::Workspace => "Context building failed: workspace scope not implemented by stub packer".to_string(),
        }
    }
}

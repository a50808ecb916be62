//! Iterative code-review orchestrator core.
//!
//! A client submits a sequence of thoughts; for each one the
//! orchestrator decides whether auditing is required, dispatches a
//! review request through a bounded-concurrency queue to a pluggable
//! judge, caches the verdict by a normalized code fingerprint, updates
//! per-session state, and evaluates tiered completion/stagnation rules.
//!
//! The judge, context packer, and session persistence are external
//! collaborators reached through traits in [`judge`], [`context_packer`],
//! and [`persistence`] respectively; this crate has no opinion on how
//! they are implemented.

pub mod cache;
pub mod completion;
pub mod config;
pub mod context_packer;
pub mod error;
pub mod fingerprint;
pub mod judge;
pub mod model;
pub mod orchestrator;
pub mod persistence;
pub mod queue;
pub mod session;
pub mod workflow;

pub use error::{AuditError, AuditResult, ErrorKind};
pub use orchestrator::Orchestrator;

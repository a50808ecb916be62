//! Thin CLI entry point (spec.md §6 "CLI surface").
//!
//! Reads thought JSON from `--thought` or stdin, invokes `auditThought`,
//! prints the resulting review as JSON on stdout, and exits 0 on
//! success, 1 on uncaught error. Recognizes `AUDIT_TIMEOUT_MS`,
//! `AUDIT_CACHE_MAX_ENTRIES`, `AUDIT_CACHE_MAX_BYTES`,
//! `AUDIT_QUEUE_CONCURRENCY`, `AUDIT_LOG_LEVEL`.

use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;

use gan_audit_core::cache::{AuditCache, CacheConfig};
use gan_audit_core::config::AuditorConfig;
use gan_audit_core::judge::{AuditRequest, Budget, EchoJudge, Judge, RubricDimension};
use gan_audit_core::model::{Review, Thought};
use gan_audit_core::orchestrator::Orchestrator;
use gan_audit_core::queue::{AuditQueue, AuditRunner, QueueConfig};
use gan_audit_core::session::SessionStore;

#[derive(Parser, Debug)]
#[command(name = "gan-audit", about = "Iterative code-review orchestrator CLI")]
struct Args {
    /// Thought JSON. Reads from stdin when omitted.
    #[arg(long)]
    thought: Option<String>,

    /// Session identifier to audit under.
    #[arg(long)]
    session_id: Option<String>,

    /// Path to a TOML config file overlaying the built-in defaults.
    #[arg(long)]
    config: Option<String>,
}

/// Bridges the queue's [`AuditRunner`] contract to a [`Judge`]
/// collaborator, assembling the audit request from the thought and
/// session config.
struct JudgeAuditRunner {
    judge: Arc<dyn Judge>,
}

#[async_trait]
impl AuditRunner for JudgeAuditRunner {
    async fn run(&self, thought: Thought, _session_id: Option<String>) -> Result<Review, String> {
        let request = AuditRequest {
            task: "code review".to_string(),
            candidate: thought.thought,
            context_pack: String::new(),
            rubric_dimensions: vec![RubricDimension {
                name: "correctness".to_string(),
                weight: 1.0,
            }],
            budget: Budget {
                max_cycles: 1,
                candidates: 1,
                threshold: 85.0,
            },
        };
        self.judge.audit(request).await
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let auditor_config = match AuditorConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config error: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&auditor_config.log_level))
        .with_writer(std::io::stderr)
        .init();

    let raw_thought = match args.thought {
        Some(thought) => thought,
        None => {
            let mut buf = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                eprintln!("failed to read thought from stdin: {e}");
                return ExitCode::FAILURE;
            }
            buf
        }
    };

    let thought: Thought = match serde_json::from_str(&raw_thought) {
        Ok(thought) => thought,
        Err(e) => {
            eprintln!("invalid thought JSON: {e}");
            return ExitCode::FAILURE;
        }
    };

    let cache = Arc::new(AuditCache::new(CacheConfig {
        max_entries: auditor_config.cache_max_entries,
        max_memory_usage: auditor_config.cache_max_bytes,
        max_age_ms: auditor_config.cache_max_age_ms as i64,
        cleanup_interval_ms: auditor_config.cache_cleanup_interval_ms,
    }));
    let runner: Arc<dyn AuditRunner> = Arc::new(JudgeAuditRunner { judge: Arc::new(EchoJudge) });
    let queue = Arc::new(AuditQueue::new(
        QueueConfig {
            max_concurrent: auditor_config.queue_concurrency,
            max_queue_size: auditor_config.queue_max_size,
            default_timeout_ms: auditor_config.audit_timeout_ms,
            default_max_retries: auditor_config.queue_default_max_retries,
            processing_interval_ms: auditor_config.queue_processing_interval_ms,
            enable_stats: true,
        },
        runner,
    ));
    let session_store = Arc::new(SessionStore::new(None));

    let orchestrator = Orchestrator::new(cache, queue, session_store, auditor_config);

    match orchestrator.audit_thought(thought, args.session_id).await {
        Ok(review) => {
            match serde_json::to_string_pretty(&review) {
                Ok(json) => {
                    println!("{json}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("failed to serialize review: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Err(e) => {
            eprintln!("audit failed ({}): {e}", e.kind());
            ExitCode::FAILURE
        }
    }
}

//! Session-level config (spec.md §3, §9 "dynamic-typed config objects")
//! and the process-level [`AuditorConfig`] (SPEC_FULL.md §A.3).
//!
//! The source system passed around loosely-typed config objects with
//! optional fields merged ad hoc. Here that becomes a strongly-typed
//! [`SessionConfig`] with defaults, and a [`PartialSessionConfig`]
//! override record merged into it with clamping — never a dynamic map.

use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::completion::CompletionCriteria;

/// Context-building strategy requested by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Diff,
    Paths,
    Workspace,
}

impl Default for Scope {
    fn default() -> Self {
        Self::Diff
    }
}

/// Fully-resolved per-session configuration (spec.md §3 "SessionConfig").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub task: String,
    pub scope: Scope,
    pub threshold: f64,
    pub max_cycles: u32,
    pub candidates: u32,
    pub judges: Vec<String>,
    pub apply_fixes: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            task: String::new(),
            scope: Scope::default(),
            threshold: 85.0,
            max_cycles: 3,
            candidates: 1,
            judges: vec!["default".to_string()],
            apply_fixes: false,
        }
    }
}

/// Partial override, as extracted from an inline `gan-config`/`json`
/// fenced block. Every field optional; unknown fields are the caller's
/// (deserializer's) concern, not this type's — see [`merge`](SessionConfig::merge).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialSessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cycles: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judges: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_fixes: Option<bool>,
}

/// Recognized wire names for [`PartialSessionConfig`], camelCase as on
/// the wire. Used by strict-mode inline config parsing (spec.md §3
/// "Unknown fields: rejected in strict mode; coerced/clamped otherwise")
/// to detect keys the struct would otherwise silently drop.
pub const PARTIAL_SESSION_CONFIG_FIELDS: &[&str] = &[
    "task",
    "scope",
    "threshold",
    "maxCycles",
    "candidates",
    "judges",
    "applyFixes",
];

impl SessionConfig {
    /// Merge a partial override into `self`, clamping per spec.md §3/§4.7:
    /// `threshold` to `[0,100]`, `maxCycles`/`candidates` to `>=1`, unknown
    /// `scope` strings falling back to the current value rather than
    /// erroring.
    pub fn merge(&mut self, partial: &PartialSessionConfig) {
        if let Some(task) = &partial.task {
            self.task = task.clone();
        }
        if let Some(scope) = &partial.scope {
            self.scope = match scope.as_str() {
                "diff" => Scope::Diff,
                "paths" => Scope::Paths,
                "workspace" => Scope::Workspace,
                _ => self.scope,
            };
        }
        if let Some(threshold) = partial.threshold {
            self.threshold = threshold.clamp(0.0, 100.0);
        }
        if let Some(max_cycles) = partial.max_cycles {
            self.max_cycles = max_cycles.max(1);
        }
        if let Some(candidates) = partial.candidates {
            self.candidates = candidates.max(1);
        }
        if let Some(judges) = &partial.judges {
            if !judges.is_empty() {
                self.judges = judges.clone();
            }
        }
        if let Some(apply_fixes) = partial.apply_fixes {
            self.apply_fixes = apply_fixes;
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Process-wide tunables, loaded from an optional TOML file and
/// overridden by the five environment variables spec.md §6 names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditorConfig {
    pub audit_timeout_ms: u64,
    pub cache_max_entries: usize,
    pub cache_max_bytes: u64,
    pub cache_max_age_ms: u64,
    pub cache_cleanup_interval_ms: u64,
    pub queue_concurrency: usize,
    pub queue_max_size: usize,
    pub queue_default_max_retries: u32,
    pub queue_processing_interval_ms: u64,
    pub log_level: String,
    pub completion_criteria: CompletionCriteria,
    /// When set, inline `gan-config` blocks with unrecognized keys are
    /// rejected outright (spec.md §3) instead of being coerced/ignored.
    pub strict_config: bool,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            audit_timeout_ms: 30_000,
            cache_max_entries: 500,
            cache_max_bytes: 50 * 1024 * 1024,
            cache_max_age_ms: 24 * 60 * 60 * 1000,
            cache_cleanup_interval_ms: 5 * 60 * 1000,
            queue_concurrency: 4,
            queue_max_size: 100,
            queue_default_max_retries: 2,
            queue_processing_interval_ms: 50,
            log_level: "info".to_string(),
            completion_criteria: CompletionCriteria::default(),
            strict_config: false,
        }
    }
}

impl AuditorConfig {
    /// Load defaults, overlay an optional TOML file, then overlay the
    /// recognized environment variables. Missing file is not an error;
    /// a present-but-unparsable file is.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = path {
            match std::fs::read_to_string(path) {
                Ok(contents) => {
                    config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                        path: path.to_string(),
                        source,
                    })?;
                }
                Err(source) if source.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(ConfigError::Read {
                        path: path.to_string(),
                        source,
                    })
                }
            }
        }

        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = parse_env("AUDIT_TIMEOUT_MS")? {
            self.audit_timeout_ms = v;
        }
        if let Some(v) = parse_env("AUDIT_CACHE_MAX_ENTRIES")? {
            self.cache_max_entries = v;
        }
        if let Some(v) = parse_env("AUDIT_CACHE_MAX_BYTES")? {
            self.cache_max_bytes = v;
        }
        if let Some(v) = parse_env("AUDIT_QUEUE_CONCURRENCY")? {
            self.queue_concurrency = v;
        }
        if let Ok(level) = env::var("AUDIT_LOG_LEVEL") {
            match level.as_str() {
                "debug" | "info" | "warn" | "error" => self.log_level = level,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: "AUDIT_LOG_LEVEL".to_string(),
                        message: format!("unrecognized level '{other}'"),
                    })
                }
            }
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: key.to_string(),
                message: format!("expected a number, got '{raw}'"),
            }),
        Err(_) => Ok(None),
    }
}

//! C2 — Audit Cache: content-addressed memoization of judge verdicts,
//! with TTL + LRU-by-count + LRU-by-bytes eviction and statistics.
//!
//! Grounded on the teacher's `state/store.rs` for the "single
//! `RwLock<HashMap<...>>` guarding a CRUD surface, with a background
//! cleanup loop" shape, generalized here to content-addressed keys and
//! a three-stage eviction policy instead of session CRUD.

mod entry;
mod stats;

pub use entry::{measure_bytes, CacheEntry};
pub use stats::{CacheStats, CacheStatsCounters};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::fingerprint::{self, Fingerprint};
use crate::model::{Review, Thought};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache storage error: {0}")]
    Storage(String),
}

/// Tunables for one [`AuditCache`] instance (spec.md §4.2).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_memory_usage: u64,
    pub max_age_ms: i64,
    /// 0 disables the auto-cleanup timer (spec.md §4.2 "tests depend on this").
    pub cleanup_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            max_memory_usage: 50 * 1024 * 1024,
            max_age_ms: 24 * 60 * 60 * 1000,
            cleanup_interval_ms: 5 * 60 * 1000,
        }
    }
}

struct Inner {
    entries: HashMap<Fingerprint, CacheEntry>,
    stats: CacheStatsCounters,
}

/// Content-addressed cache of judge verdicts, keyed by [`fingerprint`].
///
/// `set`/`get`/`cleanup` take `&self` (not `&mut self`): the single
/// `RwLock` makes this type safe for concurrent callers per spec.md §5
/// without requiring callers to hold an external mutex.
pub struct AuditCache {
    config: CacheConfig,
    inner: Arc<RwLock<Inner>>,
    cleanup_task: Option<JoinHandle<()>>,
}

impl AuditCache {
    pub fn new(config: CacheConfig) -> Self {
        let inner = Arc::new(RwLock::new(Inner {
            entries: HashMap::new(),
            stats: CacheStatsCounters::default(),
        }));

        let cleanup_task = if config.cleanup_interval_ms > 0 {
            let inner = Arc::clone(&inner);
            let max_age_ms = config.max_age_ms;
            let period = std::time::Duration::from_millis(config.cleanup_interval_ms);
            Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                loop {
                    ticker.tick().await;
                    let mut guard = inner.write().await;
                    expire_stale(&mut guard.entries, max_age_ms);
                }
            }))
        } else {
            None
        };

        Self {
            config,
            inner,
            cleanup_task,
        }
    }

    /// `get(thought) -> Review | null` (spec.md §4.2). Updates `lastAccess`
    /// and stats.
    pub async fn get(&self, thought: &Thought) -> Option<Review> {
        let key = fingerprint::fingerprint(thought);
        let mut guard = self.inner.write().await;
        let now = Utc::now();
        let hit = match guard.entries.get_mut(&key) {
            Some(entry) if !entry.is_expired(now, self.config.max_age_ms) => {
                entry.touch(now);
                Some(entry.review.clone())
            }
            _ => None,
        };
        if hit.is_some() {
            guard.stats.record_hit();
        } else {
            guard.stats.record_miss();
        }
        hit
    }

    /// `has(thought) -> bool`, sync from the caller's perspective and
    /// stats-neutral (spec.md §4.2).
    pub async fn has(&self, thought: &Thought) -> bool {
        let key = fingerprint::fingerprint(thought);
        let guard = self.inner.read().await;
        let now = Utc::now();
        matches!(guard.entries.get(&key), Some(e) if !e.is_expired(now, self.config.max_age_ms))
    }

    /// `set(thought, review)`: never fails on malformed input, including
    /// `NaN` scores or empty thoughts (spec.md §4.2 "Failure semantics").
    pub async fn set(&self, thought: &Thought, review: Review) {
        let key = fingerprint::fingerprint(thought);
        let bytes = measure_bytes(&review);
        let mut guard = self.inner.write().await;
        guard
            .entries
            .insert(key.clone(), CacheEntry::new(key, review, bytes));
        self.enforce_budgets(&mut guard.entries);
    }

    /// Remove expired entries immediately.
    pub async fn cleanup(&self) {
        let mut guard = self.inner.write().await;
        expire_stale(&mut guard.entries, self.config.max_age_ms);
    }

    pub async fn clear(&self) {
        let mut guard = self.inner.write().await;
        guard.entries.clear();
    }

    /// Stop the background cleanup timer and drop all entries.
    pub async fn destroy(&mut self) {
        if let Some(task) = self.cleanup_task.take() {
            task.abort();
        }
        self.clear().await;
    }

    pub async fn get_stats(&self) -> CacheStats {
        let guard = self.inner.read().await;
        let memory_usage: u64 = guard.entries.values().map(|e| e.bytes).sum();
        guard.stats.snapshot(guard.entries.len(), memory_usage)
    }

    /// Eviction policy (spec.md §4.2), applied in order after every `set`:
    /// expire by age, then LRU-by-count, then LRU-by-bytes.
    fn enforce_budgets(&self, entries: &mut HashMap<Fingerprint, CacheEntry>) {
        expire_stale(entries, self.config.max_age_ms);

        while entries.len() > self.config.max_entries {
            if !evict_lru(entries) {
                break;
            }
        }

        while total_bytes(entries) > self.config.max_memory_usage {
            if !evict_lru(entries) {
                break;
            }
        }
    }
}

impl Drop for AuditCache {
    fn drop(&mut self) {
        if let Some(task) = self.cleanup_task.take() {
            task.abort();
        }
    }
}

fn expire_stale(entries: &mut HashMap<Fingerprint, CacheEntry>, max_age_ms: i64) {
    let now = Utc::now();
    entries.retain(|_, entry| !entry.is_expired(now, max_age_ms));
}

fn total_bytes(entries: &HashMap<Fingerprint, CacheEntry>) -> u64 {
    entries.values().map(|e| e.bytes).sum()
}

fn evict_lru(entries: &mut HashMap<Fingerprint, CacheEntry>) -> bool {
    let oldest = entries
        .iter()
        .min_by_key(|(_, e)| e.last_access)
        .map(|(k, _)| k.clone());
    match oldest {
        Some(key) => {
            entries.remove(&key);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DimensionScore, JudgeCard, ReviewBody, Verdict};

    fn thought(text: &str, n: u32) -> Thought {
        Thought::new(n, text)
    }

    fn review(overall: f64) -> Review {
        Review {
            overall,
            dimensions: vec![DimensionScore {
                name: "correctness".into(),
                score: overall,
            }],
            verdict: Verdict::Pass,
            review: ReviewBody {
                summary: "looks good".into(),
                inline: vec![],
                citations: vec![],
            },
            proposed_diff: None,
            iterations: 1,
            judge_cards: vec![JudgeCard {
                model: "m".into(),
                score: overall,
                notes: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_cache_hit_reformatted_copy() {
        let cache = AuditCache::new(CacheConfig {
            cleanup_interval_ms: 0,
            ..Default::default()
        });
        let a = thought("```rust\nfn add(a:i32,b:i32)->i32{a+b}\n```", 1);
        let b = thought("```rust\nfn add(a: i32, b: i32) -> i32 {\n  // sum\n  a + b\n}\n```", 2);

        cache.set(&a, review(85.0)).await;
        let hit = cache.get(&b).await;
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().overall, 85.0);

        let stats = cache.get_stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_rate, 100.0);
    }

    #[tokio::test]
    async fn test_miss_increments_misses() {
        let cache = AuditCache::new(CacheConfig {
            cleanup_interval_ms: 0,
            ..Default::default()
        });
        let a = thought("```rust\nfn x(){}\n```", 1);
        assert!(cache.get(&a).await.is_none());
        let stats = cache.get_stats().await;
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_max_entries_evicts_lru() {
        let cache = AuditCache::new(CacheConfig {
            max_entries: 1,
            cleanup_interval_ms: 0,
            ..Default::default()
        });
        let a = thought("```rust\nfn a(){}\n```", 1);
        let b = thought("```rust\nfn b(){}\n```", 2);
        cache.set(&a, review(10.0)).await;
        cache.set(&b, review(20.0)).await;
        let stats = cache.get_stats().await;
        assert_eq!(stats.entries, 1);
        assert!(cache.get(&b).await.is_some());
        assert!(cache.get(&a).await.is_none());
    }

    #[tokio::test]
    async fn test_max_memory_usage_evicts_lru() {
        let small_review_bytes = measure_bytes(&review(1.0));
        let cache = AuditCache::new(CacheConfig {
            max_memory_usage: small_review_bytes + 1,
            cleanup_interval_ms: 0,
            ..Default::default()
        });
        let a = thought("```rust\nfn a(){}\n```", 1);
        let b = thought("```rust\nfn b(){}\n```", 2);
        cache.set(&a, review(1.0)).await;
        cache.set(&b, review(1.0)).await;
        let stats = cache.get_stats().await;
        assert!(stats.memory_usage <= small_review_bytes + 1);
    }

    #[tokio::test]
    async fn test_set_never_fails_on_nan_score() {
        let cache = AuditCache::new(CacheConfig {
            cleanup_interval_ms: 0,
            ..Default::default()
        });
        let a = thought("```rust\nfn a(){}\n```", 1);
        let mut r = review(f64::NAN);
        r.overall = f64::NAN;
        cache.set(&a, r).await;
        let hit = cache.get(&a).await;
        assert!(hit.is_some());
        assert!(hit.unwrap().overall.is_nan());
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired() {
        let cache = AuditCache::new(CacheConfig {
            max_age_ms: -1,
            cleanup_interval_ms: 0,
            ..Default::default()
        });
        let a = thought("```rust\nfn a(){}\n```", 1);
        cache.set(&a, review(1.0)).await;
        cache.cleanup().await;
        let stats = cache.get_stats().await;
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test]
    async fn test_clear_empties_cache() {
        let cache = AuditCache::new(CacheConfig {
            cleanup_interval_ms: 0,
            ..Default::default()
        });
        let a = thought("```rust\nfn a(){}\n```", 1);
        cache.set(&a, review(1.0)).await;
        cache.clear().await;
        assert_eq!(cache.get_stats().await.entries, 0);
    }
}

//! Cache statistics (spec.md §4.2 `getStats`).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CacheStatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStatsCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entries: usize, memory_usage: u64) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            entries,
            memory_usage,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entries: usize,
    pub memory_usage: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_zero_when_no_calls() {
        let counters = CacheStatsCounters::default();
        let stats = counters.snapshot(0, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[test]
    fn test_hit_rate_computed() {
        let counters = CacheStatsCounters::default();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        let stats = counters.snapshot(1, 10);
        assert!((stats.hit_rate - 66.666_666).abs() < 1e-3);
    }
}

//! Cache entry record (spec.md §3 "CacheEntry").

use chrono::{DateTime, Utc};

use crate::fingerprint::Fingerprint;
use crate::model::Review;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub review: Review,
    pub inserted_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub bytes: u64,
}

impl CacheEntry {
    pub fn new(fingerprint: Fingerprint, review: Review, bytes: u64) -> Self {
        let now = Utc::now();
        Self {
            fingerprint,
            review,
            inserted_at: now,
            last_access: now,
            bytes,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, max_age_ms: i64) -> bool {
        (now - self.inserted_at).num_milliseconds() > max_age_ms
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_access = now;
    }
}

/// Measure the serialized byte size of a review, per the "serialized
/// JSON length" byte-accounting decision (DESIGN.md).
pub fn measure_bytes(review: &Review) -> u64 {
    serde_json::to_vec(review).map(|v| v.len() as u64).unwrap_or(0)
}

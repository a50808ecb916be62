//! Retry backoff (spec.md §4.3: "exponential backoff ... must not
//! exceed `defaultTimeout`").
//!
//! Grounded on the teacher's `router/circuit_breaker.rs` backoff shape
//! (doubling delay per failed attempt, capped), adapted here to a flat
//! duration cap instead of an open/half-open breaker state machine —
//! the queue has no circuit to trip, only a job to re-insert.

use std::time::Duration;

const BASE_DELAY_MS: u64 = 25;

/// Delay before re-inserting a job that failed on its `attempt`-th try
/// (1-based), doubling each attempt and capped at `cap_ms`.
pub fn backoff_delay(attempt: u32, cap_ms: u64) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let raw = BASE_DELAY_MS.saturating_mul(1u64.checked_shl(exp).unwrap_or(u64::MAX));
    Duration::from_millis(raw.min(cap_ms))
}

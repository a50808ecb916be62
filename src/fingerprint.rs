//! C1 — Fingerprint: normalize a thought's code content to a stable hash.
//!
//! Deterministic and collision-resistant within a reasonable bound;
//! identical for semantically equivalent code that differs only in
//! whitespace and comments. See spec.md §4.1.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::Thought;

/// Hex-encoded fingerprint of normalized code content.
pub type Fingerprint = String;

/// Fingerprint of the well-known empty-input case. Storing under this key
/// is permitted; callers may flag such entries as validator warnings.
pub static EMPTY_FINGERPRINT: LazyLock<Fingerprint> = LazyLock::new(|| hash_normalized(""));

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n]*\n(.*?)```").unwrap());
static LINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"//[^\n]*").unwrap());
static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Compute the fingerprint of a thought's code content.
///
/// Normalization, in order:
/// 1. Extract fenced code blocks (concatenated in source order); if none
///    are found, use the whole text.
/// 2. Strip `//` line comments and `/* ... */` block comments.
/// 3. Collapse whitespace runs to a single space and trim.
/// 4. Hash the normalized bytes (case is preserved — identifiers are
///    case-sensitive).
pub fn fingerprint(thought: &Thought) -> Fingerprint {
    hash_normalized(&normalize(&thought.thought))
}

/// Normalize raw thought text per spec.md §4.1, rules 1–3. Exposed for
/// direct use by validators / tests that want to inspect the normalized
/// form without hashing it.
pub fn normalize(text: &str) -> String {
    let blocks: Vec<&str> = FENCED_BLOCK
        .captures_iter(text)
        .map(|c| c.get(1).unwrap().as_str())
        .collect();

    let source: String = if blocks.is_empty() {
        text.to_string()
    } else {
        blocks.concat()
    };

    let no_block_comments = BLOCK_COMMENT.replace_all(&source, "");
    let no_line_comments = LINE_COMMENT.replace_all(&no_block_comments, "");
    WHITESPACE_RUN
        .replace_all(&no_line_comments, " ")
        .trim()
        .to_string()
}

fn hash_normalized(normalized: &str) -> Fingerprint {
    // 128-bit-or-wider content hash of the normalized bytes. blake3 gives
    // us 256 bits at effectively the cost of a fast non-cryptographic
    // hash for this workload; we keep only its hex form.
    blake3::hash(normalized.as_bytes()).to_hex().to_string()
}

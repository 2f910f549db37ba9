//! Deterministic fingerprinting of request payloads.
//!
//! A fingerprint identifies semantically-equivalent requests for
//! deduplication (`orchestrator-retry`) and cache keying
//! (`orchestrator-cache`). It is a pure function of the *normalised*
//! query text: lowercase, whitespace-collapsed, punctuation-stripped.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Normalises free-form query text: lowercases, strips punctuation, and
/// collapses runs of whitespace to single spaces.
pub fn normalize(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut last_was_space = true; // trims leading whitespace

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            last_was_space = false;
            normalized.extend(ch.to_lowercase());
        } else if ch.is_whitespace() {
            if !last_was_space {
                normalized.push(' ');
                last_was_space = true;
            }
        }
        // all other punctuation is dropped
    }

    if normalized.ends_with(' ') {
        normalized.pop();
    }

    normalized
}

/// Computes the deterministic fingerprint of a query, as a hex string.
///
/// Uses `DefaultHasher`, whose keys are fixed (not randomized per-process),
/// so the result is stable across runs. This is a content identifier, not a
/// security boundary, so collision resistance against an adversary is not a
/// design goal.
pub fn fingerprint(text: &str) -> String {
    let normalized = normalize(text);
    let mut hasher = DefaultHasher::new();
    normalized.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Token set used for Jaccard similarity between two normalised queries.
pub fn token_set(text: &str) -> std::collections::HashSet<String> {
    normalize(text)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Jaccard similarity between the token sets of two query strings, in `[0, 1]`.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a = token_set(a);
    let set_b = token_set(b);

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

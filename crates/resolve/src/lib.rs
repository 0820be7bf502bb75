//! Identifier resolution for catalog lookups.
//!
//! Provides pure functions for turning arbitrary incoming identifiers into
//! canonical catalog keys:
//! - Canonical key detection (hyphenated UUID)
//! - Deterministic key derivation (versioned UUID v5)
//! - Short display labels
//! - Keyword tokens for fallback search

use catalogflow_model::{Resolution, ResolutionKind};
use uuid::Uuid;

/// Version tag mixed into every derived key. Changing the derivation means
/// bumping this, never editing it in place.
pub const ALGORITHM_VERSION: &str = "v1";

/// Namespace for derived catalog keys.
pub const CATALOG_NAMESPACE: Uuid = Uuid::from_u128(0x5c1e_7a0b_3f2d_4e8a_9b61_c4d2_e0f3_a7b5);

const DISPLAY_PREFIX: &str = "SKU-";
const DISPLAY_LEN: usize = 8;

/// Check whether `raw` is already a canonical key (hyphenated 8-4-4-4-12 hex).
pub fn is_canonical(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    bytes.iter().enumerate().all(|(i, b)| match i {
        8 | 13 | 18 | 23 => *b == b'-',
        _ => b.is_ascii_hexdigit(),
    })
}

/// Derive the canonical key for an arbitrary input.
///
/// Same input, same key, across processes and releases sharing
/// [`ALGORITHM_VERSION`].
pub fn derive_key(raw: &str) -> String {
    let name = format!("catalogflow:{}:{}", ALGORITHM_VERSION, raw);
    Uuid::new_v5(&CATALOG_NAMESPACE, name.as_bytes())
        .hyphenated()
        .to_string()
}

/// Resolve a raw identifier to a canonical key. Total over all strings.
pub fn resolve(raw_id: &str) -> Resolution {
    let trimmed = raw_id.trim();

    if is_canonical(trimmed) {
        return Resolution {
            canonical_id: trimmed.to_ascii_lowercase(),
            source_kind: ResolutionKind::DirectMatch,
            original_input: raw_id.to_string(),
        };
    }

    Resolution {
        canonical_id: derive_key(raw_id),
        source_kind: ResolutionKind::Generated,
        original_input: raw_id.to_string(),
    }
}

/// Short human-readable label for a canonical key, e.g. `SKU-3F2A9C01`.
///
/// Non-canonical input is resolved first, so every string maps to a label.
pub fn display_id(canonical_id: &str) -> String {
    let key = if is_canonical(canonical_id) {
        canonical_id.to_string()
    } else {
        resolve(canonical_id).canonical_id
    };

    let head: String = key
        .chars()
        .filter(|c| *c != '-')
        .take(DISPLAY_LEN)
        .collect();
    format!("{}{}", DISPLAY_PREFIX, head.to_ascii_uppercase())
}

/// Normalize text for case-insensitive matching: lowercase, single spaces.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract search keywords from an identifier such as `wireless-headphones-42`.
///
/// Splits on anything non-alphanumeric, drops purely numeric and single-char
/// tokens, and removes duplicates keeping the first occurrence.
pub fn search_tokens(raw_id: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();

    for token in raw_id
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
    {
        if token.chars().count() < 2 || token.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }

    tokens
}

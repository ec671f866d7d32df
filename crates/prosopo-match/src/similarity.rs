//! Similarity scoring
//!
//! Scores two normalized name keys against each other. Tiers are
//! evaluated in fixed priority order, first match wins:
//!
//! 1. Exact equality -> 1.0, `exact`
//! 2. Substring containment -> min_len/max_len, `alias`
//! 3. Token-sort fuzzy ratio -> [0, 1], `fuzzy`
//!
//! The alias score rewards near-equal-length containment over, say, a
//! single initial contained in a full name.

use prosopo_core::MatchTier;

/// Score two normalized strings, returning the score and its tier.
pub fn score(a: &str, b: &str) -> (f32, MatchTier) {
    if a == b {
        return (1.0, MatchTier::Exact);
    }

    if a.contains(b) || b.contains(a) {
        let la = a.chars().count();
        let lb = b.chars().count();
        let (min, max) = if la < lb { (la, lb) } else { (lb, la) };
        let alias = if max == 0 { 0.0 } else { min as f32 / max as f32 };
        return (alias, MatchTier::Alias);
    }

    (token_sort_ratio(a, b) as f32, MatchTier::Fuzzy)
}

/// Token-order-insensitive similarity ratio in [0, 1].
///
/// Sorts the whitespace tokens of both strings and compares the joined
/// forms with a normalized Levenshtein distance, so "guy of lusignan"
/// and "lusignan guy of" compare as near-equal.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&sort_tokens(a), &sort_tokens(b))
}

fn sort_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

//! Name normalization
//!
//! Canonicalizes raw name strings into comparable keys. Two names with
//! the same key are treated as the same normalized identity by every
//! fast-path lookup in the system.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Normalize a raw name into a comparable key.
///
/// Applies, in order: NFKD decomposition, removal of combining marks,
/// replacement of non-word characters with spaces, whitespace collapse,
/// lowercasing, trim. Total over all inputs; empty or whitespace-only
/// input yields the empty string, which callers treat as unmatchable.
pub fn normalize(s: &str) -> String {
    s.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive a deterministic ASCII slug from a name.
///
/// Used for `EXTRACTED:` entity identifiers; the same name always
/// produces the same slug. Falls back to "person" when nothing survives.
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut gap = false;
    for c in s.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if gap && !slug.is_empty() {
                slug.push('-');
            }
            gap = false;
            slug.push(c);
        } else {
            gap = true;
        }
    }
    if slug.is_empty() {
        "person".to_string()
    } else {
        slug
    }
}

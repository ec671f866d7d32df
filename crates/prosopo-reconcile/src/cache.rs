//! Reconciliation cache
//!
//! Persistent cache of reconciliation results keyed by document id and
//! normalized mention name. Loaded at the start of a run and persisted
//! at the end, so repeated runs skip names already queried. Merging
//! across runs is last-write-wins per key; entries are never duplicated.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use prosopo_core::{CoreError, Result};

use crate::client::ReconCandidate;

/// One cached reconciliation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedQuery {
    /// The mention's display name as queried
    pub person: String,

    /// Ranked candidates returned for the name
    pub candidates: Vec<ReconCandidate>,

    /// When the external service was queried
    pub queried_at: DateTime<Utc>,
}

/// Persistent reconciliation cache with an explicit lifecycle:
/// load at start, persist at end. Tests inject an empty or pre-seeded
/// cache instead of sharing global state.
#[derive(Debug, Default)]
pub struct ReconCache {
    /// document id -> normalized name -> result
    documents: BTreeMap<String, BTreeMap<String, CachedQuery>>,
    stats: CacheStats,
}

impl ReconCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a cache file, tolerating absence and corruption.
    ///
    /// A missing file is a normal first run; an unreadable file is
    /// discarded with a warning rather than blocking reconciliation.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::new();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(documents) => Self {
                    documents,
                    stats: CacheStats::default(),
                },
                Err(e) => {
                    warn!("discarding unreadable cache {}: {e}", path.display());
                    Self::new()
                }
            },
            Err(e) => {
                warn!("discarding unreadable cache {}: {e}", path.display());
                Self::new()
            }
        }
    }

    /// Write the cache to a file
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let json =
            serde_json::to_string_pretty(&self.documents).map_err(|e| CoreError::Parse {
                path: "<reconciliation cache>".to_string(),
                message: e.to_string(),
            })?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Check whether a key was already queried, recording hit/miss
    pub fn contains(&self, doc_id: &str, key: &str) -> bool {
        let hit = self
            .documents
            .get(doc_id)
            .is_some_and(|names| names.contains_key(key));
        if hit {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        hit
    }

    /// Look up a cached result
    pub fn get(&self, doc_id: &str, key: &str) -> Option<&CachedQuery> {
        self.documents.get(doc_id)?.get(key)
    }

    /// Store a result, replacing any previous entry for the key
    pub fn insert(&mut self, doc_id: &str, key: &str, query: CachedQuery) {
        self.documents
            .entry(doc_id.to_string())
            .or_default()
            .insert(key.to_string(), query);
        self.stats.record_write();
    }

    /// Total cached entries across all documents
    pub fn len(&self) -> usize {
        self.documents.values().map(BTreeMap::len).sum()
    }

    /// True if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache statistics for this run
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

/// Hit/miss/write counters for cache monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Total hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Total misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Total writes
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(person: &str) -> CachedQuery {
        CachedQuery {
            person: person.to_string(),
            candidates: Vec::new(),
            queried_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_and_contains() {
        let mut cache = ReconCache::new();
        assert!(!cache.contains("doc-1", "baldwin"));

        cache.insert("doc-1", "baldwin", cached("Baldwin"));
        assert!(cache.contains("doc-1", "baldwin"));
        assert!(!cache.contains("doc-2", "baldwin"));

        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 2);
        assert_eq!(cache.stats().writes(), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let mut cache = ReconCache::new();
        cache.insert("doc-1", "baldwin", cached("Baldwin"));
        cache.insert("doc-1", "baldwin", cached("Baldwin II"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("doc-1", "baldwin").unwrap().person, "Baldwin II");
    }

    #[test]
    fn test_persist_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wikidata_matches.json");

        let mut cache = ReconCache::new();
        cache.insert("doc-1", "baldwin", cached("Baldwin"));
        cache.persist(&path).unwrap();

        let loaded = ReconCache::load(&path);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("doc-1", "baldwin").unwrap().person, "Baldwin");
    }

    #[test]
    fn test_missing_file_is_empty_cache() {
        let cache = ReconCache::load("/nonexistent/cache.json");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = ReconCache::load(&path);
        assert!(cache.is_empty());
    }
}

//! Reconciliation runner
//!
//! Walks linked documents, selects the mentions nothing internal could
//! resolve, and queries the external knowledge base for each one not
//! already cached.

use chrono::Utc;
use tracing::info;

use prosopo_core::{DocumentRecord, LinkStatus};
use prosopo_match::normalize;

use crate::cache::{CachedQuery, ReconCache};
use crate::client::Reconciler;

/// Counts reported after a reconciliation pass
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOutcome {
    /// Names newly queried against the external service
    pub queried: usize,

    /// Names skipped because the cache already held them
    pub skipped: usize,
}

/// Reconcile every unmatched, non-collective mention across documents.
///
/// Only links with `no_match` status are considered; collectives and
/// names shorter than three characters are skipped. Results land in the
/// cache keyed by `(document id, normalized name)`.
pub async fn reconcile_documents(
    reconciler: &Reconciler,
    documents: &[DocumentRecord],
    cache: &mut ReconCache,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    for doc in documents {
        let unmatched: Vec<_> = doc
            .links
            .iter()
            .filter(|link| link.status == LinkStatus::NoMatch)
            .collect();
        if unmatched.is_empty() {
            continue;
        }
        info!("[{}] {} unmatched persons", doc.doc_id, unmatched.len());

        for link in unmatched {
            let person = link.mention.trim();
            if person.chars().count() < 3 || link.group {
                continue;
            }

            let key = normalize(person);
            if key.is_empty() || cache.contains(&doc.doc_id, &key) {
                outcome.skipped += 1;
                continue;
            }

            info!("querying: {person}");
            let candidates = reconciler.reconcile(person).await;
            cache.insert(
                &doc.doc_id,
                &key,
                CachedQuery {
                    person: person.to_string(),
                    candidates,
                    queried_at: Utc::now(),
                },
            );
            outcome.queried += 1;
        }
    }

    info!(
        "reconciliation done: {} queried, {} cached",
        outcome.queried, outcome.skipped
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use prosopo_core::{Link, ReconcileConfig, Result};

    use crate::client::{EntitySearch, SearchHit};

    struct EmptyBackend;

    #[async_trait]
    impl EntitySearch for EmptyBackend {
        async fn search_humans(&self, _name: &str, _limit: usize) -> Result<Vec<SearchHit>> {
            Ok(vec![SearchHit {
                id: "Q1".to_string(),
                label: "Baldwin".to_string(),
                description: "crusader".to_string(),
            }])
        }

        async fn person_dates(&self, _qid: &str) -> Result<(Option<i32>, Option<i32>)> {
            Ok((None, None))
        }
    }

    fn no_match_link(name: &str, group: bool) -> Link {
        Link {
            mention: name.to_string(),
            group,
            candidates: Vec::new(),
            best: None,
            confidence: 0.0,
            status: LinkStatus::NoMatch,
        }
    }

    fn document(doc_id: &str, links: Vec<Link>) -> DocumentRecord {
        DocumentRecord {
            doc_id: doc_id.to_string(),
            source_file: None,
            persons: Vec::new(),
            links,
        }
    }

    fn reconciler() -> Reconciler {
        Reconciler::with_backend(Box::new(EmptyBackend), ReconcileConfig::default())
    }

    #[tokio::test]
    async fn test_only_no_match_links_queried() {
        let docs = vec![document(
            "doc-1",
            vec![
                no_match_link("Kerbogha", false),
                Link {
                    status: LinkStatus::High,
                    ..no_match_link("Baldwin", false)
                },
            ],
        )];
        let mut cache = ReconCache::new();

        let outcome = reconcile_documents(&reconciler(), &docs, &mut cache).await;
        assert_eq!(outcome.queried, 1);
        assert!(cache.contains("doc-1", "kerbogha"));
        assert!(!cache.contains("doc-1", "baldwin"));
    }

    #[tokio::test]
    async fn test_collectives_and_short_names_skipped() {
        let docs = vec![document(
            "doc-1",
            vec![
                no_match_link("the Franks", true),
                no_match_link("Ed", false),
            ],
        )];
        let mut cache = ReconCache::new();

        let outcome = reconcile_documents(&reconciler(), &docs, &mut cache).await;
        assert_eq!(outcome.queried, 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cached_names_not_requeried() {
        let docs = vec![document("doc-1", vec![no_match_link("Kerbogha", false)])];
        let mut cache = ReconCache::new();

        let first = reconcile_documents(&reconciler(), &docs, &mut cache).await;
        assert_eq!(first.queried, 1);

        let second = reconcile_documents(&reconciler(), &docs, &mut cache).await;
        assert_eq!(second.queried, 0);
        assert_eq!(second.skipped, 1);
    }

    #[tokio::test]
    async fn test_results_stored_with_candidates() {
        let docs = vec![document("doc-1", vec![no_match_link("Kerbogha", false)])];
        let mut cache = ReconCache::new();

        reconcile_documents(&reconciler(), &docs, &mut cache).await;
        let entry = cache.get("doc-1", "kerbogha").unwrap();
        assert_eq!(entry.person, "Kerbogha");
        assert_eq!(entry.candidates.len(), 1);
        assert_eq!(entry.candidates[0].qid, "Q1");
    }
}

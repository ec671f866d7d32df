//! Mention linking
//!
//! Resolves extracted person mentions against the authority index. One
//! link per non-empty mention, in input order; repeated mentions of the
//! same name against the same best candidate are collapsed afterwards so
//! that a name recurring verbatim in one document counts as one fact,
//! not N independent facts.

use std::collections::HashMap;

use tracing::debug;

use prosopo_core::{AuthorityEntry, Candidate, Link, MatchConfig, MatchTier, PersonMention};

use crate::normalize::normalize;
use crate::similarity::score;

/// Links mentions to authority entries under a matching configuration.
#[derive(Debug, Clone, Default)]
pub struct Linker {
    config: MatchConfig,
}

impl Linker {
    /// Create a linker with the default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a linker with a custom matching configuration
    pub fn with_config(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Link every mention against the index.
    ///
    /// Mentions whose normalized name is empty are skipped, which is
    /// intentional and not an error. An empty index degrades to
    /// all-no-match links rather than failing.
    pub fn link(&self, mentions: &[PersonMention], index: &[AuthorityEntry]) -> Vec<Link> {
        let mut links = Vec::with_capacity(mentions.len());
        for mention in mentions {
            if let Some(link) = self.link_one(mention, index) {
                links.push(link);
            }
        }
        dedupe(links)
    }

    fn link_one(&self, mention: &PersonMention, index: &[AuthorityEntry]) -> Option<Link> {
        let name = mention.name.trim();
        let norm = normalize(name);
        if norm.is_empty() {
            debug!("skipping mention with unmatchable name: {:?}", mention.raw_mention);
            return None;
        }

        let mut scored: Vec<Candidate> = Vec::new();
        for entry in index {
            if let Some(candidate) = self.best_variant(&norm, entry) {
                scored.push(candidate);
            }
        }

        // Stable by construction: entries at equal score keep index order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.config.top_k);

        let best = scored.first().cloned();
        let confidence = best.as_ref().map(|c| c.score).unwrap_or(0.0);
        let status = self.config.classify(confidence);

        Some(Link {
            mention: name.to_string(),
            group: mention.group,
            candidates: scored,
            best,
            confidence,
            status,
        })
    }

    /// Score a mention against one entry's full variant set, keeping the
    /// single best variant so the entry cannot appear twice.
    fn best_variant(&self, norm: &str, entry: &AuthorityEntry) -> Option<Candidate> {
        let mut best_score = 0.0f32;
        let mut best_tier = MatchTier::Fuzzy;

        for variant_norm in &entry.norms {
            let (s, tier) = score(norm, variant_norm);
            if s > best_score {
                best_score = s;
                best_tier = tier;
            }
            if best_tier == MatchTier::Exact {
                break;
            }
        }

        if best_score < self.config.min_score {
            return None;
        }

        Some(Candidate {
            id: entry.id.clone(),
            label: entry.label.clone(),
            entity_type: entry.entity_type.clone(),
            score: best_score,
            tier: best_tier,
            evidence: format!("{best_tier} match: '{norm}' ~ '{}'", entry.label),
        })
    }
}

/// Collapse links sharing `(mention name, best candidate id)`, keeping
/// the higher confidence. The no-match pseudo-id participates so that
/// repeated unmatched names also collapse.
fn dedupe(links: Vec<Link>) -> Vec<Link> {
    let mut seen: HashMap<(String, String), usize> = HashMap::new();
    let mut deduped: Vec<Link> = Vec::with_capacity(links.len());

    for link in links {
        let key = (link.mention.clone(), link.best_id().to_string());
        match seen.get(&key) {
            Some(&i) => {
                if link.confidence > deduped[i].confidence {
                    deduped[i] = link;
                }
            }
            None => {
                seen.insert(key, deduped.len());
                deduped.push(link);
            }
        }
    }

    deduped
}

#[cfg(test)]
mod tests {
    use super::*;
    use prosopo_core::LinkStatus;

    fn baldwin_index() -> Vec<AuthorityEntry> {
        vec![AuthorityEntry {
            id: "AUTH:1".to_string(),
            label: "Baldwin".to_string(),
            entity_type: "person".to_string(),
            variants: vec![
                "Baldwin".to_string(),
                "Baldwin of Boulogne".to_string(),
                "Baldwin I".to_string(),
            ],
            norms: vec![
                "baldwin".to_string(),
                "baldwin of boulogne".to_string(),
                "baldwin i".to_string(),
            ],
            toponym: None,
        }]
    }

    #[test]
    fn test_exact_variant_match_is_high() {
        let linker = Linker::new();
        let links = linker.link(&[PersonMention::named("Baldwin")], &baldwin_index());

        assert_eq!(links.len(), 1);
        let link = &links[0];
        assert_eq!(link.status, LinkStatus::High);
        assert_eq!(link.confidence, 1.0);
        assert_eq!(link.best.as_ref().unwrap().id, "AUTH:1");
        assert_eq!(link.best.as_ref().unwrap().tier, MatchTier::Exact);
    }

    #[test]
    fn test_misspelling_is_fuzzy_below_high() {
        let linker = Linker::new();
        let links = linker.link(&[PersonMention::named("Baldwyn")], &baldwin_index());

        let link = &links[0];
        let best = link.best.as_ref().unwrap();
        assert_eq!(best.tier, MatchTier::Fuzzy);
        assert!(link.confidence >= 0.60 && link.confidence < 0.90);
        assert!(matches!(link.status, LinkStatus::Medium | LinkStatus::Low));
    }

    #[test]
    fn test_entry_appears_at_most_once() {
        let linker = Linker::new();
        // "Baldwin I" matches two variants exactly and by containment;
        // the entry must still yield one candidate.
        let links = linker.link(&[PersonMention::named("Baldwin I")], &baldwin_index());
        assert_eq!(links[0].candidates.len(), 1);
    }

    #[test]
    fn test_empty_mention_skipped() {
        let linker = Linker::new();
        let links = linker.link(
            &[PersonMention::named("   "), PersonMention::named("Baldwin")],
            &baldwin_index(),
        );
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].mention, "Baldwin");
    }

    #[test]
    fn test_empty_index_degrades_to_no_match() {
        let linker = Linker::new();
        let links = linker.link(&[PersonMention::named("Baldwin")], &[]);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].status, LinkStatus::NoMatch);
        assert!(links[0].candidates.is_empty());
        assert_eq!(links[0].confidence, 0.0);
    }

    #[test]
    fn test_repeated_mentions_collapse() {
        let linker = Linker::new();
        let links = linker.link(
            &[
                PersonMention::named("Baldwin"),
                PersonMention::named("Baldwin"),
                PersonMention::named("Baldwin"),
            ],
            &baldwin_index(),
        );
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_repeated_no_match_mentions_collapse() {
        let linker = Linker::new();
        let links = linker.link(
            &[
                PersonMention::named("Zengi"),
                PersonMention::named("Zengi"),
            ],
            &baldwin_index(),
        );
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].status, LinkStatus::NoMatch);
    }

    #[test]
    fn test_top_k_respected() {
        let mut index = baldwin_index();
        for i in 2..8 {
            index.push(AuthorityEntry {
                id: format!("AUTH:{i}"),
                label: "Baldwin".to_string(),
                entity_type: "person".to_string(),
                variants: vec!["Baldwin".to_string()],
                norms: vec!["baldwin".to_string()],
                toponym: None,
            });
        }
        let linker = Linker::new();
        let links = linker.link(&[PersonMention::named("Baldwin")], &index);
        assert_eq!(links[0].candidates.len(), 3);
    }

    #[test]
    fn test_input_order_preserved() {
        let linker = Linker::new();
        let links = linker.link(
            &[
                PersonMention::named("Zengi"),
                PersonMention::named("Baldwin"),
            ],
            &baldwin_index(),
        );
        assert_eq!(links[0].mention, "Zengi");
        assert_eq!(links[1].mention, "Baldwin");
    }

    #[test]
    fn test_collective_flag_carried() {
        let linker = Linker::new();
        let links = linker.link(
            &[PersonMention::named("the Franks").collective()],
            &baldwin_index(),
        );
        assert!(links[0].group);
    }
}

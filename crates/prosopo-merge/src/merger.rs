//! Multi-source merging
//!
//! Builds the unified graph from three inputs in descending trust
//! order: the curated authority file seeds the graph, the structured
//! export is matched against it by normalized label, and extracted
//! mentions fill in what neither source covers. Matching here is
//! exact-normalized only; ambiguity refuses to merge rather than
//! guessing. Steps after seeding are purely additive, so the graph is
//! always a superset of the authority source.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use prosopo_core::{
    AuthorityEntry, DocumentRecord, MatchTier, Place, SourceAttribution, SourceKind,
    UnifiedEntity,
};
use prosopo_match::{normalize, slugify};

use crate::graph::UnifiedGraph;
use crate::wikidata::WikidataPerson;

/// Names shorter than this are too ambiguous to synthesize entities from.
const MIN_MENTION_CHARS: usize = 3;

/// Merges authority, export and extraction sources into a unified graph.
///
/// The run timestamp is injected so that merging the same inputs twice
/// produces byte-identical output; the CLI passes the wall clock, tests
/// pin a constant.
#[derive(Debug, Clone)]
pub struct Merger {
    run_at: DateTime<Utc>,
}

impl Merger {
    /// Create a merger stamping provenance with the given run timestamp
    pub fn new(run_at: DateTime<Utc>) -> Self {
        Self { run_at }
    }

    /// Merge the three sources into one unified graph.
    pub fn merge(
        &self,
        authority: &[AuthorityEntry],
        export: &BTreeMap<String, WikidataPerson>,
        documents: &[DocumentRecord],
    ) -> UnifiedGraph {
        let mut graph = UnifiedGraph::new();

        // 1. Seed 1:1 from the authority source, highest trust.
        for entry in authority {
            graph.insert(self.seed_entity(entry));
        }
        info!("seeded {} authority entities", graph.len());

        // 2. Reverse index over every authority name variant. Ambiguity
        //    (one normalized name shared by several ids) is preserved.
        let mut auth_by_norm: HashMap<&str, Vec<&str>> = HashMap::new();
        for entry in authority {
            for norm in &entry.norms {
                auth_by_norm.entry(norm).or_default().push(&entry.id);
            }
        }

        // 3-4. Match export records against the authority; a match is
        //      only auto-applied on exactly one candidate id. Everything
        //      else becomes its own entity, so the graph is a superset
        //      of both sources.
        let mut export_norms: HashSet<String> = HashSet::new();
        let mut matched = 0usize;
        for (qid, person) in export {
            let norm = normalize(&person.label);
            if !norm.is_empty() {
                export_norms.insert(norm.clone());
            }

            match auth_by_norm.get(norm.as_str()).map(Vec::as_slice) {
                Some([auth_id]) => {
                    // Identifier and provenance only; the export's own
                    // fields stay on its side of the asymmetry.
                    if let Some(entity) = graph.get_mut(auth_id) {
                        entity
                            .identifiers
                            .insert("wikidata_qid".to_string(), qid.clone());
                        entity.provenance.record(
                            SourceAttribution {
                                kind: SourceKind::Wikidata,
                                source_file: None,
                                match_tier: Some(MatchTier::Exact),
                                confidence: 1.0,
                            },
                            self.run_at,
                        );
                        matched += 1;
                    }
                }
                Some(ids) => {
                    debug!(
                        "refusing ambiguous merge of {qid} ({:?}): {} authority candidates",
                        person.label,
                        ids.len()
                    );
                    graph.insert_new(self.export_entity(qid, person));
                }
                None => {
                    graph.insert_new(self.export_entity(qid, person));
                }
            }
        }
        info!("matched {matched} export records to authority entities");

        // 5. Extracted mentions: names already represented by any
        //    authority or export normalized form are presence-only
        //    skipped; the rest synthesize reviewable entities.
        let mut synthesized = 0usize;
        for doc in documents {
            for mention in &doc.persons {
                let name = mention.name.trim();
                if name.chars().count() < MIN_MENTION_CHARS {
                    continue;
                }
                let norm = normalize(name);
                if norm.is_empty() {
                    continue;
                }
                if auth_by_norm.contains_key(norm.as_str()) || export_norms.contains(&norm) {
                    continue;
                }

                let id = format!("EXTRACTED:{}", slugify(name));
                match graph.get_mut(&id) {
                    Some(entity) => {
                        // Same unmatched name seen in another document:
                        // record the extra contribution, keep one entity.
                        entity.provenance.record(
                            self.extraction_attribution(doc, mention.confidence),
                            self.run_at,
                        );
                    }
                    None => {
                        let mut entity = UnifiedEntity::new(
                            id,
                            name,
                            self.extraction_attribution(doc, mention.confidence),
                            self.run_at,
                        )
                        .with_variant(name, norm)
                        .needs_review();
                        entity.bio.gender = mention.gender;
                        graph.insert(entity);
                        synthesized += 1;
                    }
                }
            }
        }
        info!("synthesized {synthesized} extraction-only entities");

        graph
    }

    fn seed_entity(&self, entry: &AuthorityEntry) -> UnifiedEntity {
        let mut entity = UnifiedEntity::new(
            &entry.id,
            &entry.label,
            SourceAttribution {
                kind: SourceKind::Authority,
                source_file: None,
                match_tier: None,
                confidence: 1.0,
            },
            self.run_at,
        )
        .with_identifier("authority", &entry.id);

        entity.names.variants = entry.variants.clone();
        entity.names.normalized = entry.norms.clone();
        if let Some(toponym) = &entry.toponym {
            entity.places.push(Place {
                kind: "title_seat".to_string(),
                label: toponym.clone(),
            });
        }
        entity
    }

    fn export_entity(&self, qid: &str, person: &WikidataPerson) -> UnifiedEntity {
        let norm = normalize(&person.label);
        let mut entity = UnifiedEntity::new(
            format!("WIKIDATA:{qid}"),
            &person.label,
            SourceAttribution {
                kind: SourceKind::Wikidata,
                source_file: None,
                match_tier: None,
                confidence: 1.0,
            },
            self.run_at,
        )
        .with_identifier("wikidata_qid", qid)
        .with_variant(&person.label, norm);

        entity.bio.birth = person.birth.clone();
        entity.bio.death = person.death.clone();
        entity.bio.floruit = person.floruit.clone();
        entity.bio.gender = person.gender;
        entity.roles = person.roles.clone();
        entity.relationships = person.relationships.clone();
        entity
    }

    fn extraction_attribution(&self, doc: &DocumentRecord, confidence: f32) -> SourceAttribution {
        SourceAttribution {
            kind: SourceKind::Extraction,
            source_file: Some(doc.doc_id.clone()),
            match_tier: None,
            confidence,
        }
    }
}

//! Unified graph container
//!
//! A single mapping from canonical id to unified entity. Backed by an
//! ordered map so that identical inputs always serialize to identical
//! bytes, which is what makes re-merging idempotent end to end.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use prosopo_core::{CoreError, Result, UnifiedEntity};

/// The unified entity graph, keyed by canonical id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnifiedGraph {
    entities: BTreeMap<String, UnifiedEntity>,
}

impl UnifiedGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities in the graph
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if the graph holds no entities
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// True if an entity with this canonical id exists
    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Look up an entity by canonical id
    pub fn get(&self, id: &str) -> Option<&UnifiedEntity> {
        self.entities.get(id)
    }

    /// Look up an entity mutably by canonical id
    pub fn get_mut(&mut self, id: &str) -> Option<&mut UnifiedEntity> {
        self.entities.get_mut(id)
    }

    /// Insert an entity under its own canonical id
    pub fn insert(&mut self, entity: UnifiedEntity) {
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Insert an entity only if its id is not yet taken, returning
    /// whether it was inserted
    pub fn insert_new(&mut self, entity: UnifiedEntity) -> bool {
        if self.entities.contains_key(&entity.id) {
            return false;
        }
        self.entities.insert(entity.id.clone(), entity);
        true
    }

    /// Iterate entities in canonical-id order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &UnifiedEntity)> {
        self.entities.iter()
    }

    /// Per-source breakdown of the graph
    pub fn breakdown(&self) -> GraphBreakdown {
        let mut b = GraphBreakdown {
            total: self.entities.len(),
            ..Default::default()
        };
        for entity in self.entities.values() {
            if entity.identifiers.contains_key("wikidata_qid") {
                b.with_wikidata += 1;
            }
            if entity.identifiers.contains_key("authority") {
                b.with_authority += 1;
            }
            if entity.flags.needs_review {
                b.needs_review += 1;
            }
        }
        b
    }

    /// Serialize the graph to pretty JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::Parse {
            path: "<unified graph>".to_string(),
            message: e.to_string(),
        })
    }

    /// Write the graph to a file
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.to_json_pretty()?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Load a graph previously written with [`UnifiedGraph::persist`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| CoreError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Summary counts over a unified graph
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GraphBreakdown {
    /// Total entities
    pub total: usize,

    /// Entities carrying an external export identifier
    pub with_wikidata: usize,

    /// Entities carrying a curated authority identifier
    pub with_authority: usize,

    /// Extraction-only entities awaiting curation
    pub needs_review: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use prosopo_core::{SourceAttribution, SourceKind};

    fn entity(id: &str) -> UnifiedEntity {
        UnifiedEntity::new(
            id,
            "Test",
            SourceAttribution {
                kind: SourceKind::Authority,
                source_file: None,
                match_tier: None,
                confidence: 1.0,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_insert_new_refuses_duplicates() {
        let mut graph = UnifiedGraph::new();
        assert!(graph.insert_new(entity("AUTH:1")));
        assert!(!graph.insert_new(entity("AUTH:1")));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_breakdown_counts() {
        let mut graph = UnifiedGraph::new();
        graph.insert(entity("AUTH:1").with_identifier("authority", "AUTH:1"));
        graph.insert(
            entity("WIKIDATA:Q1").with_identifier("wikidata_qid", "Q1"),
        );
        graph.insert(entity("EXTRACTED:x").needs_review());

        let b = graph.breakdown();
        assert_eq!(b.total, 3);
        assert_eq!(b.with_authority, 1);
        assert_eq!(b.with_wikidata, 1);
        assert_eq!(b.needs_review, 1);
    }

    #[test]
    fn test_persist_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unified_kg.json");

        let mut graph = UnifiedGraph::new();
        graph.insert(entity("AUTH:1"));
        graph.persist(&path).unwrap();

        let loaded = UnifiedGraph::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains("AUTH:1"));
    }

    #[test]
    fn test_serialization_is_insertion_order_independent() {
        let at = Utc::now();
        let pinned = |id: &str| {
            UnifiedEntity::new(
                id,
                "Test",
                SourceAttribution {
                    kind: SourceKind::Authority,
                    source_file: None,
                    match_tier: None,
                    confidence: 1.0,
                },
                at,
            )
        };

        let mut a = UnifiedGraph::new();
        a.insert(pinned("B"));
        a.insert(pinned("A"));

        let mut b = UnifiedGraph::new();
        b.insert(pinned("A"));
        b.insert(pinned("B"));

        assert_eq!(a.to_json_pretty().unwrap(), b.to_json_pretty().unwrap());
    }
}

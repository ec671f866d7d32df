//! Prosopo Core - Domain models and shared types
//!
//! This crate defines the core abstractions used throughout the system:
//! - Person mentions as produced by the extraction step
//! - Flattened authority index entries
//! - Match candidates, links and their status classification
//! - Unified entities with cross-source identifiers and provenance
//! - Common error types
//! - Configuration management

pub mod config;

pub use config::{AppConfig, ConfigError, LoggingConfig, MatchConfig, ReconcileConfig};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for pipeline operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Schema violation in {path}: {message}")]
    Schema { path: String, message: String },

    #[error("External service error: {0}")]
    External(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================================================
// Person Mentions
// ============================================================================

/// Gender of a mentioned person, as reported by the extraction step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    M,
    F,
    #[default]
    Unknown,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::M => write!(f, "m"),
            Self::F => write!(f, "f"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One occurrence of a person name in a source text.
///
/// Produced by the external extraction step; immutable once created.
/// Every field except `name` may be absent in upstream output, so all
/// carry serde defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonMention {
    /// Normalised display name chosen by the extractor
    #[serde(default)]
    pub name: String,

    /// Exact text span as it appears in the source
    #[serde(default)]
    pub raw_mention: String,

    /// Title or office, e.g. "Count", "Bishop"
    #[serde(default)]
    pub title: Option<String>,

    /// Epithet, e.g. "the Lion"
    #[serde(default)]
    pub epithet: Option<String>,

    /// Place associated with the person, e.g. "Flanders"
    #[serde(default)]
    pub toponym: Option<String>,

    /// Role in the narrative, e.g. "pilgrim", "knight"
    #[serde(default)]
    pub role: Option<String>,

    /// Gender if the extractor could determine it
    #[serde(default)]
    pub gender: Gender,

    /// True if the mention denotes a collective (army, ethnic group)
    #[serde(default)]
    pub group: bool,

    /// Surrounding ~100-character snippet
    #[serde(default)]
    pub context: String,

    /// Extraction confidence in [0, 1]
    #[serde(default)]
    pub confidence: f32,

    /// Character offset in the source text, if known
    #[serde(default)]
    pub source_offset: Option<usize>,
}

impl PersonMention {
    /// Create a mention carrying only a name, for tests and synthetic input
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            raw_mention: name.clone(),
            name,
            title: None,
            epithet: None,
            toponym: None,
            role: None,
            gender: Gender::Unknown,
            group: false,
            context: String::new(),
            confidence: 0.5,
            source_offset: None,
        }
    }

    /// Set the extraction confidence
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Mark the mention as a collective
    pub fn collective(mut self) -> Self {
        self.group = true;
        self
    }
}

// ============================================================================
// Authority Entries
// ============================================================================

/// A flattened, queryable authority entry.
///
/// Built once per run by the index builder and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityEntry {
    /// Stable identifier, e.g. "AUTH:1"
    pub id: String,

    /// Preferred display label
    pub label: String,

    /// Entity type
    pub entity_type: String,

    /// Human-readable name variants, one per distinct normalized form
    pub variants: Vec<String>,

    /// Normalized forms of every variant, parallel to `variants`
    pub norms: Vec<String>,

    /// Seat of the person's title, when the curated name block carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toponym: Option<String>,
}

// ============================================================================
// Candidates and Links
// ============================================================================

/// Which tier of the matching cascade produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Exact,
    Alias,
    Fuzzy,
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Alias => write!(f, "alias"),
            Self::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

/// A scored match between one mention and one authority or external entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Target identifier
    pub id: String,

    /// Target display label
    pub label: String,

    /// Target entity type
    #[serde(rename = "type")]
    pub entity_type: String,

    /// Match score in [0, 1]
    pub score: f32,

    /// Matching tier that produced the score
    pub tier: MatchTier,

    /// Human-readable evidence string
    pub evidence: String,
}

/// Confidence classification of a resolved link.
///
/// Ordered from worst to best so that status comparisons follow
/// confidence comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    NoMatch,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMatch => write!(f, "no_match"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// The resolved outcome for one mention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    /// The mention's display name
    pub mention: String,

    /// True if the mention denotes a collective
    #[serde(default)]
    pub group: bool,

    /// Ranked candidate list, best first, at most top-K entries
    pub candidates: Vec<Candidate>,

    /// Best candidate, if any met the score floor
    pub best: Option<Candidate>,

    /// Confidence carried from the best candidate, 0.0 if none
    pub confidence: f32,

    /// Status derived from confidence under the configured thresholds
    pub status: LinkStatus,
}

impl Link {
    /// Identifier of the best candidate, or the no-match pseudo-id.
    ///
    /// Used as half of the deduplication key for repeated mentions.
    pub fn best_id(&self) -> &str {
        self.best.as_ref().map(|c| c.id.as_str()).unwrap_or("__none__")
    }
}

// ============================================================================
// Per-document Pipeline Artifacts
// ============================================================================

/// One document's extraction + linking output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Stable document identifier
    #[serde(default)]
    pub doc_id: String,

    /// Original source file path, if recorded
    #[serde(default)]
    pub source_file: Option<String>,

    /// Extracted person mentions
    #[serde(default)]
    pub persons: Vec<PersonMention>,

    /// Resolved links, one per retained mention
    #[serde(default)]
    pub links: Vec<Link>,
}

// ============================================================================
// Unified Entities
// ============================================================================

/// Which source contributed a fact to a unified entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Authority,
    Wikidata,
    Extraction,
    Reconciliation,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authority => write!(f, "authority"),
            Self::Wikidata => write!(f, "wikidata"),
            Self::Extraction => write!(f, "extraction"),
            Self::Reconciliation => write!(f, "reconciliation"),
        }
    }
}

/// One provenance entry: a source that contributed to an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttribution {
    /// Kind of contributing source
    #[serde(rename = "type")]
    pub kind: SourceKind,

    /// Source file, if the contribution came from a file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,

    /// Matching tier, for contributions that arrived via a match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_tier: Option<MatchTier>,

    /// Confidence of the contribution in [0, 1]
    pub confidence: f32,
}

/// Provenance block of a unified entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    /// One entry per contributing source, append-only
    pub sources: Vec<SourceAttribution>,

    /// When the entity was first created
    pub created_at: DateTime<Utc>,

    /// When the entity last gained a contribution
    pub updated_at: DateTime<Utc>,
}

impl Provenance {
    /// Start a provenance block with a single source
    pub fn new(source: SourceAttribution, at: DateTime<Utc>) -> Self {
        Self {
            sources: vec![source],
            created_at: at,
            updated_at: at,
        }
    }

    /// Append a contribution and bump the update timestamp
    pub fn record(&mut self, source: SourceAttribution, at: DateTime<Utc>) {
        self.sources.push(source);
        self.updated_at = at;
    }
}

/// Name bag of a unified entity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameBag {
    /// Preferred display form
    pub preferred: String,

    /// Human-readable variants
    pub variants: Vec<String>,

    /// Normalized forms of preferred + variants, deduplicated
    pub normalized: Vec<String>,
}

/// A dated life event, e.g. birth or death
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifeDate {
    /// ISO date, YYYY-MM-DD or bare YYYY
    pub date: String,
}

/// Biographical fields, each optional and independently sourced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Biography {
    #[serde(default)]
    pub birth: Option<LifeDate>,

    #[serde(default)]
    pub death: Option<LifeDate>,

    #[serde(default)]
    pub floruit: Option<LifeDate>,

    #[serde(default)]
    pub gender: Gender,
}

/// A role or office held by a person
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Role kind, e.g. "title"
    #[serde(rename = "type")]
    pub kind: String,

    /// Display label
    pub label: String,

    /// Reference into the contributing source, e.g. a QID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,

    /// Contributing source name
    pub source: String,
}

/// Kind of a family relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Parent,
    Spouse,
    Child,
}

/// A family relationship to another person
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Relationship kind
    #[serde(rename = "type")]
    pub kind: RelationKind,

    /// Label of the related person as given by the source
    pub person_label: String,

    /// Reference into the contributing source, e.g. a QID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,

    /// Contributing source name
    pub source: String,
}

/// A place associated with a person
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    /// Association kind, e.g. "title_seat"
    #[serde(rename = "type")]
    pub kind: String,

    /// Place label
    pub label: String,
}

/// Curation flags on a unified entity
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EntityFlags {
    /// Set when the entity entered the graph from extraction alone and
    /// has not been confirmed by a curated source
    #[serde(default)]
    pub needs_review: bool,
}

/// The canonical, merged record for one real-world person.
///
/// Created when a record first enters the unified graph; mutated only by
/// appending identifiers, facts and provenance. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedEntity {
    /// Canonical identifier, e.g. "AUTH:1", "WIKIDATA:Q999", "EXTRACTED:baldwyn"
    pub id: String,

    /// Preferred display label
    pub preferred_label: String,

    /// Cross-references into contributing sources, keyed by source name
    pub identifiers: BTreeMap<String, String>,

    /// Name bag
    pub names: NameBag,

    /// Biographical fields
    pub bio: Biography,

    /// Roles and offices
    pub roles: Vec<Role>,

    /// Family relationships
    pub relationships: Vec<Relationship>,

    /// Associated places
    pub places: Vec<Place>,

    /// Provenance of every contribution
    pub provenance: Provenance,

    /// Curation flags
    pub flags: EntityFlags,
}

impl UnifiedEntity {
    /// Create an entity with one contributing source and an empty fact set
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        source: SourceAttribution,
        at: DateTime<Utc>,
    ) -> Self {
        let label = label.into();
        Self {
            id: id.into(),
            preferred_label: label.clone(),
            identifiers: BTreeMap::new(),
            names: NameBag {
                preferred: label,
                variants: Vec::new(),
                normalized: Vec::new(),
            },
            bio: Biography::default(),
            roles: Vec::new(),
            relationships: Vec::new(),
            places: Vec::new(),
            provenance: Provenance::new(source, at),
            flags: EntityFlags::default(),
        }
    }

    /// Add a cross-reference identifier
    pub fn with_identifier(mut self, source: impl Into<String>, id: impl Into<String>) -> Self {
        self.identifiers.insert(source.into(), id.into());
        self
    }

    /// Add a human-readable name variant together with its normalized form
    pub fn with_variant(mut self, variant: impl Into<String>, norm: impl Into<String>) -> Self {
        let norm = norm.into();
        self.names.variants.push(variant.into());
        if !self.names.normalized.contains(&norm) {
            self.names.normalized.push(norm);
        }
        self
    }

    /// Mark the entity as needing human curation
    pub fn needs_review(mut self) -> Self {
        self.flags.needs_review = true;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn attribution(kind: SourceKind, confidence: f32) -> SourceAttribution {
        SourceAttribution {
            kind,
            source_file: None,
            match_tier: None,
            confidence,
        }
    }

    #[test]
    fn test_entity_builder() {
        let at = Utc::now();
        let entity = UnifiedEntity::new(
            "AUTH:1",
            "Baldwin",
            attribution(SourceKind::Authority, 1.0),
            at,
        )
        .with_identifier("authority", "AUTH:1")
        .with_variant("Baldwin of Boulogne", "baldwin of boulogne");

        assert_eq!(entity.preferred_label, "Baldwin");
        assert_eq!(entity.names.preferred, "Baldwin");
        assert_eq!(entity.identifiers.get("authority").map(String::as_str), Some("AUTH:1"));
        assert_eq!(entity.names.normalized, vec!["baldwin of boulogne"]);
        assert!(!entity.flags.needs_review);
    }

    #[test]
    fn test_variant_norms_deduplicated() {
        let at = Utc::now();
        let entity = UnifiedEntity::new(
            "EXTRACTED:x",
            "X",
            attribution(SourceKind::Extraction, 0.5),
            at,
        )
        .with_variant("X the Bold", "x the bold")
        .with_variant("X, the Bold", "x the bold");

        assert_eq!(entity.names.variants.len(), 2);
        assert_eq!(entity.names.normalized.len(), 1);
    }

    #[test]
    fn test_provenance_record_bumps_updated_at() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(5);
        let mut prov = Provenance::new(attribution(SourceKind::Authority, 1.0), t0);
        prov.record(attribution(SourceKind::Wikidata, 1.0), t1);

        assert_eq!(prov.sources.len(), 2);
        assert_eq!(prov.created_at, t0);
        assert_eq!(prov.updated_at, t1);
    }

    #[test]
    fn test_link_status_ordering() {
        assert!(LinkStatus::NoMatch < LinkStatus::Low);
        assert!(LinkStatus::Low < LinkStatus::Medium);
        assert!(LinkStatus::Medium < LinkStatus::High);
    }

    #[test]
    fn test_gender_serde_round_trip() {
        let json = serde_json::to_string(&Gender::F).unwrap();
        assert_eq!(json, "\"f\"");
        let back: Gender = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(back, Gender::Unknown);
    }

    #[test]
    fn test_mention_tolerates_missing_fields() {
        let mention: PersonMention = serde_json::from_str(r#"{"name": "Baldwin"}"#).unwrap();
        assert_eq!(mention.name, "Baldwin");
        assert_eq!(mention.gender, Gender::Unknown);
        assert!(!mention.group);
        assert!(mention.source_offset.is_none());
    }

    #[test]
    fn test_link_best_id_pseudo_id() {
        let link = Link {
            mention: "Unknown knight".to_string(),
            group: false,
            candidates: Vec::new(),
            best: None,
            confidence: 0.0,
            status: LinkStatus::NoMatch,
        };
        assert_eq!(link.best_id(), "__none__");
    }
}

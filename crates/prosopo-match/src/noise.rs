//! Extraction-noise filtering
//!
//! Post-processing for extraction output: drops bibliographic metadata,
//! modern scholars and other obvious false positives before the
//! mentions reach the linker or the merger.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use prosopo_core::{DocumentRecord, LinkStatus, PersonMention};

/// Terms that should never be extracted as persons.
const BIBLIOGRAPHIC_NOISE: &[&str] = &[
    // Journal/publisher terms
    "proceedings of",
    "philosophical society",
    "university press",
    "oxford university",
    "cambridge university",
    "journal of",
    "historical review",
    "english historical",
    "vol",
    "volume",
    "issue",
    "number",
    "pp",
    "pages",
    "published",
    "publication",
    "publisher",
    "copyright",
    "all rights reserved",
    "isbn",
    "doi",
    "issn",
    // Modern academic terms
    "author",
    "editor",
    "translator",
    "introduction",
    "preface",
    "foreword",
    "bibliography",
    "references",
    "works cited",
    "index",
    "appendix",
    "chapter",
    "section",
    "thesis",
    "dissertation",
    "professor",
    "prof",
    "dr",
    "phd",
    // Library/catalog metadata
    "stable url",
    "jstor",
    "accessed",
    "downloaded",
    "terms of use",
    "pdf",
    "abstract",
    // Common false positives
    "source",
    "title",
    "language",
    "doc type",
    "extracted",
    "extraction",
    "person",
    "persons",
    "people",
    "group",
    "collective",
    // Medieval text apparatus
    "incipit",
    "explicit",
    "folio",
    "manuscript",
    "recto",
    "verso",
];

/// Patterns that indicate non-person strings.
static NOISE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\d+$",                      // bare numbers
        r"^vol\.?\s*\d+$",             // volume numbers
        r"^pp\.?\s*\d+",               // page ranges
        r"^\d{4}$",                    // years standing alone
        r"^(the|a|an)\s+\w+$",         // generic noun phrases
        r"^(see|cf|ibid|op\.? cit)\.?$", // citation abbreviations
    ]
    .iter()
    .map(|p| Regex::new(p).expect("noise pattern must compile"))
    .collect()
});

/// Medieval naming conventions; a hit marks a name as plausibly period.
static MEDIEVAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(i{1,3}|iv|ix|vi{0,3})\b",  // regnal numbers
        r"\bof\s+\w+",                  // toponymic
        r"\bde\s+\w+",                  // Norman/French
        r"\bvan\s+\w+",
        r"\bvon\s+\w+",
        r"\bal[-\s]?\w+",               // Arabic
        r"\bibn\s+\w+",                 // Arabic patronymic
        r"\bmac\s+\w+",
        r"\b(o'|fitz)\s*\w+",
        r"\ble\s+\w+",                  // French epithet
        r"\bthe\s+\w+",                 // English epithet
        r"\bsaint\s+\w+",
        r"\bst\.\s+\w+",
        r"\b(king|queen|count|duke|bishop|pope|emperor|sultan)\s+",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).expect("medieval pattern must compile"))
    .collect()
});

/// Context phrases typical of modern scholarship, not period narrative.
const MODERN_CONTEXT_INDICATORS: &[&str] = &[
    "argues",
    "claims",
    "suggests",
    "writes",
    "publishes",
    "according to",
    "cf.",
    "see",
    "edition",
    "translation",
    "trans.",
    "ed.",
    "intro",
    "footnote",
    "citation",
];

/// Check whether a name is likely bibliographic metadata.
pub fn is_bibliographic_noise(name: &str) -> bool {
    let lower = name.trim().to_lowercase();

    if BIBLIOGRAPHIC_NOISE.contains(&lower.as_str()) {
        return true;
    }
    for term in BIBLIOGRAPHIC_NOISE {
        if term.contains(' ') && lower.contains(term) {
            return true;
        }
    }
    NOISE_PATTERNS.iter().any(|p| p.is_match(&lower))
}

/// Check whether a name matches any medieval naming convention.
pub fn has_medieval_pattern(name: &str) -> bool {
    MEDIEVAL_PATTERNS.iter().any(|p| p.is_match(name))
}

/// Detect mentions of modern scholars from role and context clues.
pub fn is_likely_modern_scholar(mention: &PersonMention) -> bool {
    if mention.role.as_deref() == Some("modern author") {
        return true;
    }
    if mention.confidence <= 0.15 {
        return true;
    }
    let context = mention.context.to_lowercase();
    MODERN_CONTEXT_INDICATORS
        .iter()
        .any(|indicator| context.contains(indicator))
}

/// Before/after counts recorded on a filtered document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FilterReport {
    pub original_persons: usize,
    pub kept_persons: usize,
    pub removed: usize,
    pub original_links: usize,
    pub kept_links: usize,
}

/// Filter noisy mentions and their links out of a document.
///
/// Strict mode additionally drops low-confidence mentions that show no
/// medieval naming pattern.
pub fn filter_document(doc: &mut DocumentRecord, strict: bool) -> FilterReport {
    let original_persons = doc.persons.len();
    let original_links = doc.links.len();

    doc.persons.retain(|mention| {
        let name = mention.name.trim();
        if name.chars().count() < 2 {
            return false;
        }
        if is_bibliographic_noise(name) {
            debug!("dropping bibliographic noise: {name:?}");
            return false;
        }
        if is_likely_modern_scholar(mention) {
            debug!("dropping likely modern scholar: {name:?}");
            return false;
        }
        if strict && mention.confidence < 0.5 && !has_medieval_pattern(name) {
            debug!("dropping low-confidence non-medieval name: {name:?}");
            return false;
        }
        true
    });

    doc.links.retain(|link| {
        if is_bibliographic_noise(&link.mention) {
            return false;
        }
        match link.status {
            LinkStatus::High | LinkStatus::Medium => true,
            // Keep weaker links only when a candidate backs them up.
            LinkStatus::Low | LinkStatus::NoMatch => !link.candidates.is_empty(),
        }
    });

    FilterReport {
        original_persons,
        kept_persons: doc.persons.len(),
        removed: original_persons - doc.persons.len(),
        original_links,
        kept_links: doc.links.len(),
    }
}

//! Authority index building
//!
//! Flattens the curated authority file into queryable entries. The file
//! has accumulated several nested shapes over time (flat `variants`
//! list, nested `normalized` block, nested `name` block); each shape is
//! handled by an explicit extraction rule so that an unsupported shape
//! is reported instead of silently yielding zero variants.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use prosopo_core::{AuthorityEntry, CoreError, Result};

use crate::normalize::normalize;

/// One rule of the union-of-shapes parser. Each rule inspects the raw
/// record and appends the raw variant strings it recognizes.
type ExtractionRule = fn(&Value, &mut Vec<String>);

/// Rules are tried in sequence; order matters only for which
/// human-readable original survives deduplication.
const EXTRACTION_RULES: &[(&str, ExtractionRule)] = &[
    ("preferred_label", collect_label),
    ("variants", collect_flat_variants),
    ("normalized", collect_normalized_block),
    ("name", collect_name_block),
];

fn collect_label(record: &Value, out: &mut Vec<String>) {
    if let Some(label) = record.get("preferred_label").and_then(Value::as_str) {
        push_nonempty(out, label);
    } else if let Some(label) = record.get("name").and_then(Value::as_str) {
        push_nonempty(out, label);
    }
}

fn collect_flat_variants(record: &Value, out: &mut Vec<String>) {
    let Some(variants) = record.get("variants") else {
        return;
    };
    match variants.as_array() {
        Some(items) => {
            for item in items {
                if let Some(s) = item.as_str() {
                    push_nonempty(out, s);
                }
            }
        }
        None => warn!("authority record has a non-list `variants` field, ignoring"),
    }
}

fn collect_normalized_block(record: &Value, out: &mut Vec<String>) {
    let Some(block) = record.get("normalized") else {
        return;
    };
    let Some(block) = block.as_object() else {
        warn!("authority record has a non-object `normalized` block, ignoring");
        return;
    };
    if let Some(preferred) = block.get("preferred").and_then(Value::as_str) {
        push_nonempty(out, preferred);
    }
    if let Some(items) = block.get("variants").and_then(Value::as_array) {
        for item in items {
            if let Some(s) = item.as_str() {
                push_nonempty(out, s);
            }
        }
    }
}

fn collect_name_block(record: &Value, out: &mut Vec<String>) {
    if let Some(raw) = record
        .get("name")
        .and_then(Value::as_object)
        .and_then(|block| block.get("raw"))
        .and_then(Value::as_str)
    {
        push_nonempty(out, raw);
    }
}

fn push_nonempty(out: &mut Vec<String>, s: &str) {
    let trimmed = s.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Build the authority index from the parsed curated file.
///
/// The top-level record list lives under `persons` (current format) or
/// `entities` (older exports). Records without both an identifier and a
/// label are dropped: they can neither be referenced nor displayed.
pub fn build_index(source: &Value) -> Vec<AuthorityEntry> {
    let records = source
        .get("persons")
        .or_else(|| source.get("entities"))
        .and_then(Value::as_array);

    let Some(records) = records else {
        warn!("authority source has neither a `persons` nor an `entities` list");
        return Vec::new();
    };

    let mut index = Vec::with_capacity(records.len());
    for record in records {
        match build_entry(record) {
            Some(entry) => index.push(entry),
            None => debug!("skipping authority record without id/label: {record}"),
        }
    }
    index
}

fn build_entry(record: &Value) -> Option<AuthorityEntry> {
    let id = record
        .get("authority_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    // The label must come from the record itself; a variant list alone
    // cannot name the entry.
    let mut labels = Vec::new();
    collect_label(record, &mut labels);
    let label = labels.into_iter().next()?;

    let mut raw_variants = Vec::new();
    for (_, rule) in EXTRACTION_RULES {
        rule(record, &mut raw_variants);
    }

    let entity_type = record
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("person")
        .to_string();

    // Deduplicate by normalized form, keeping the first original seen.
    let mut variants = Vec::new();
    let mut norms = Vec::new();
    for raw in raw_variants {
        let norm = normalize(&raw);
        if norm.is_empty() || norms.contains(&norm) {
            continue;
        }
        variants.push(raw);
        norms.push(norm);
    }

    let toponym = record
        .get("name")
        .and_then(Value::as_object)
        .and_then(|block| block.get("toponym"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(AuthorityEntry {
        id: id.to_string(),
        label,
        entity_type,
        variants,
        norms,
        toponym,
    })
}

/// Load and build the authority index from a JSON file.
///
/// A missing file or an unparsable file is an error surfaced to the
/// caller; a silently empty index would be indistinguishable from
/// "truly no data".
pub fn load_index(path: impl AsRef<Path>) -> Result<Vec<AuthorityEntry>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CoreError::NotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content).map_err(|e| CoreError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    if !value.is_object() {
        return Err(CoreError::Schema {
            path: path.display().to_string(),
            message: "authority source must be a JSON object".to_string(),
        });
    }
    Ok(build_index(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_variants_shape() {
        let source = json!({
            "persons": [{
                "authority_id": "AUTH:1",
                "preferred_label": "Baldwin",
                "variants": ["Baldwin of Boulogne", "Baldwin I"]
            }]
        });
        let index = build_index(&source);
        assert_eq!(index.len(), 1);
        let entry = &index[0];
        assert_eq!(entry.id, "AUTH:1");
        assert_eq!(entry.label, "Baldwin");
        assert_eq!(
            entry.norms,
            vec!["baldwin", "baldwin of boulogne", "baldwin i"]
        );
    }

    #[test]
    fn test_normalized_block_shape() {
        let source = json!({
            "persons": [{
                "authority_id": "AUTH:2",
                "preferred_label": "Godfrey",
                "normalized": {
                    "preferred": "Godfrey of Bouillon",
                    "variants": ["Godefroid de Bouillon"]
                }
            }]
        });
        let index = build_index(&source);
        assert_eq!(index[0].norms.len(), 3);
        assert!(index[0].norms.contains(&"godefroid de bouillon".to_string()));
    }

    #[test]
    fn test_name_block_shape() {
        let source = json!({
            "persons": [{
                "authority_id": "AUTH:3",
                "preferred_label": "Melisende",
                "name": { "raw": "Mélisende de Jérusalem", "toponym": "Jerusalem" }
            }]
        });
        let index = build_index(&source);
        assert!(index[0].norms.contains(&"melisende de jerusalem".to_string()));
        assert_eq!(index[0].toponym.as_deref(), Some("Jerusalem"));
    }

    #[test]
    fn test_entities_top_level_key() {
        let source = json!({
            "entities": [{ "authority_id": "AUTH:4", "preferred_label": "Tancred" }]
        });
        assert_eq!(build_index(&source).len(), 1);
    }

    #[test]
    fn test_records_without_id_or_label_dropped() {
        let source = json!({
            "persons": [
                { "preferred_label": "No Id" },
                { "authority_id": "AUTH:5" },
                { "authority_id": "AUTH:6", "preferred_label": "Kept" }
            ]
        });
        let index = build_index(&source);
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].id, "AUTH:6");
    }

    #[test]
    fn test_duplicate_norms_keep_first_original() {
        let source = json!({
            "persons": [{
                "authority_id": "AUTH:7",
                "preferred_label": "Baldwin",
                "variants": ["BALDWIN", "baldwin"]
            }]
        });
        let index = build_index(&source);
        assert_eq!(index[0].variants, vec!["Baldwin"]);
        assert_eq!(index[0].norms, vec!["baldwin"]);
    }

    #[test]
    fn test_load_index_missing_file() {
        let err = load_index("/nonexistent/authority.json").unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}

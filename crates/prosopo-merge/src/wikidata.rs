//! External structured-export folding
//!
//! The export arrives as tabular rows keyed by entity URI, with repeated
//! rows per entity carrying different property/value pairs. This module
//! folds them into one record per identifier before merging.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use prosopo_core::{
    CoreError, Gender, LifeDate, RelationKind, Relationship, Result, Role,
};

const ENTITY_URI_PREFIX: &str = "http://www.wikidata.org/entity/";

/// One raw row of the tabular export
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportRow {
    /// Entity URI
    #[serde(default)]
    pub item: String,

    /// Entity label
    #[serde(default, rename = "itemLabel")]
    pub item_label: String,

    /// Birth date, ISO with timezone suffix
    #[serde(default)]
    pub birth: Option<String>,

    /// Death date, ISO with timezone suffix
    #[serde(default)]
    pub death: Option<String>,

    /// Floruit date, ISO with timezone suffix
    #[serde(default)]
    pub floruit: Option<String>,

    /// Property URI of this row's statement
    #[serde(default)]
    pub prop: Option<String>,

    /// Statement value URI
    #[serde(default)]
    pub value: Option<String>,

    /// Statement value label
    #[serde(default, rename = "valueLabel")]
    pub value_label: Option<String>,
}

/// One folded export record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikidataPerson {
    /// External identifier, e.g. "Q999"
    pub qid: String,

    /// Preferred label
    pub label: String,

    /// Birth date, if stated
    pub birth: Option<LifeDate>,

    /// Death date, if stated
    pub death: Option<LifeDate>,

    /// Floruit date, if stated
    pub floruit: Option<LifeDate>,

    /// Gender, if stated
    pub gender: Gender,

    /// Titles and offices (P39)
    pub roles: Vec<Role>,

    /// Family relationships (P22/P25/P26/P40)
    pub relationships: Vec<Relationship>,
}

impl WikidataPerson {
    fn new(qid: String, label: String) -> Self {
        Self {
            qid,
            label,
            birth: None,
            death: None,
            floruit: None,
            gender: Gender::Unknown,
            roles: Vec::new(),
            relationships: Vec::new(),
        }
    }
}

/// Extract a QID from an entity URI, if the URI has the expected shape.
fn qid_of(uri: &str) -> Option<&str> {
    uri.strip_prefix(ENTITY_URI_PREFIX)
}

/// Strip the timestamp suffix from an export date, keeping YYYY-MM-DD
/// or a bare year.
fn parse_iso_date(s: &str) -> Option<LifeDate> {
    let trimmed = s.trim().trim_end_matches("T00:00:00Z");
    if trimmed.is_empty() {
        None
    } else {
        Some(LifeDate {
            date: trimmed.to_string(),
        })
    }
}

/// Fold raw export rows into one record per QID.
///
/// Rows without an entity URI in the expected shape are skipped. The
/// first row of a QID fixes its label; date and gender fields fill in
/// on first sight, roles and relationships accumulate.
pub fn fold_rows<I>(rows: I) -> BTreeMap<String, WikidataPerson>
where
    I: IntoIterator<Item = ExportRow>,
{
    let mut persons: BTreeMap<String, WikidataPerson> = BTreeMap::new();

    for row in rows {
        let Some(qid) = qid_of(&row.item) else {
            debug!("skipping export row without entity URI: {:?}", row.item);
            continue;
        };

        let person = persons
            .entry(qid.to_string())
            .or_insert_with(|| WikidataPerson::new(qid.to_string(), row.item_label.clone()));

        if let Some(birth) = row.birth.as_deref() {
            if person.birth.is_none() {
                person.birth = parse_iso_date(birth);
            }
        }
        if let Some(death) = row.death.as_deref() {
            if person.death.is_none() {
                person.death = parse_iso_date(death);
            }
        }
        if let Some(floruit) = row.floruit.as_deref() {
            if person.floruit.is_none() {
                person.floruit = parse_iso_date(floruit);
            }
        }

        let Some(prop) = row.prop.as_deref() else {
            continue;
        };
        let value_label = row.value_label.clone().unwrap_or_default();
        let external_ref = row
            .value
            .as_deref()
            .and_then(qid_of)
            .map(str::to_string);

        if prop.ends_with("/P21") {
            // "male" is a substring of "female", so test female first.
            let lowered = value_label.to_lowercase();
            if lowered.contains("female") {
                person.gender = Gender::F;
            } else if lowered.contains("male") {
                person.gender = Gender::M;
            }
        } else if prop.ends_with("/P39") {
            person.roles.push(Role {
                kind: "title".to_string(),
                label: value_label,
                external_ref,
                source: "wikidata".to_string(),
            });
        } else {
            let kind = if prop.ends_with("/P22") || prop.ends_with("/P25") {
                Some(RelationKind::Parent)
            } else if prop.ends_with("/P26") {
                Some(RelationKind::Spouse)
            } else if prop.ends_with("/P40") {
                Some(RelationKind::Child)
            } else {
                None
            };
            if let Some(kind) = kind {
                person.relationships.push(Relationship {
                    kind,
                    person_label: value_label,
                    external_ref,
                    source: "wikidata".to_string(),
                });
            }
        }
    }

    persons
}

/// Load and fold the export from a directory.
///
/// Expects a `qids.csv` manifest next to a `data_pages/` directory of
/// per-page CSV files. A directory that cannot be read or a file that
/// cannot be parsed as CSV fails fast; individual malformed rows are
/// skipped at debug level.
pub fn load_export(dir: impl AsRef<Path>) -> Result<BTreeMap<String, WikidataPerson>> {
    let dir = dir.as_ref();
    let manifest = dir.join("qids.csv");
    if !manifest.exists() {
        return Err(CoreError::NotFound(manifest.display().to_string()));
    }

    let manifest_rows = count_manifest_rows(&manifest)?;
    info!("export manifest lists {manifest_rows} entities");

    let pages_dir = dir.join("data_pages");
    let mut paths: Vec<_> = std::fs::read_dir(&pages_dir)
        .map_err(|_| CoreError::NotFound(pages_dir.display().to_string()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();

    let mut rows = Vec::new();
    for path in &paths {
        let mut reader = csv::Reader::from_path(path).map_err(|e| CoreError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        for record in reader.deserialize::<ExportRow>() {
            match record {
                Ok(row) => rows.push(row),
                Err(e) => debug!("skipping malformed export row in {}: {e}", path.display()),
            }
        }
    }

    let persons = fold_rows(rows);
    info!(
        "folded {} unique persons from {} export pages",
        persons.len(),
        paths.len()
    );
    Ok(persons)
}

fn count_manifest_rows(path: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| CoreError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(reader.records().filter_map(|r| r.ok()).count())
}

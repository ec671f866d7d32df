//! Prosopo Merge - Multi-source unification
//!
//! Folds the external structured export into per-person records, then
//! merges authority entries, export records and extracted mentions into
//! one unified entity graph with provenance on every contribution.

pub mod graph;
pub mod merger;
pub mod wikidata;

pub use graph::{GraphBreakdown, UnifiedGraph};
pub use merger::Merger;
pub use wikidata::{fold_rows, load_export, ExportRow, WikidataPerson};

//! Command implementations

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};

use prosopo_core::{AppConfig, DocumentRecord, LinkStatus};
use prosopo_match::{authority, noise, Linker};
use prosopo_merge::{load_export, Merger, UnifiedGraph};
use prosopo_reconcile::{reconcile_documents, ReconCache, Reconciler};

/// Output files that live next to documents but are not documents.
const NON_DOCUMENT_FILES: &[&str] = &["authority.json", "wikidata_matches.json", "index.json"];

/// Read every per-document JSON file in a directory, skipping the
/// pipeline's own side artifacts. Files that fail to parse are skipped
/// with a warning so one bad document cannot sink a whole run.
fn load_documents(dir: &Path) -> anyhow::Result<Vec<(PathBuf, DocumentRecord)>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading document directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(true, |name| !NON_DOCUMENT_FILES.contains(&name))
        })
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        match serde_json::from_str::<DocumentRecord>(&content) {
            Ok(mut doc) => {
                if doc.doc_id.is_empty() {
                    doc.doc_id = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("document")
                        .to_string();
                }
                documents.push((path, doc));
            }
            Err(e) => warn!("skipping unparsable document {}: {e}", path.display()),
        }
    }
    Ok(documents)
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn status_counts(doc: &DocumentRecord) -> (usize, usize, usize, usize) {
    let count = |status: LinkStatus| doc.links.iter().filter(|l| l.status == status).count();
    (
        count(LinkStatus::High),
        count(LinkStatus::Medium),
        count(LinkStatus::Low),
        count(LinkStatus::NoMatch),
    )
}

/// Link every document's mentions against the authority index.
pub fn link(
    config: &AppConfig,
    authority_path: &Path,
    input: &Path,
    output: &Path,
) -> anyhow::Result<()> {
    let index = authority::load_index(authority_path)?;
    info!("loaded {} authority entries", index.len());

    std::fs::create_dir_all(output)?;
    let linker = Linker::with_config(config.matching.clone());

    for (path, mut doc) in load_documents(input)? {
        doc.links = linker.link(&doc.persons, &index);
        let (high, medium, low, no_match) = status_counts(&doc);
        info!(
            "{}: {} persons, {} links ({high} high / {medium} medium / {low} low / {no_match} no_match)",
            doc.doc_id,
            doc.persons.len(),
            doc.links.len(),
        );

        let out_path = output.join(path.file_name().unwrap_or_default());
        write_json(&out_path, &doc)?;
    }
    Ok(())
}

/// Merge the three sources into a unified graph file.
pub fn merge(
    authority_path: &Path,
    export: Option<&Path>,
    documents: Option<&Path>,
    output: &Path,
) -> anyhow::Result<()> {
    let index = authority::load_index(authority_path)?;
    info!("loaded {} authority entries", index.len());

    let export = match export {
        Some(dir) => load_export(dir)?,
        None => Default::default(),
    };

    let docs: Vec<DocumentRecord> = match documents {
        Some(dir) => load_documents(dir)?.into_iter().map(|(_, d)| d).collect(),
        None => Vec::new(),
    };

    let graph = Merger::new(Utc::now()).merge(&index, &export, &docs);
    graph.persist(output)?;

    let b = graph.breakdown();
    info!("unified graph written to {}", output.display());
    info!(
        "total {} | with QID {} | with authority id {} | needs review {}",
        b.total, b.with_wikidata, b.with_authority, b.needs_review
    );
    Ok(())
}

/// Reconcile unmatched mentions, maintaining the persistent cache.
pub async fn reconcile(config: &AppConfig, documents: &Path, cache_path: &Path) -> anyhow::Result<()> {
    let docs: Vec<DocumentRecord> = load_documents(documents)?
        .into_iter()
        .map(|(_, d)| d)
        .collect();

    let mut cache = ReconCache::load(cache_path);
    info!("loaded cache with {} entries", cache.len());

    let reconciler = Reconciler::new(config.reconcile.clone())?;
    let outcome = reconcile_documents(&reconciler, &docs, &mut cache).await;

    cache.persist(cache_path)?;
    info!(
        "queried {} new persons, skipped {} cached; cache written to {}",
        outcome.queried,
        outcome.skipped,
        cache_path.display()
    );
    Ok(())
}

/// Filter extraction noise out of documents.
pub fn filter(input: &Path, output: &Path, strict: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all(output)?;

    let inputs: Vec<(PathBuf, DocumentRecord)> = if input.is_file() {
        let content = std::fs::read_to_string(input)?;
        let doc = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", input.display()))?;
        vec![(input.to_path_buf(), doc)]
    } else {
        load_documents(input)?
    };

    for (path, mut doc) in inputs {
        let report = noise::filter_document(&mut doc, strict);
        info!(
            "{}: {} -> {} persons ({} removed)",
            doc.doc_id, report.original_persons, report.kept_persons, report.removed
        );
        let out_path = output.join(path.file_name().unwrap_or_default());
        write_json(&out_path, &doc)?;
    }
    Ok(())
}

/// Print a unified-graph summary.
pub fn stats(graph_path: &Path) -> anyhow::Result<()> {
    let graph = UnifiedGraph::load(graph_path)?;
    let b = graph.breakdown();

    println!("Unified graph: {}", graph_path.display());
    println!("  total persons:     {}", b.total);
    println!("  with Wikidata QID: {}", b.with_wikidata);
    println!("  with authority id: {}", b.with_authority);
    println!("  needs review:      {}", b.needs_review);
    Ok(())
}

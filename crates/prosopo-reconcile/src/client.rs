//! Reconciliation client
//!
//! Searches the external knowledge base for human entities matching a
//! name, fetches their lifespan dates, filters out implausible eras and
//! scores what remains. Per-query failures degrade to an empty candidate
//! list; a multi-hour run must never abort on one bad name.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use prosopo_core::{CoreError, ReconcileConfig, Result};
use prosopo_match::normalize;

use crate::pacing::Pacer;

const ENTITY_URL: &str = "https://www.wikidata.org/wiki/";

/// Era- and occupation-relevant vocabulary rewarded in descriptions.
static ERA_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(crusad|knight|king|queen|count|bishop|pope|sultan|emir|patriarch|",
        r"noble|pilgrim|merchant|historian|chronicler|medieval|middle age|",
        r"latin east|outremer|templars?|hospitall?er|constable|duke|baron)",
    ))
    .expect("era keyword pattern must compile")
});

/// Clearly modern indicators penalized in descriptions.
static MODERN_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(born 1[5-9]\d\d|20th|21st century|politician|athlete|actor)\b")
        .expect("modern keyword pattern must compile")
});

static LEADING_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})").expect("year pattern must compile"));

/// One raw search hit from the knowledge base
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub label: String,
    pub description: String,
}

/// A scored, era-filtered reconciliation candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconCandidate {
    /// External identifier, e.g. "Q999"
    pub qid: String,

    /// Entity label
    pub label: String,

    /// Entity description
    pub description: String,

    /// Entity page URL
    pub url: String,

    /// Relevance score in [0, 1]
    pub score: f32,

    /// Birth year, if stated
    pub birth_year: Option<i32>,

    /// Death year, if stated
    pub death_year: Option<i32>,
}

/// Seam to the external knowledge base, so tests can substitute a mock.
#[async_trait]
pub trait EntitySearch: Send + Sync {
    /// Search human entities by name
    async fn search_humans(&self, name: &str, limit: usize) -> Result<Vec<SearchHit>>;

    /// Fetch (birth year, death year) for an entity
    async fn person_dates(&self, qid: &str) -> Result<(Option<i32>, Option<i32>)>;
}

// ============================================================================
// SPARQL backend
// ============================================================================

/// Live backend speaking to a SPARQL endpoint
pub struct SparqlBackend {
    http: reqwest::Client,
    config: ReconcileConfig,
    pacer: Pacer,
}

impl SparqlBackend {
    /// Create a backend from configuration
    pub fn new(config: ReconcileConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::External(e.to_string()))?;
        let pacer = Pacer::new(Duration::from_millis(config.min_delay_ms));
        Ok(Self { http, config, pacer })
    }

    /// Run one paced SPARQL query with bounded retries and backoff.
    async fn query(&self, sparql: &str) -> Result<serde_json::Value> {
        let mut backoff = Duration::from_millis(self.config.retry_backoff_ms);
        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            self.pacer.wait().await;

            let result = self
                .http
                .get(&self.config.sparql_endpoint)
                .query(&[("query", sparql), ("format", "json")])
                .header("Accept", "application/sparql-results+json")
                .send()
                .await;

            match result {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => {
                        return response
                            .json()
                            .await
                            .map_err(|e| CoreError::External(e.to_string()));
                    }
                    Err(e) => last_err = Some(e),
                },
                Err(e) => last_err = Some(e),
            }
            debug!("SPARQL attempt {attempt} failed, retrying");
        }

        Err(CoreError::External(
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "SPARQL query failed".to_string()),
        ))
    }
}

fn bindings(value: &serde_json::Value) -> &[serde_json::Value] {
    value
        .get("results")
        .and_then(|r| r.get("bindings"))
        .and_then(|b| b.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn binding_value<'a>(binding: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    binding.get(key)?.get("value")?.as_str()
}

fn year_of(value: &str) -> Option<i32> {
    LEADING_YEAR
        .captures(value)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[async_trait]
impl EntitySearch for SparqlBackend {
    async fn search_humans(&self, name: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let safe_name: String = name.chars().filter(|c| *c != '"' && *c != '\\').collect();
        let sparql = format!(
            r#"
SELECT ?item ?itemLabel ?itemDescription WHERE {{
  SERVICE wikibase:mwapi {{
    bd:serviceParam wikibase:endpoint "www.wikidata.org" ;
                    wikibase:api "EntitySearch" ;
                    mwapi:search "{safe_name}" ;
                    mwapi:language "en" ;
                    mwapi:limit "{pool}" .
    ?item wikibase:apiOutputItem mwapi:item .
  }}
  ?item wdt:P31 wd:Q5 .
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "en" . }}
}}
LIMIT {limit}
"#,
            pool = self.config.search_pool,
        );

        let value = self.query(&sparql).await?;
        let mut hits = Vec::new();
        for binding in bindings(&value) {
            let Some(uri) = binding_value(binding, "item") else {
                continue;
            };
            let qid = uri.rsplit('/').next().unwrap_or_default().to_string();
            let label = binding_value(binding, "itemLabel").unwrap_or_default();
            // A label equal to the QID means the entity has no usable label.
            if label == qid {
                continue;
            }
            hits.push(SearchHit {
                id: qid,
                label: label.to_string(),
                description: binding_value(binding, "itemDescription")
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        Ok(hits)
    }

    async fn person_dates(&self, qid: &str) -> Result<(Option<i32>, Option<i32>)> {
        let sparql = format!(
            r#"
SELECT ?birth ?death WHERE {{
  wd:{qid} wdt:P569 ?birth .
  OPTIONAL {{ wd:{qid} wdt:P570 ?death . }}
}}
"#
        );

        let value = self.query(&sparql).await?;
        let mut birth = None;
        let mut death = None;
        for binding in bindings(&value) {
            if birth.is_none() {
                birth = binding_value(binding, "birth").and_then(year_of);
            }
            if death.is_none() {
                death = binding_value(binding, "death").and_then(year_of);
            }
        }
        Ok((birth, death))
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// Heuristic relevance score in [0, 1] for one search hit.
pub fn score_candidate(name: &str, hit: &SearchHit) -> f32 {
    let mut score = 0.0f32;

    let name_norm = normalize(name);
    let label_norm = normalize(&hit.label);
    if !label_norm.is_empty() && label_norm == name_norm {
        score += 0.5;
    } else if !label_norm.is_empty()
        && !name_norm.is_empty()
        && (label_norm.contains(&name_norm) || name_norm.contains(&label_norm))
    {
        score += 0.3;
    }

    if ERA_KEYWORDS.is_match(&hit.description) {
        score += 0.4;
    }
    if MODERN_KEYWORDS.is_match(&hit.description) {
        score -= 0.5;
    }

    score.clamp(0.0, 1.0)
}

/// Era plausibility: a person is excluded only when both lifespan dates
/// are known and both fall after the cutoff. Absence of evidence is not
/// evidence of exclusion.
pub fn is_era_plausible(birth: Option<i32>, death: Option<i32>, cutoff: i32) -> bool {
    match (birth, death) {
        (Some(b), Some(d)) => b <= cutoff || d <= cutoff,
        _ => true,
    }
}

/// Reconciles unmatched names against the external knowledge base.
pub struct Reconciler {
    backend: Box<dyn EntitySearch>,
    config: ReconcileConfig,
    /// Lifespans per QID are stable; cache them across names in a run.
    dates: Cache<String, (Option<i32>, Option<i32>)>,
}

impl Reconciler {
    /// Create a reconciler with the live SPARQL backend
    pub fn new(config: ReconcileConfig) -> Result<Self> {
        let backend = SparqlBackend::new(config.clone())?;
        Ok(Self::with_backend(Box::new(backend), config))
    }

    /// Create a reconciler over an arbitrary backend (tests inject mocks)
    pub fn with_backend(backend: Box<dyn EntitySearch>, config: ReconcileConfig) -> Self {
        Self {
            backend,
            config,
            dates: Cache::new(10_000),
        }
    }

    /// Return ranked candidates for a name.
    ///
    /// Failures are caught per query: a transport or parse error yields
    /// an empty list, not an aborted run.
    pub async fn reconcile(&self, name: &str) -> Vec<ReconCandidate> {
        let pool = self.config.candidate_limit + 5;
        let hits = match self.backend.search_humans(name, pool).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("knowledge-base search failed for {name:?}: {e}");
                return Vec::new();
            }
        };

        let mut candidates = Vec::new();
        let mut filtered = 0usize;
        for hit in hits {
            if !hit.id.starts_with('Q') {
                continue;
            }
            let (birth, death) = self.dates_for(&hit.id).await;
            if !is_era_plausible(birth, death, self.config.cutoff_year) {
                debug!(
                    "filtered post-cutoff candidate {} (b.{birth:?}, d.{death:?})",
                    hit.label
                );
                filtered += 1;
                continue;
            }

            let score = score_candidate(name, &hit);
            candidates.push(ReconCandidate {
                url: format!("{ENTITY_URL}{}", hit.id),
                qid: hit.id,
                label: hit.label,
                description: hit.description,
                score,
                birth_year: birth,
                death_year: death,
            });
        }

        if filtered > 0 {
            debug!("{name}: filtered {filtered} post-cutoff candidates");
        }

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(self.config.candidate_limit);
        candidates
    }

    async fn dates_for(&self, qid: &str) -> (Option<i32>, Option<i32>) {
        if let Some(dates) = self.dates.get(qid).await {
            return dates;
        }
        let dates = match self.backend.person_dates(qid).await {
            Ok(dates) => dates,
            Err(e) => {
                debug!("date lookup failed for {qid}: {e}");
                (None, None)
            }
        };
        self.dates.insert(qid.to_string(), dates).await;
        dates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockBackend {
        hits: Vec<SearchHit>,
        dates: HashMap<String, (Option<i32>, Option<i32>)>,
        fail_search: bool,
    }

    #[async_trait]
    impl EntitySearch for MockBackend {
        async fn search_humans(&self, _name: &str, _limit: usize) -> Result<Vec<SearchHit>> {
            if self.fail_search {
                return Err(CoreError::External("boom".to_string()));
            }
            Ok(self.hits.clone())
        }

        async fn person_dates(&self, qid: &str) -> Result<(Option<i32>, Option<i32>)> {
            Ok(self.dates.get(qid).copied().unwrap_or((None, None)))
        }
    }

    fn hit(id: &str, label: &str, description: &str) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            label: label.to_string(),
            description: description.to_string(),
        }
    }

    fn reconciler(backend: MockBackend) -> Reconciler {
        Reconciler::with_backend(Box::new(backend), ReconcileConfig::default())
    }

    #[test]
    fn test_era_plausibility_window() {
        // Both dates known and after the cutoff: excluded.
        assert!(!is_era_plausible(Some(1850), Some(1910), 1500));
        // Either date inside the window: included.
        assert!(is_era_plausible(Some(1450), Some(1520), 1500));
        assert!(is_era_plausible(Some(1058), Some(1111), 1500));
        // Unknown dates: included.
        assert!(is_era_plausible(None, None, 1500));
        assert!(is_era_plausible(Some(1850), None, 1500));
        assert!(is_era_plausible(None, Some(1850), 1500));
    }

    #[test]
    fn test_scoring_rewards_exact_label_and_era() {
        let exact_era = hit("Q1", "Baldwin I", "king of Jerusalem during the crusades");
        let score = score_candidate("Baldwin I", &exact_era);
        assert!((score - 0.9).abs() < 1e-6);

        let modern = hit("Q2", "Baldwin I", "20th century politician");
        assert!(score_candidate("Baldwin I", &modern) < score);
    }

    #[test]
    fn test_scoring_containment_bonus() {
        let contained = hit("Q3", "Baldwin of Boulogne", "crusader king");
        let score = score_candidate("Baldwin", &contained);
        assert!((score - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_score_clamped_to_unit_interval() {
        let awful = hit("Q4", "Somebody Else", "20th century politician and actor");
        assert_eq!(score_candidate("Baldwin", &awful), 0.0);
    }

    #[tokio::test]
    async fn test_reconcile_filters_post_cutoff_candidates() {
        let backend = MockBackend {
            hits: vec![
                hit("Q1", "Baldwin I", "king of Jerusalem"),
                hit("Q2", "Baldwin I", "American actor"),
            ],
            dates: [
                ("Q1".to_string(), (Some(1065), Some(1118))),
                ("Q2".to_string(), (Some(1958), Some(2020))),
            ]
            .into(),
            fail_search: false,
        };

        let candidates = reconciler(backend).reconcile("Baldwin I").await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].qid, "Q1");
        assert_eq!(candidates[0].birth_year, Some(1065));
    }

    #[tokio::test]
    async fn test_reconcile_ranks_by_score_and_truncates() {
        let hits: Vec<SearchHit> = (1..=6)
            .map(|i| {
                let description = if i == 3 { "medieval crusader" } else { "someone" };
                hit(&format!("Q{i}"), "Baldwin", description)
            })
            .collect();
        let backend = MockBackend {
            hits,
            dates: HashMap::new(),
            fail_search: false,
        };

        let candidates = reconciler(backend).reconcile("Baldwin").await;
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].qid, "Q3");
    }

    #[tokio::test]
    async fn test_search_failure_yields_empty_list() {
        let backend = MockBackend {
            hits: Vec::new(),
            dates: HashMap::new(),
            fail_search: true,
        };
        assert!(reconciler(backend).reconcile("Baldwin").await.is_empty());
    }
}

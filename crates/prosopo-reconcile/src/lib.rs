//! Prosopo Reconcile - External knowledge-base reconciliation
//!
//! Queries an external structured knowledge base for person mentions the
//! merger could not resolve, filters candidates by an era-plausibility
//! window, and caches results per normalized name so repeated runs are
//! idempotent and do not re-query the external service.

pub mod cache;
pub mod client;
pub mod pacing;
pub mod runner;

pub use cache::{CachedQuery, ReconCache};
pub use client::{EntitySearch, ReconCandidate, Reconciler, SearchHit, SparqlBackend};
pub use pacing::Pacer;
pub use runner::{reconcile_documents, ReconcileOutcome};

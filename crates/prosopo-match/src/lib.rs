//! Prosopo Match - Identity resolution over name mentions
//!
//! Implements the matching core of the pipeline:
//! - Name normalization into comparable keys
//! - Tiered similarity scoring (exact / alias / fuzzy)
//! - Authority index building from the curated file
//! - Mention linking with ranked candidates and deduplication
//! - Extraction-noise filtering

pub mod authority;
pub mod linker;
pub mod noise;
pub mod normalize;
pub mod similarity;

pub use authority::{build_index, load_index};
pub use linker::Linker;
pub use normalize::{normalize, slugify};
pub use similarity::score;

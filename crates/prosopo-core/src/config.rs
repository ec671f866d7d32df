//! Configuration Management
//!
//! Handles configuration from environment variables and config files
//! with sensible defaults. The matching thresholds are empirical
//! constants and must stay overridable without code changes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::LinkStatus;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Mention-linking and merge matching configuration
    pub matching: MatchConfig,

    /// External reconciliation configuration
    pub reconcile: ReconcileConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("PROSOPO_MIN_SCORE") {
            config.matching.min_score = parse_value("PROSOPO_MIN_SCORE", &v)?;
        }
        if let Ok(v) = std::env::var("PROSOPO_TOP_K") {
            config.matching.top_k = parse_value("PROSOPO_TOP_K", &v)?;
        }
        if let Ok(v) = std::env::var("PROSOPO_HIGH_THRESHOLD") {
            config.matching.high_threshold = parse_value("PROSOPO_HIGH_THRESHOLD", &v)?;
        }
        if let Ok(v) = std::env::var("PROSOPO_MEDIUM_THRESHOLD") {
            config.matching.medium_threshold = parse_value("PROSOPO_MEDIUM_THRESHOLD", &v)?;
        }
        if let Ok(v) = std::env::var("PROSOPO_LOW_THRESHOLD") {
            config.matching.low_threshold = parse_value("PROSOPO_LOW_THRESHOLD", &v)?;
        }

        if let Ok(v) = std::env::var("PROSOPO_SPARQL_ENDPOINT") {
            config.reconcile.sparql_endpoint = v;
        }
        if let Ok(v) = std::env::var("PROSOPO_USER_AGENT") {
            config.reconcile.user_agent = v;
        }
        if let Ok(v) = std::env::var("PROSOPO_MIN_DELAY_MS") {
            config.reconcile.min_delay_ms = parse_value("PROSOPO_MIN_DELAY_MS", &v)?;
        }
        if let Ok(v) = std::env::var("PROSOPO_CUTOFF_YEAR") {
            config.reconcile.cutoff_year = parse_value("PROSOPO_CUTOFF_YEAR", &v)?;
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env = Self::from_env()?;
        let defaults = Self::default();

        if env.matching.min_score != defaults.matching.min_score {
            self.matching.min_score = env.matching.min_score;
        }
        if env.matching.top_k != defaults.matching.top_k {
            self.matching.top_k = env.matching.top_k;
        }
        if env.matching.high_threshold != defaults.matching.high_threshold {
            self.matching.high_threshold = env.matching.high_threshold;
        }
        if env.matching.medium_threshold != defaults.matching.medium_threshold {
            self.matching.medium_threshold = env.matching.medium_threshold;
        }
        if env.matching.low_threshold != defaults.matching.low_threshold {
            self.matching.low_threshold = env.matching.low_threshold;
        }
        if env.reconcile.sparql_endpoint != defaults.reconcile.sparql_endpoint {
            self.reconcile.sparql_endpoint = env.reconcile.sparql_endpoint;
        }
        if env.reconcile.min_delay_ms != defaults.reconcile.min_delay_ms {
            self.reconcile.min_delay_ms = env.reconcile.min_delay_ms;
        }

        Ok(self)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Matching configuration shared by the linker and the merger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Minimum score a candidate must reach to be retained
    pub min_score: f32,

    /// Number of candidates kept per link
    pub top_k: usize,

    /// Confidence at or above which a link is classified high
    pub high_threshold: f32,

    /// Confidence at or above which a link is classified medium
    pub medium_threshold: f32,

    /// Confidence at or above which a link is classified low
    pub low_threshold: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_score: 0.60,
            top_k: 3,
            high_threshold: 0.90,
            medium_threshold: 0.75,
            low_threshold: 0.60,
        }
    }
}

impl MatchConfig {
    /// Classify a confidence value under the configured thresholds
    pub fn classify(&self, confidence: f32) -> LinkStatus {
        if confidence >= self.high_threshold {
            LinkStatus::High
        } else if confidence >= self.medium_threshold {
            LinkStatus::Medium
        } else if confidence >= self.low_threshold {
            LinkStatus::Low
        } else {
            LinkStatus::NoMatch
        }
    }
}

/// External reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// SPARQL endpoint URL
    pub sparql_endpoint: String,

    /// User-Agent header sent with every query
    pub user_agent: String,

    /// Candidates kept per reconciled name
    pub candidate_limit: usize,

    /// Inner search pool size, wider than the kept limit so that
    /// lower-ranked persons are not lost to filtered items near the top
    pub search_pool: usize,

    /// Minimum delay between external calls in milliseconds
    pub min_delay_ms: u64,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Retries per query on transport errors
    pub max_retries: u32,

    /// Initial backoff between retries in milliseconds, doubled per attempt
    pub retry_backoff_ms: u64,

    /// Persons whose birth and death both fall after this year are excluded
    pub cutoff_year: i32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            sparql_endpoint: "https://query.wikidata.org/sparql".to_string(),
            user_agent: "prosopo/0.1 (https://github.com/hephaex/prosopo)".to_string(),
            candidate_limit: 3,
            search_pool: 20,
            min_delay_ms: 500,
            timeout_secs: 15,
            max_retries: 3,
            retry_backoff_ms: 1000,
            cutoff_year: 1500,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.matching.top_k, 3);
        assert!((config.matching.min_score - 0.60).abs() < f32::EPSILON);
        assert_eq!(config.reconcile.cutoff_year, 1500);
    }

    #[test]
    fn test_classify_thresholds() {
        let m = MatchConfig::default();
        assert_eq!(m.classify(1.0), LinkStatus::High);
        assert_eq!(m.classify(0.90), LinkStatus::High);
        assert_eq!(m.classify(0.89), LinkStatus::Medium);
        assert_eq!(m.classify(0.75), LinkStatus::Medium);
        assert_eq!(m.classify(0.74), LinkStatus::Low);
        assert_eq!(m.classify(0.60), LinkStatus::Low);
        assert_eq!(m.classify(0.59), LinkStatus::NoMatch);
        assert_eq!(m.classify(0.0), LinkStatus::NoMatch);
    }

    proptest! {
        // Higher confidence never yields a worse status.
        #[test]
        fn classify_is_monotonic(c1 in 0.0f32..=1.0, c2 in 0.0f32..=1.0) {
            let m = MatchConfig::default();
            let (lo, hi) = if c1 <= c2 { (c1, c2) } else { (c2, c1) };
            prop_assert!(m.classify(lo) <= m.classify(hi));
        }
    }

    #[test]
    fn test_invalid_env_value() {
        let err = parse_value::<f32>("PROSOPO_MIN_SCORE", "not-a-number").unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "PROSOPO_MIN_SCORE"),
            other => panic!("unexpected error: {other}"),
        }
    }
}

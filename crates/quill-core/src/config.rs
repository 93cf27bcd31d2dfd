use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for Quill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuillConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub typeahead: TypeaheadConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Query cache staleness settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a cached read stays fresh, in milliseconds
    #[serde(default)]
    pub stale_time_ms: u64,
    /// Freshness window used by prefetches (hover/focus warmups)
    #[serde(default = "default_prefetch_stale_time")]
    pub prefetch_stale_time_ms: u64,
}

/// Link suggestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeaheadConfig {
    /// Token that opens a link suggestion
    #[serde(default = "default_trigger")]
    pub trigger: String,
    /// Maximum number of characters accepted after the trigger
    #[serde(default = "default_max_query_length")]
    pub max_query_length: usize,
    /// Maximum number of suggestions shown
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,
}

/// Full-text search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Characters of context kept on each side of a content match
    #[serde(default = "default_snippet_size")]
    pub snippet_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_prefetch_stale_time() -> u64 {
    10_000
}

fn default_trigger() -> String {
    "[[".to_string()
}

fn default_max_query_length() -> usize {
    20
}

fn default_suggestion_limit() -> usize {
    5
}

fn default_max_results() -> usize {
    10
}

fn default_snippet_size() -> usize {
    40
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time_ms: 0,
            prefetch_stale_time_ms: default_prefetch_stale_time(),
        }
    }
}

impl CacheConfig {
    pub fn stale_time(&self) -> Duration {
        Duration::from_millis(self.stale_time_ms)
    }

    pub fn prefetch_stale_time(&self) -> Duration {
        Duration::from_millis(self.prefetch_stale_time_ms)
    }
}

impl Default for TypeaheadConfig {
    fn default() -> Self {
        Self {
            trigger: default_trigger(),
            max_query_length: default_max_query_length(),
            suggestion_limit: default_suggestion_limit(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            snippet_size: default_snippet_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for QuillConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            typeahead: TypeaheadConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl QuillConfig {
    /// Load config from YAML text
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Configuration for the query builder pipeline
///
/// Plain serde values with defaults; loading them from files or the
/// environment is the caller's concern.
use serde::{Deserialize, Serialize};

/// Which backend the pipeline talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Search-engine backend (JSON DSL over REST)
    Search,
    /// Document-store backend (aggregation pipelines)
    Doc,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryBuilderConfig {
    /// Backend to target
    pub backend: BackendKind,

    /// Connection URL (search base URL or document-store URI)
    pub connection_url: String,

    /// Index (search) or collection (document store) to query
    pub index_or_collection: String,

    /// Database name (document store only)
    #[serde(default)]
    pub database: Option<String>,

    /// Field paths promoted to enums via distinct-value collection
    #[serde(default)]
    pub category_fields: Vec<String>,

    /// Field paths (or leaf names) excluded from the field map
    #[serde(default)]
    pub fields_to_ignore: Vec<String>,

    /// Documents sampled for schema inference (document store only)
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// LLM settings; natural-language parsing is disabled when absent
    #[serde(default)]
    pub llm: Option<LlmConfig>,

    /// Cardinality cap for grouping buckets and distinct-value sets
    #[serde(default = "default_bucket_size")]
    pub bucket_size: usize,

    /// Per-bucket document collection cap
    #[serde(default = "default_top_hits_size")]
    pub top_hits_size: usize,

    /// Total deadline budget for one orchestrator call, in milliseconds
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

/// LLM client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name (e.g. "gpt-4o")
    pub model: String,

    /// API key for the provider
    pub api_key: String,

    /// Chat-completions base URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Sampling temperature; 0.0 for deterministic filter extraction
    #[serde(default)]
    pub temperature: f32,
}

fn default_sample_size() -> usize {
    1000
}

fn default_bucket_size() -> usize {
    100
}

fn default_top_hits_size() -> usize {
    100
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for QueryBuilderConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Search,
            connection_url: "http://localhost:9200".to_string(),
            index_or_collection: "documents".to_string(),
            database: None,
            category_fields: Vec::new(),
            fields_to_ignore: Vec::new(),
            sample_size: default_sample_size(),
            llm: None,
            bucket_size: default_bucket_size(),
            top_hits_size: default_top_hits_size(),
            deadline_ms: None,
        }
    }
}

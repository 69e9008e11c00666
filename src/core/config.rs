use serde::{Deserialize, Serialize};

use crate::core::error::{NyayaError, Result};

/// Process-wide configuration, resolved once at startup.
///
/// Defaults target a local Endee index service and a local Ollama
/// embedding endpoint; every field can be overridden from the
/// environment via [`NyayaConfig::from_env`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NyayaConfig {
    /// Base URL of the vector index service, e.g. `http://localhost:8080/api/v1`.
    pub index_url: String,
    pub index_api_key: Option<String>,
    pub index_timeout_secs: u64,

    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_url: String,
    pub embedding_api_key: Option<String>,
    pub embedding_timeout_secs: u64,

    /// Directory holding the per-corpus `<corpus>_chunks.json` files.
    pub chunks_dir: String,

    pub retrieval: RetrievalConfig,
}

/// Tunables for the retrieval pipeline itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Hits requested from each corpus index per search variant.
    pub per_corpus_top_k: usize,
    /// Final cross-corpus result budget, larger than `per_corpus_top_k`
    /// so several Acts can contribute.
    pub result_budget: usize,
    /// Additive score boost for definitional sections on direct lookups.
    pub definition_boost: f64,
    /// Maximum expander-generated search variants per query (the raw
    /// query itself is always searched).
    pub max_expansions: usize,
    /// Per-corpus search deadline; a slow corpus degrades to empty.
    pub corpus_timeout_ms: u64,
    /// Outcome cache capacity; 0 disables caching.
    pub cache_size: usize,
    pub cache_ttl_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            per_corpus_top_k: 5,
            result_budget: 10,
            definition_boost: 0.15,
            max_expansions: 3,
            corpus_timeout_ms: 3000,
            cache_size: 0,
            cache_ttl_secs: 300,
        }
    }
}

impl NyayaConfig {
    pub fn new(index_url: &str) -> Self {
        Self {
            index_url: index_url.to_string(),
            index_api_key: None,
            index_timeout_secs: 10,

            embedding_provider: "ollama".to_string(),
            embedding_model: "all-minilm".to_string(),
            embedding_url: "http://localhost:11434".to_string(),
            embedding_api_key: None,
            embedding_timeout_secs: 10,

            chunks_dir: "data".to_string(),

            retrieval: RetrievalConfig::default(),
        }
    }

    pub fn from_env() -> Self {
        let mut config = Self::new(
            &std::env::var("NYAYA_INDEX_URL")
                .unwrap_or_else(|_| "http://localhost:8080/api/v1".to_string()),
        );

        if let Ok(key) = std::env::var("NYAYA_INDEX_API_KEY") {
            config.index_api_key = Some(key);
        }
        if let Ok(provider) = std::env::var("NYAYA_EMBEDDING_PROVIDER") {
            config.embedding_provider = provider;
        }
        if let Ok(model) = std::env::var("NYAYA_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Ok(url) = std::env::var("NYAYA_EMBEDDING_URL") {
            config.embedding_url = url;
        }
        if let Ok(key) = std::env::var("NYAYA_EMBEDDING_API_KEY") {
            config.embedding_api_key = Some(key);
        }
        if let Ok(dir) = std::env::var("NYAYA_CHUNKS_DIR") {
            config.chunks_dir = dir;
        }
        if let Ok(k) = std::env::var("NYAYA_TOP_K") {
            if let Ok(k) = k.parse() {
                config.retrieval.per_corpus_top_k = k;
            }
        }
        if let Ok(budget) = std::env::var("NYAYA_RESULT_BUDGET") {
            if let Ok(budget) = budget.parse() {
                config.retrieval.result_budget = budget;
            }
        }

        config
    }

    /// Rejects malformed endpoints before any client is built.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.index_url)
            .map_err(|e| NyayaError::Config(format!("invalid index_url '{}': {}", self.index_url, e)))?;
        url::Url::parse(&self.embedding_url).map_err(|e| {
            NyayaError::Config(format!("invalid embedding_url '{}': {}", self.embedding_url, e))
        })?;
        if self.retrieval.per_corpus_top_k == 0 {
            return Err(NyayaError::Config("per_corpus_top_k must be non-zero".to_string()));
        }
        if self.retrieval.result_budget == 0 {
            return Err(NyayaError::Config("result_budget must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Default for NyayaConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080/api/v1")
    }
}

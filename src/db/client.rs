use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::corpus::Corpus;
use crate::search::models::MatchCandidate;

const MAX_RETRIES: u32 = 3;
const INITIAL_RETRY_DELAY_MS: u64 = 100;
const MAX_RETRY_DELAY_MS: u64 = 2000;

#[derive(Debug, Error)]
pub enum IndexClientError {
    #[error("No vector index for corpus '{0}' (expected index '{1}')")]
    MissingIndex(Corpus, String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid response from index service: {0}")]
    InvalidResponse(String),
    #[error("Search on '{index}' exhausted {attempts} attempts: {last_error}")]
    RetryExhausted {
        index: String,
        attempts: u32,
        last_error: String,
    },
}

impl IndexClientError {
    /// Missing-index is a deployment mistake, not a transient outage;
    /// the retriever reports it differently.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingIndex(..))
    }
}

/// Outcome of one nearest-neighbor query against a single corpus index.
#[derive(Debug, Clone, Default)]
pub struct IndexSearchResult {
    /// Ranked by descending similarity; scores are opaque floats from
    /// the external engine (higher is more similar, no scale assumed).
    pub candidates: Vec<MatchCandidate>,
    /// True when the index returned fewer hits than requested, e.g.
    /// fewer vectors indexed than `top_k`. Never silently truncated.
    pub partial: bool,
}

/// Seam for the external per-corpus nearest-neighbor service.
///
/// Read-only and idempotent; implementations may retry internally, the
/// retrieval core never does.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(
        &self,
        corpus: Corpus,
        vector: &[f32],
        top_k: usize,
    ) -> Result<IndexSearchResult, IndexClientError>;
}

#[derive(Serialize)]
struct SearchRequestBody<'a> {
    vector: &'a [f32],
    top_k: usize,
}

#[derive(Deserialize)]
struct SearchHit {
    id: String,
    score: f64,
}

#[derive(Deserialize)]
struct SearchResponseBody {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Thin adapter for the Endee vector index service. One named index is
/// addressed per corpus (`<corpus>_sections`).
pub struct EndeeClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl EndeeClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, IndexClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        debug!("EndeeClient created for {}", base_url);
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn search_url(&self, index_name: &str) -> String {
        format!("{}/index/{}/search", self.base_url, index_name)
    }

    async fn search_once(
        &self,
        corpus: Corpus,
        index_name: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<IndexSearchResult, IndexClientError> {
        let body = SearchRequestBody { vector, top_k };

        let mut request = self.client.post(self.search_url(index_name)).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(IndexClientError::MissingIndex(corpus, index_name.to_string()));
        }
        let response = response.error_for_status()?;

        let parsed: SearchResponseBody = response
            .json()
            .await
            .map_err(|e| IndexClientError::InvalidResponse(e.to_string()))?;

        let candidates: Vec<MatchCandidate> = parsed
            .results
            .into_iter()
            .map(|hit| MatchCandidate {
                id: hit.id,
                raw_score: hit.score,
                corpus,
            })
            .collect();

        let partial = candidates.len() < top_k;
        if partial {
            debug!(
                "Index {} returned {} of {} requested hits",
                index_name,
                candidates.len(),
                top_k
            );
        }

        Ok(IndexSearchResult { candidates, partial })
    }
}

#[async_trait]
impl VectorIndex for EndeeClient {
    async fn search(
        &self,
        corpus: Corpus,
        vector: &[f32],
        top_k: usize,
    ) -> Result<IndexSearchResult, IndexClientError> {
        let index_name = corpus.index_name();
        let mut delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            debug!("Searching {} (attempt {})", index_name, attempt);

            match self.search_once(corpus, &index_name, vector, top_k).await {
                Ok(result) => return Ok(result),
                // A missing index will not appear on retry.
                Err(e @ IndexClientError::MissingIndex(..)) => return Err(e),
                Err(e) => {
                    warn!("Search on {} failed (attempt {}): {}", index_name, attempt, e);
                    last_error = Some(e.to_string());
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(Duration::from_millis(MAX_RETRY_DELAY_MS));
                    }
                }
            }
        }

        Err(IndexClientError::RetryExhausted {
            index: index_name,
            attempts: MAX_RETRIES,
            last_error: last_error.unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

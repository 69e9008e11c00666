use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::utils::safe_truncate;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty text")]
    EmptyText,

    #[error("Provider not implemented: {0}")]
    NotImplemented(String),
}

/// Black-box embedding computation: text in, fixed-dimension vector out.
/// Each call carries its own timeout/error surface so a slow provider
/// degrades one search variant, never the whole request.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct OpenAiEmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

struct CacheEntry {
    embedding: Vec<f32>,
    created_at: Instant,
}

/// Query texts repeat heavily (the expander emits the same variants for
/// the same offenses), so a small TTL cache saves round-trips.
struct EmbeddingCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_size: usize,
    ttl: Duration,
}

impl EmbeddingCache {
    fn new(max_size: usize, ttl_secs: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_size,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    fn get(&self, text: &str) -> Option<Vec<f32>> {
        let entries = self.entries.read();
        entries.get(text).and_then(|entry| {
            (entry.created_at.elapsed() < self.ttl).then(|| entry.embedding.clone())
        })
    }

    fn set(&self, text: &str, embedding: Vec<f32>) {
        let mut entries = self.entries.write();
        if entries.len() >= self.max_size {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, v)| v.created_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            text.to_string(),
            CacheEntry {
                embedding,
                created_at: Instant::now(),
            },
        );
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// HTTP embedding client speaking either the Ollama or an
/// OpenAI-compatible embeddings API.
pub struct EmbeddingGenerator {
    provider: String,
    model: String,
    base_url: String,
    api_key: Option<String>,
    client: Client,
    cache: EmbeddingCache,
}

impl EmbeddingGenerator {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
        cache_size: usize,
        cache_ttl_secs: u64,
    ) -> Result<Self, EmbeddingError> {
        let provider = provider.into().to_lowercase();
        let model = model.into();
        let base_url = base_url.into().trim_end_matches('/').to_string();

        info!(
            "EmbeddingGenerator initialized: provider={}, model={}, cache={}",
            provider, model, cache_size
        );

        Ok(Self {
            provider,
            model,
            base_url,
            api_key,
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()?,
            cache: EmbeddingCache::new(cache_size.max(1), cache_ttl_secs),
        })
    }

    async fn embed_ollama(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = OllamaEmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<OllamaEmbeddingResponse>()
            .await?;

        if response.embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse(
                "empty embedding vector".to_string(),
            ));
        }
        Ok(response.embedding)
    }

    async fn embed_openai(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| EmbeddingError::InvalidResponse("API key required".to_string()))?;

        let request = OpenAiEmbeddingRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<OpenAiEmbeddingResponse>()
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding in response".to_string()))
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingGenerator {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        if let Some(cached) = self.cache.get(text) {
            debug!("Embedding cache HIT for: {}...", safe_truncate(text, 40));
            return Ok(cached);
        }

        let embedding = match self.provider.as_str() {
            "ollama" => self.embed_ollama(text).await?,
            "openai" => self.embed_openai(text).await?,
            other => return Err(EmbeddingError::NotImplemented(other.to_string())),
        };

        self.cache.set(text, embedding.clone());
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_roundtrip() {
        let cache = EmbeddingCache::new(2, 60);
        cache.set("theft", vec![0.1, 0.2]);
        assert_eq!(cache.get("theft"), Some(vec![0.1, 0.2]));
        assert_eq!(cache.get("riot"), None);
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let cache = EmbeddingCache::new(2, 60);
        cache.set("a", vec![1.0]);
        cache.set("b", vec![2.0]);
        cache.set("c", vec![3.0]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("c"), Some(vec![3.0]));
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let generator =
            EmbeddingGenerator::new("ollama", "all-minilm", "http://localhost:11434", None, 5, 8, 60)
                .unwrap();
        assert!(matches!(
            generator.embed("   ").await,
            Err(EmbeddingError::EmptyText)
        ));
    }

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let generator =
            EmbeddingGenerator::new("cohere", "x", "http://localhost:9", None, 5, 8, 60).unwrap();
        assert!(matches!(
            generator.embed("theft").await,
            Err(EmbeddingError::NotImplemented(_))
        ));
    }
}

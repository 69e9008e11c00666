use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::core::config::RetrievalConfig;
use crate::corpus::{Corpus, DocumentStore};
use crate::db::VectorIndex;
use crate::llm::EmbeddingProvider;
use crate::utils::safe_truncate;

use super::cache::SearchCache;
use super::expander::ConceptExpander;
use super::models::{
    CorpusFailure, MatchCandidate, QueryIntent, RetrievalOutcome, RetrievalResult, RoutedQuery,
    SearchRequest,
};
use super::ranking::{boosted_score, merge_candidates, sort_results};
use super::router::QueryRouter;

/// Orchestrates the full pipeline: route, expand, embed, fan out
/// per-corpus vector searches, merge, boost, resolve, rank.
///
/// Stateless between requests apart from the read-only document store,
/// the expander table and the optional outcome cache; safe to share
/// behind an `Arc` across concurrent requests.
pub struct Retriever {
    router: QueryRouter,
    expander: ConceptExpander,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<DocumentStore>,
    config: RetrievalConfig,
    cache: Option<SearchCache<RetrievalOutcome>>,
}

impl Retriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<DocumentStore>,
        config: RetrievalConfig,
    ) -> Self {
        let cache = (config.cache_size > 0)
            .then(|| SearchCache::new(config.cache_size, config.cache_ttl_secs));

        info!(
            "Retriever initialized: top_k={}, budget={}, cache={}",
            config.per_corpus_top_k,
            config.result_budget,
            config.cache_size
        );

        Self {
            router: QueryRouter::new(),
            expander: ConceptExpander::new(),
            index,
            embedder,
            store,
            config,
            cache,
        }
    }

    /// Runs one query through the pipeline. Never fails: corpus-level
    /// problems degrade that corpus's contribution and total upstream
    /// failure is reported through [`RetrievalOutcome::degraded`].
    pub async fn retrieve(&self, query: &str) -> RetrievalOutcome {
        let cache_key = self
            .cache
            .as_ref()
            .map(|_| SearchCache::<RetrievalOutcome>::make_key(query, self.config.result_budget));

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(outcome) = cache.get(key) {
                debug!("Outcome cache HIT for: {}...", safe_truncate(query, 40));
                return outcome;
            }
        }

        let routed = self.router.classify(query);
        info!(
            "Retrieving '{}...' [{:?}, {} corpora]",
            safe_truncate(query, 50),
            routed.intent,
            routed.corpora.len()
        );

        let outcome = self.run_pipeline(query, &routed).await;

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            cache.set(key, outcome.clone());
        }
        outcome
    }

    async fn run_pipeline(&self, query: &str, routed: &RoutedQuery) -> RetrievalOutcome {
        // Exact lookup path: a cited section resolves straight from the
        // document store, bypassing broad semantic search.
        if routed.intent == QueryIntent::SectionCitation {
            if let Some(section) = &routed.section {
                let results = self.lookup_citation(routed, section);
                if !results.is_empty() {
                    return RetrievalOutcome {
                        intent: routed.intent,
                        results,
                        failures: Vec::new(),
                        degraded: false,
                    };
                }
                debug!(
                    "Cited section {} not in store, falling back to semantic search",
                    section
                );
            }
        }

        let variants = self.term_variants(query, routed);
        let requests = self.build_requests(query, routed, &variants[1..]);

        let embedded = self.embed_variants(&variants).await;
        if embedded.is_empty() {
            warn!("Embedding provider unreachable, no search possible");
            return RetrievalOutcome::degraded(
                routed.intent,
                routed
                    .corpora
                    .iter()
                    .map(|corpus| CorpusFailure {
                        corpus: *corpus,
                        error: "embedding provider unavailable".to_string(),
                    })
                    .collect(),
            );
        }

        let (candidates, failures) = self.fan_out(&requests, &embedded).await;
        let all_failed = failures.len() == routed.corpora.len();

        let merged = merge_candidates(candidates);
        let mut results = self.resolve_and_boost(merged, routed.intent);
        sort_results(&mut results);
        results.truncate(self.config.result_budget);

        let degraded = results.is_empty() && all_failed && !routed.corpora.is_empty();
        info!(
            "Retrieved {} sections ({} corpus failures{})",
            results.len(),
            failures.len(),
            if degraded { ", degraded" } else { "" }
        );

        RetrievalOutcome {
            intent: routed.intent,
            results,
            failures,
            degraded,
        }
    }

    fn lookup_citation(&self, routed: &RoutedQuery, section: &str) -> Vec<RetrievalResult> {
        let mut results = Vec::new();
        for corpus in &routed.corpora {
            for record in self.store.find_section(*corpus, section) {
                results.push(RetrievalResult {
                    record: record.clone(),
                    final_score: 1.0,
                    matched_corpus: *corpus,
                    boosted: false,
                });
            }
        }
        results.truncate(self.config.result_budget);
        results
    }

    fn term_variants(&self, query: &str, routed: &RoutedQuery) -> Vec<String> {
        let mut variants = vec![query.to_string()];
        // Citation lookups target an exact section; widening vocabulary
        // would only add noise.
        if routed.intent != QueryIntent::SectionCitation {
            variants.extend(
                self.expander
                    .query_variants(query, self.config.max_expansions),
            );
        }
        variants
    }

    fn build_requests(
        &self,
        query: &str,
        routed: &RoutedQuery,
        expanded_terms: &[String],
    ) -> Vec<SearchRequest> {
        routed
            .corpora
            .iter()
            .map(|corpus| SearchRequest {
                query_text: query.to_string(),
                corpus: *corpus,
                top_k: self.config.per_corpus_top_k,
                expanded_terms: expanded_terms.to_vec(),
            })
            .collect()
    }

    /// Embeds every term variant, dropping the ones that fail. An empty
    /// return means the provider is effectively unreachable.
    async fn embed_variants(&self, variants: &[String]) -> Vec<Vec<f32>> {
        let futures = variants.iter().map(|text| self.embedder.embed(text));
        join_all(futures)
            .await
            .into_iter()
            .zip(variants)
            .filter_map(|(result, text)| match result {
                Ok(vector) => Some(vector),
                Err(e) => {
                    warn!("Embedding failed for '{}': {}", safe_truncate(text, 40), e);
                    None
                }
            })
            .collect()
    }

    /// Issues every (corpus, variant) search concurrently, each under
    /// its own deadline, and waits for all of them. A corpus counts as
    /// failed only when none of its variant searches produced results.
    async fn fan_out(
        &self,
        requests: &[SearchRequest],
        embedded: &[Vec<f32>],
    ) -> (Vec<MatchCandidate>, Vec<CorpusFailure>) {
        let deadline = Duration::from_millis(self.config.corpus_timeout_ms);

        let searches = requests.iter().flat_map(|request| {
            embedded.iter().map(move |vector| {
                let corpus = request.corpus;
                let top_k = request.top_k;
                async move {
                    let outcome =
                        tokio::time::timeout(deadline, self.index.search(corpus, vector, top_k))
                            .await;
                    let flattened = match outcome {
                        Ok(Ok(result)) => Ok(result),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err(format!("search timed out after {:?}", deadline)),
                    };
                    (corpus, flattened)
                }
            })
        });

        let mut candidates = Vec::new();
        let mut errors: HashMap<Corpus, String> = HashMap::new();
        let mut healthy: HashSet<Corpus> = HashSet::new();

        for (corpus, outcome) in join_all(searches).await {
            match outcome {
                Ok(result) => {
                    if result.partial {
                        debug!("Partial result from {}", corpus.index_name());
                    }
                    healthy.insert(corpus);
                    candidates.extend(result.candidates);
                }
                Err(error) => {
                    warn!("Search failed on {}: {}", corpus.index_name(), error);
                    errors.entry(corpus).or_insert(error);
                }
            }
        }

        let mut failures: Vec<CorpusFailure> = errors
            .into_iter()
            .filter(|(corpus, _)| !healthy.contains(corpus))
            .map(|(corpus, error)| CorpusFailure { corpus, error })
            .collect();
        failures.sort_by_key(|f| f.corpus);

        (candidates, failures)
    }

    /// Resolves each candidate through the document store and applies
    /// the definitional boost. Unresolvable identifiers are dropped
    /// with a consistency warning (stale index vs. document store),
    /// never surfaced.
    fn resolve_and_boost(
        &self,
        candidates: Vec<MatchCandidate>,
        intent: QueryIntent,
    ) -> Vec<RetrievalResult> {
        let mut results = Vec::new();

        for candidate in candidates {
            let Some(record) = self.store.get(&candidate.id) else {
                warn!(
                    "Consistency: vector match '{}' missing from document store, dropping",
                    candidate.id
                );
                continue;
            };

            let (final_score, boosted) =
                boosted_score(&candidate, record, intent, self.config.definition_boost);

            results.push(RetrievalResult {
                record: record.clone(),
                final_score,
                matched_corpus: candidate.corpus,
                boosted,
            });
        }

        results
    }

    pub fn cache_stats(&self) -> Option<super::cache::CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::corpus::SectionRecord;
    use crate::db::{IndexClientError, IndexSearchResult};
    use crate::llm::EmbeddingError;

    fn record(id: &str, corpus: Corpus, section: &str, heading: &str, chapter: &str) -> SectionRecord {
        SectionRecord {
            id: id.to_string(),
            corpus,
            section: section.to_string(),
            section_display: format!("Section {}", section.trim_start_matches('0')),
            heading: heading.to_string(),
            chapter: chapter.to_string(),
            content: format!("{} Section {}: {}", corpus, section, heading),
        }
    }

    fn legal_store() -> Arc<DocumentStore> {
        Arc::new(
            DocumentStore::from_records(vec![
                record("bns_303_0", Corpus::Bns, "303", "Theft", "Of Offences Against Property"),
                record("bns_304_1", Corpus::Bns, "304", "Snatching", "Of Offences Against Property"),
                record("bns_002_2", Corpus::Bns, "002", "Definitions", "Preliminary"),
                record("ipc_378_0", Corpus::Ipc, "378", "Theft", "Of Offences Against Property"),
                record("ipc_302_1", Corpus::Ipc, "302", "Punishment for murder", "Of Offences Affecting Life"),
                record("bsa_045_0", Corpus::Bsa, "045", "Opinions of experts", "Relevancy of Facts"),
            ])
            .unwrap(),
        )
    }

    /// Test double for the external index: canned hits per corpus, an
    /// optional failing-corpus set, and a call counter.
    struct FakeIndex {
        hits: HashMap<Corpus, Vec<(String, f64)>>,
        failing: HashSet<Corpus>,
        calls: Mutex<usize>,
    }

    impl FakeIndex {
        fn new() -> Self {
            Self {
                hits: HashMap::new(),
                failing: HashSet::new(),
                calls: Mutex::new(0),
            }
        }

        fn with_hits(mut self, corpus: Corpus, hits: &[(&str, f64)]) -> Self {
            self.hits.insert(
                corpus,
                hits.iter().map(|(id, s)| (id.to_string(), *s)).collect(),
            );
            self
        }

        fn with_failure(mut self, corpus: Corpus) -> Self {
            self.failing.insert(corpus);
            self
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn search(
            &self,
            corpus: Corpus,
            _vector: &[f32],
            top_k: usize,
        ) -> Result<IndexSearchResult, IndexClientError> {
            *self.calls.lock() += 1;

            if self.failing.contains(&corpus) {
                return Err(IndexClientError::RetryExhausted {
                    index: corpus.index_name(),
                    attempts: 3,
                    last_error: "connection refused".to_string(),
                });
            }

            let candidates: Vec<MatchCandidate> = self
                .hits
                .get(&corpus)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .take(top_k)
                .map(|(id, raw_score)| MatchCandidate {
                    id,
                    raw_score,
                    corpus,
                })
                .collect();

            let partial = candidates.len() < top_k;
            Ok(IndexSearchResult { candidates, partial })
        }
    }

    struct FakeEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if self.fail {
                return Err(EmbeddingError::InvalidResponse("unreachable".to_string()));
            }
            // Deterministic per text; content is irrelevant to fakes.
            let seed = text.len() as f32;
            Ok(vec![seed; 8])
        }
    }

    fn retriever(index: FakeIndex, embed_fail: bool) -> Retriever {
        Retriever::new(
            Arc::new(index),
            Arc::new(FakeEmbedder { fail: embed_fail }),
            legal_store(),
            RetrievalConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_citation_resolves_from_store_without_search() {
        let index = Arc::new(FakeIndex::new());
        let r = Retriever::new(
            index.clone(),
            Arc::new(FakeEmbedder { fail: false }),
            legal_store(),
            RetrievalConfig::default(),
        );

        let outcome = r.retrieve("Section 302 IPC").await;
        assert_eq!(outcome.intent, QueryIntent::SectionCitation);
        assert!(!outcome.degraded);
        assert!(outcome.results[0].record.id.starts_with("ipc_302"));
        assert_eq!(outcome.results[0].final_score, 1.0);
        // Exact lookup path: no vector search was issued.
        assert_eq!(index.calls(), 0);
    }

    #[tokio::test]
    async fn test_citation_miss_falls_back_to_semantic_search() {
        let index = FakeIndex::new().with_hits(Corpus::Ipc, &[("ipc_378_0", 0.8)]);
        let r = retriever(index, false);

        // Section 999 exists in no Act; the raw query is still searched.
        let outcome = r.retrieve("Section 999 IPC").await;
        assert_eq!(outcome.intent, QueryIntent::SectionCitation);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].record.id, "ipc_378_0");
    }

    #[tokio::test]
    async fn test_theft_query_ranks_theft_heading_first() {
        let index = FakeIndex::new()
            .with_hits(Corpus::Bns, &[("bns_303_0", 0.9), ("bns_304_1", 0.6)])
            .with_hits(Corpus::Ipc, &[("ipc_378_0", 0.8)]);
        let r = retriever(index, false);

        let outcome = r.retrieve("What is punishment for theft?").await;
        assert!(!outcome.results.is_empty());
        assert!(outcome.results[0].record.heading.contains("Theft"));
        let snatching_rank = outcome
            .results
            .iter()
            .position(|res| res.record.id == "bns_304_1")
            .unwrap();
        assert!(snatching_rank > 0);
    }

    #[tokio::test]
    async fn test_one_corpus_failing_keeps_healthy_results() {
        let index = FakeIndex::new()
            .with_hits(Corpus::Bns, &[("bns_303_0", 0.9)])
            .with_failure(Corpus::Ipc);
        let r = retriever(index, false);

        let outcome = r.retrieve("What is punishment for theft?").await;
        assert!(!outcome.degraded);
        assert!(!outcome.results.is_empty());
        assert!(outcome.failures.iter().any(|f| f.corpus == Corpus::Ipc));
    }

    #[tokio::test]
    async fn test_all_corpora_failing_degrades() {
        let mut index = FakeIndex::new();
        for corpus in Corpus::all() {
            index = index.with_failure(corpus);
        }
        let r = retriever(index, false);

        let outcome = r.retrieve("punishment for theft").await;
        assert!(outcome.degraded);
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.failures.len(), Corpus::all().len());
        // No grounding: the generative step must not be invoked.
        assert!(outcome.grounding_context().is_none());
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades() {
        let index = FakeIndex::new().with_hits(Corpus::Bns, &[("bns_303_0", 0.9)]);
        let r = retriever(index, true);

        let outcome = r.retrieve("punishment for theft").await;
        assert!(outcome.degraded);
        assert!(outcome.results.is_empty());
        assert!(!outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_ids_are_dropped() {
        let index = FakeIndex::new()
            .with_hits(Corpus::Bns, &[("bns_999_9", 0.95), ("bns_303_0", 0.7)]);
        let r = retriever(index, false);

        let outcome = r.retrieve("punishment for theft").await;
        assert!(outcome.results.iter().all(|res| res.record.id != "bns_999_9"));
        assert_eq!(outcome.results[0].record.id, "bns_303_0");
    }

    #[tokio::test]
    async fn test_duplicate_hits_across_variants_keep_max_score() {
        // "theft" expands to several variants; every variant search hits
        // the same section with different scores.
        let index = FakeIndex::new().with_hits(Corpus::Bns, &[("bns_303_0", 0.85)]);
        let r = retriever(index, false);

        let outcome = r.retrieve("theft of a vehicle").await;
        let occurrences = outcome
            .results
            .iter()
            .filter(|res| res.record.id == "bns_303_0")
            .count();
        assert_eq!(occurrences, 1);
        assert!(outcome.results[0].final_score >= 0.85);
    }

    #[tokio::test]
    async fn test_definitional_boost_applied_once_on_direct_lookup() {
        let index = FakeIndex::new()
            .with_hits(Corpus::Bns, &[("bns_002_2", 0.70), ("bns_303_0", 0.75)]);
        let r = retriever(index, false);

        let outcome = r.retrieve("definition of movable property").await;
        let definitional = outcome
            .results
            .iter()
            .find(|res| res.record.id == "bns_002_2")
            .unwrap();
        assert!(definitional.boosted);
        // 0.70 + 0.15 boost outranks the 0.75 raw hit.
        assert!((definitional.final_score - 0.85).abs() < 1e-9);
        assert_eq!(outcome.results[0].record.id, "bns_002_2");
    }

    #[tokio::test]
    async fn test_scenario_intent_gets_no_boost() {
        let index = FakeIndex::new()
            .with_hits(Corpus::Bns, &[("bns_002_2", 0.70), ("bns_303_0", 0.75)]);
        let r = retriever(index, false);

        let outcome = r.retrieve("Someone stole my car from the driveway").await;
        assert_eq!(outcome.intent, QueryIntent::Scenario);
        assert!(outcome.results.iter().all(|res| !res.boosted));
        assert_eq!(outcome.results[0].record.id, "bns_303_0");
    }

    #[tokio::test]
    async fn test_result_budget_truncates() {
        let hits: Vec<(String, f64)> = (0..6)
            .map(|i| (format!("bns_30{}_{}", 3 + (i % 2), i), 0.9 - i as f64 * 0.01))
            .collect();
        let hit_refs: Vec<(&str, f64)> = hits.iter().map(|(id, s)| (id.as_str(), *s)).collect();
        let index = FakeIndex::new().with_hits(Corpus::Bns, &hit_refs);

        let mut config = RetrievalConfig::default();
        config.result_budget = 2;
        let r = Retriever::new(
            Arc::new(index),
            Arc::new(FakeEmbedder { fail: false }),
            legal_store(),
            config,
        );

        let outcome = r.retrieve("property offences").await;
        assert!(outcome.results.len() <= 2);
    }

    #[tokio::test]
    async fn test_outcome_cache_short_circuits_pipeline() {
        let mut config = RetrievalConfig::default();
        config.cache_size = 16;

        let index = FakeIndex::new().with_hits(Corpus::Bns, &[("bns_303_0", 0.9)]);
        let r = Retriever::new(
            Arc::new(index),
            Arc::new(FakeEmbedder { fail: false }),
            legal_store(),
            config,
        );

        let first = r.retrieve("punishment for theft").await;
        let stats_after_first = r.cache_stats().unwrap();
        let second = r.retrieve("punishment for theft").await;
        let stats_after_second = r.cache_stats().unwrap();

        assert_eq!(first.results.len(), second.results.len());
        assert_eq!(stats_after_first.hits, 0);
        assert_eq!(stats_after_second.hits, 1);
    }
}

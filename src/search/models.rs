use serde::{Deserialize, Serialize};

use crate::corpus::{Corpus, SectionRecord};

/// What kind of question the user is asking. Closed set; classification
/// is deterministic so retrieval behavior is reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// Generic question about a legal concept ("punishment for theft").
    DirectLookup,
    /// A fact pattern to match against multiple possible offenses.
    Scenario,
    /// Names an explicit section/Act ("Section 302 IPC"); takes the
    /// exact-lookup path where possible.
    SectionCitation,
}

/// Router output: where to search and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutedQuery {
    pub intent: QueryIntent,
    /// Non-empty subset of configured Acts.
    pub corpora: Vec<Corpus>,
    /// Normalized (zero-padded) section number, citation intent only.
    pub section: Option<String>,
}

/// One per corpus per user query; ephemeral.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query_text: String,
    pub corpus: Corpus,
    pub top_k: usize,
    pub expanded_terms: Vec<String>,
}

/// A single vector-search hit. The id alone is not unique across
/// corpora (the same section number can exist in several Acts); the
/// corpus tag disambiguates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub id: String,
    pub raw_score: f64,
    pub corpus: Corpus,
}

/// Final output unit: a resolved section with its adjusted score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub record: SectionRecord,
    pub final_score: f64,
    pub matched_corpus: Corpus,
    /// Set when the definitional boost was applied; guards against
    /// double application.
    pub boosted: bool,
}

/// A corpus that contributed nothing this request, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusFailure {
    pub corpus: Corpus,
    pub error: String,
}

/// Caller-facing wrapper around the ranked results.
///
/// `degraded` distinguishes "searched fine, nothing relevant" from
/// "every upstream failed"; the caller shows a no-grounding notice for
/// the former and a service notice for the latter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    pub intent: QueryIntent,
    /// Highest relevance first.
    pub results: Vec<RetrievalResult>,
    pub failures: Vec<CorpusFailure>,
    pub degraded: bool,
}

impl RetrievalOutcome {
    pub fn empty(intent: QueryIntent) -> Self {
        Self {
            intent,
            results: Vec::new(),
            failures: Vec::new(),
            degraded: false,
        }
    }

    pub fn degraded(intent: QueryIntent, failures: Vec<CorpusFailure>) -> Self {
        Self {
            intent,
            results: Vec::new(),
            failures,
            degraded: true,
        }
    }

    /// Joined section texts for the generative step. `None` when there
    /// is nothing to ground on; the generative call must not be made in
    /// that case.
    pub fn grounding_context(&self) -> Option<String> {
        if self.results.is_empty() {
            return None;
        }
        Some(
            self.results
                .iter()
                .map(|r| r.record.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        )
    }
}

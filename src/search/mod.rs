pub mod cache;
pub mod expander;
pub mod models;
pub mod ranking;
pub mod retriever;
pub mod router;

pub use cache::{CacheStats, SearchCache};
pub use expander::ConceptExpander;
pub use models::{
    CorpusFailure, MatchCandidate, QueryIntent, RetrievalOutcome, RetrievalResult, RoutedQuery,
    SearchRequest,
};
pub use retriever::Retriever;
pub use router::QueryRouter;

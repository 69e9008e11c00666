pub mod core;
pub mod corpus;
pub mod db;
pub mod llm;
pub mod search;
pub mod utils;

pub use utils::{safe_truncate, safe_truncate_ellipsis};

pub use core::config::{NyayaConfig, RetrievalConfig};
pub use core::error::{NyayaError, Result};
pub use corpus::{Corpus, DocumentStore, SectionRecord};
pub use db::{EndeeClient, VectorIndex};
pub use llm::{EmbeddingGenerator, EmbeddingProvider};
pub use search::{QueryIntent, RetrievalOutcome, Retriever};

pub const DEFAULT_INDEX_URL: &str = "http://localhost:8080/api/v1";

pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11434";

pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

/// Dimension of the default embedding model's vectors; the external
/// indexes are created with the same dimension by the offline embed job.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

pub mod embeddings;

pub use embeddings::{EmbeddingError, EmbeddingGenerator, EmbeddingProvider};

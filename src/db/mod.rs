pub mod client;

pub use client::{EndeeClient, IndexClientError, IndexSearchResult, VectorIndex};

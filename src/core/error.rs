use thiserror::Error;

use crate::corpus::StoreError;
use crate::db::IndexClientError;
use crate::llm::EmbeddingError;

/// Crate-level error taxonomy.
///
/// `Config` is fatal at startup; `Upstream` is per-call and recoverable
/// (a corpus degrades to zero contribution, the request continues).
/// Consistency problems (stale index ids) and empty results are states,
/// not errors, and never appear here.
#[derive(Error, Debug)]
pub enum NyayaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream service unavailable: {0}")]
    Upstream(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, NyayaError>;

impl From<StoreError> for NyayaError {
    fn from(e: StoreError) -> Self {
        // Malformed or duplicated chunk sources are deployment
        // mistakes, caught at startup.
        NyayaError::Config(e.to_string())
    }
}

impl From<IndexClientError> for NyayaError {
    fn from(e: IndexClientError) -> Self {
        if e.is_configuration() {
            NyayaError::Config(e.to_string())
        } else {
            NyayaError::Upstream(e.to_string())
        }
    }
}

impl From<EmbeddingError> for NyayaError {
    fn from(e: EmbeddingError) -> Self {
        NyayaError::Upstream(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;

    #[test]
    fn test_missing_index_maps_to_config() {
        let err: NyayaError =
            IndexClientError::MissingIndex(Corpus::Cpc, "cpc_sections".to_string()).into();
        assert!(matches!(err, NyayaError::Config(_)));
    }

    #[test]
    fn test_transport_failure_maps_to_upstream() {
        let err: NyayaError = IndexClientError::RetryExhausted {
            index: "bns_sections".to_string(),
            attempts: 3,
            last_error: "connection refused".to_string(),
        }
        .into();
        assert!(matches!(err, NyayaError::Upstream(_)));
    }

    #[test]
    fn test_store_error_maps_to_config() {
        let err: NyayaError = StoreError::DuplicateId("bns_303_0".to_string()).into();
        assert!(matches!(err, NyayaError::Config(_)));
    }
}

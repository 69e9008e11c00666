pub mod config;
pub mod error;

pub use config::{NyayaConfig, RetrievalConfig};
pub use error::{NyayaError, Result};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{RawChunk, SectionRecord};
use super::Corpus;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Chunk file not found: {0}")]
    MissingFile(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed chunk file {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Duplicate section id '{0}' in chunk source")]
    DuplicateId(String),
}

/// Read-only in-memory map from section id to full section record.
///
/// Loaded once at startup from the per-corpus chunk files; there is no
/// update or delete path (reindexing is an external offline job), so the
/// store is safely shared across concurrent requests without locking.
pub struct DocumentStore {
    records: HashMap<String, SectionRecord>,
}

impl DocumentStore {
    /// Loads `<corpus>_chunks.json` for every configured corpus from
    /// `dir`. A missing file is tolerated with a warning (an Act may not
    /// be converted yet); a malformed file or duplicate id is fatal.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        let mut records = HashMap::new();

        for corpus in Corpus::all() {
            let path = dir.join(format!("{}_chunks.json", corpus));
            if !path.exists() {
                warn!("No chunk file for {} at {}, skipping", corpus, path.display());
                continue;
            }

            let loaded = Self::load_file(&path, corpus, &mut records)?;
            info!("Loaded {} sections for {}", loaded, corpus);
        }

        info!("Document store ready: {} sections total", records.len());
        Ok(Self { records })
    }

    /// Builds a store directly from records. Test and embedded-data path.
    pub fn from_records(input: Vec<SectionRecord>) -> Result<Self, StoreError> {
        let mut records = HashMap::new();
        for record in input {
            let id = record.id.clone();
            if records.insert(id.clone(), record).is_some() {
                return Err(StoreError::DuplicateId(id));
            }
        }
        Ok(Self { records })
    }

    fn load_file(
        path: &Path,
        corpus: Corpus,
        records: &mut HashMap<String, SectionRecord>,
    ) -> Result<usize, StoreError> {
        let data = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let chunks: Vec<RawChunk> =
            serde_json::from_str(&data).map_err(|source| StoreError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        let count = chunks.len();
        for chunk in chunks {
            let record = chunk.into_record(corpus);
            let id = record.id.clone();
            if records.insert(id.clone(), record).is_some() {
                return Err(StoreError::DuplicateId(id));
            }
        }

        debug!("Parsed {} chunks from {}", count, path.display());
        Ok(count)
    }

    /// O(1) lookup by section id. `None` is a recoverable condition for
    /// the retriever (stale index entry), not a hard failure.
    pub fn get(&self, id: &str) -> Option<&SectionRecord> {
        self.records.get(id)
    }

    /// All records of `corpus` whose normalized section number matches,
    /// ordered by id for determinism. Used by the citation fast path.
    pub fn find_section(&self, corpus: Corpus, section: &str) -> Vec<&SectionRecord> {
        let mut matches: Vec<&SectionRecord> = self
            .records
            .values()
            .filter(|r| r.corpus == corpus && r.section == section)
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("sections", &self.records.len())
            .finish()
    }
}

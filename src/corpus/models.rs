use serde::{Deserialize, Serialize};

use super::Corpus;

/// One legal provision: the atomic retrievable unit.
///
/// Records are built offline by the chunk converter scripts, loaded in
/// bulk at startup and held read-only for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionRecord {
    /// Globally unique, `<corpus>_<section>_<suffix>` (e.g. `bns_303_12`).
    /// Stable across reindexing.
    pub id: String,
    pub corpus: Corpus,
    /// Normalized section number, zero-padded for lexicographic sorting
    /// (e.g. `303`, `052A`).
    pub section: String,
    /// Human-facing label, e.g. `Section 303`.
    pub section_display: String,
    pub heading: String,
    pub chapter: String,
    /// Full legal text. Immutable once loaded.
    pub content: String,
}

/// On-disk shape of one entry in a `<corpus>_chunks.json` file. The
/// corpus is not stored per entry; it is inferred from the file being
/// loaded.
#[derive(Debug, Deserialize)]
pub(crate) struct RawChunk {
    pub id: String,
    pub section: String,
    #[serde(default)]
    pub section_display: String,
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub chapter: String,
    pub content: String,
}

impl RawChunk {
    pub(crate) fn into_record(self, corpus: Corpus) -> SectionRecord {
        let section_display = if self.section_display.is_empty() {
            format!("Section {}", self.section.trim_start_matches('0'))
        } else {
            self.section_display
        };

        SectionRecord {
            id: self.id,
            corpus,
            section: self.section,
            section_display,
            heading: self.heading,
            chapter: self.chapter,
            content: self.content,
        }
    }
}

pub mod models;
pub mod store;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub use models::SectionRecord;
pub use store::{DocumentStore, StoreError};

/// One legal Act, treated as an independently indexed document collection.
///
/// The variant order is the deterministic tie-break order used when
/// ranking results with equal scores.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Corpus {
    /// Bharatiya Nyaya Sanhita, 2023
    Bns,
    /// Indian Penal Code, 1860
    Ipc,
    /// Code of Criminal Procedure
    Crpc,
    /// Code of Civil Procedure
    Cpc,
    /// Bharatiya Sakshya Adhiniyam (evidence)
    Bsa,
}

impl Corpus {
    /// Every configured corpus, in tie-break order.
    pub fn all() -> Vec<Corpus> {
        Corpus::iter().collect()
    }

    /// Name of the external vector index holding this corpus's sections.
    pub fn index_name(&self) -> String {
        format!("{}_sections", self)
    }
}

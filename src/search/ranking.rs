use std::collections::HashMap;

use crate::corpus::{Corpus, SectionRecord};
use super::models::{MatchCandidate, QueryIntent, RetrievalResult};

/// Merges candidates across term variants and corpora, deduplicating by
/// `(corpus, id)` and keeping the maximum score observed for a
/// duplicate. The same section matched by two search variants is one
/// candidate at its best score.
pub fn merge_candidates(candidates: Vec<MatchCandidate>) -> Vec<MatchCandidate> {
    let mut unique: HashMap<(Corpus, String), MatchCandidate> = HashMap::new();

    for candidate in candidates {
        let key = (candidate.corpus, candidate.id.clone());
        match unique.get(&key) {
            Some(existing) if existing.raw_score >= candidate.raw_score => {}
            _ => {
                unique.insert(key, candidate);
            }
        }
    }

    unique.into_values().collect()
}

/// Whether a section is definitional: such text improves downstream
/// explanation quality even at slightly lower raw similarity.
pub fn is_definitional(record: &SectionRecord) -> bool {
    let heading = record.heading.to_lowercase();
    let chapter = record.chapter.to_lowercase();
    heading.contains("definition")
        || chapter.contains("definition")
        || chapter.contains("interpretation")
}

/// Pure scoring adjustment over `(candidate, resolved record, intent)`.
/// Returns the final score and whether the boost fired; the caller
/// stores the flag so the boost can never be applied twice.
pub fn boosted_score(
    candidate: &MatchCandidate,
    record: &SectionRecord,
    intent: QueryIntent,
    definition_boost: f64,
) -> (f64, bool) {
    if intent == QueryIntent::DirectLookup && is_definitional(record) {
        (candidate.raw_score + definition_boost, true)
    } else {
        (candidate.raw_score, false)
    }
}

/// Final ordering: score descending, ties broken by corpus then section
/// number ascending so identical inputs always rank identically.
pub fn sort_results(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.matched_corpus.cmp(&b.matched_corpus))
            .then_with(|| a.record.section.cmp(&b.record.section))
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
}

use std::collections::{BTreeSet, HashMap};

use lazy_static::lazy_static;

/// Curated synonym groups for legal concepts. Every member of a group
/// expands to the full group, so expansion is closed: expanding any
/// expanded term yields the same set again.
const SYNONYM_GROUPS: &[&[&str]] = &[
    &["theft", "larceny", "stealing", "misappropriation"],
    &["riot", "unlawful assembly", "mob violence"],
    &["murder", "homicide", "culpable homicide"],
    &["fraud", "cheating", "deception", "dishonest inducement"],
    &["assault", "criminal force", "hurt", "grievous hurt"],
    &["kidnapping", "abduction", "wrongful confinement"],
    &["defamation", "libel", "slander"],
    &["bribery", "corruption", "illegal gratification"],
    &["forgery", "counterfeiting", "false document"],
    &["trespass", "criminal trespass", "house-breaking"],
    &["extortion", "blackmail", "coercion"],
    &["bail", "anticipatory bail", "release on bond"],
];

lazy_static! {
    static ref TERM_GROUPS: HashMap<&'static str, &'static [&'static str]> = {
        let mut m = HashMap::new();
        for group in SYNONYM_GROUPS {
            for term in *group {
                m.insert(*term, *group);
            }
        }
        m
    };
}

/// Pure, table-driven widening of legal vocabulary. Shared read-only
/// across concurrent requests.
pub struct ConceptExpander;

impl ConceptExpander {
    pub fn new() -> Self {
        Self
    }

    /// The term's synonym group, always including the term itself.
    /// Unknown terms expand to the singleton containing themselves.
    pub fn expand(&self, term: &str) -> BTreeSet<String> {
        let term_lower = term.to_lowercase();
        match TERM_GROUPS.get(term_lower.as_str()) {
            Some(group) => group.iter().map(|s| s.to_string()).collect(),
            None => BTreeSet::from([term_lower]),
        }
    }

    /// Additional search variants for a free-text query: synonyms of
    /// every known term found in it, minus terms already present,
    /// capped at `max_variants`. Ordered deterministically.
    pub fn query_variants(&self, query: &str, max_variants: usize) -> Vec<String> {
        let query_lower = query.to_lowercase();
        let mut variants: Vec<String> = Vec::new();

        for group in SYNONYM_GROUPS {
            if group.iter().any(|term| query_lower.contains(term)) {
                for term in *group {
                    if variants.len() >= max_variants {
                        return variants;
                    }
                    if !query_lower.contains(term) && !variants.iter().any(|v| v == term) {
                        variants.push(term.to_string());
                    }
                }
            }
        }

        variants
    }
}

impl Default for ConceptExpander {
    fn default() -> Self {
        Self::new()
    }
}

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::corpus::Corpus;
use super::models::{QueryIntent, RoutedQuery};

lazy_static! {
    /// Cues that the query names an explicit section.
    static ref CITATION_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"section\s+\d+").expect("valid citation pattern"),
        Regex::new(r"sec\.?\s*\d+").expect("valid citation pattern"),
        Regex::new(r"§\s*\d+").expect("valid citation pattern"),
        Regex::new(r"\b\d+\s+of\s+(bns|ipc|crpc|cpc|bsa)\b").expect("valid citation pattern"),
        Regex::new(r"\b(bns|ipc|crpc|cpc|bsa)\s+section\s+\d+").expect("valid citation pattern"),
    ];

    /// First capture wins: the section number in any position.
    static ref SECTION_NUMBER: Regex =
        Regex::new(r"(?:section|sec\.?|§)\s*(\d+[a-z]?)|\b(\d+[a-z]?)\s+of\s+(?:bns|ipc|crpc|cpc|bsa)\b")
            .expect("valid section-number pattern");

    /// Narrative fact-pattern cues: an actor did something to someone.
    static ref SCENARIO_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"\b(my|our)\s+\w+").expect("valid scenario pattern"),
        Regex::new(r"\b(someone|somebody|neighbou?r|stranger|mob|accused|victim)\b")
            .expect("valid scenario pattern"),
        Regex::new(r"\b(stole|robbed|attacked|assaulted|cheated|threatened|killed|vandali[sz]ed|forged|kidnapped)\b")
            .expect("valid scenario pattern"),
        Regex::new(r"\bwhat (can|should) (i|we) do\b").expect("valid scenario pattern"),
    ];
}

/// Lexical cues that narrow the corpus set. Documented configuration
/// rather than hidden heuristics; extend alongside the `Corpus` enum.
const ACT_KEYWORDS: &[(Corpus, &[&str])] = &[
    (Corpus::Bns, &["bns", "nyaya", "sanhita", "bharatiya"]),
    (Corpus::Ipc, &["ipc", "indian penal", "penal code", "1860"]),
    (Corpus::Crpc, &["crpc", "criminal procedure", "bail", "arrest", "trial"]),
    (Corpus::Cpc, &["cpc", "civil procedure", "suit", "plaint", "decree"]),
    (Corpus::Bsa, &["bsa", "evidence", "proof", "witness", "exhibit"]),
];

/// Rule-based query classification: intent plus candidate corpora.
///
/// Deterministic for identical input, and never fails — an unmatched
/// query defaults to a direct lookup over all configured corpora.
pub struct QueryRouter;

impl QueryRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, query: &str) -> RoutedQuery {
        let query_lower = query.to_lowercase();

        let intent = if is_citation(&query_lower) {
            QueryIntent::SectionCitation
        } else if is_scenario(&query_lower) {
            QueryIntent::Scenario
        } else {
            QueryIntent::DirectLookup
        };

        let corpora = detect_corpora(&query_lower);
        let section = match intent {
            QueryIntent::SectionCitation => extract_section(&query_lower),
            _ => None,
        };

        debug!(
            "Classified query as {:?} over {:?} (section: {:?})",
            intent, corpora, section
        );

        RoutedQuery {
            intent,
            corpora,
            section,
        }
    }
}

impl Default for QueryRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_citation(query_lower: &str) -> bool {
    CITATION_PATTERNS.iter().any(|p| p.is_match(query_lower))
}

fn is_scenario(query_lower: &str) -> bool {
    SCENARIO_PATTERNS.iter().any(|p| p.is_match(query_lower))
}

/// Acts whose keywords appear in the query; all of them when nothing
/// narrows the set (direct and scenario intents are corpus-agnostic by
/// default).
fn detect_corpora(query_lower: &str) -> Vec<Corpus> {
    let mut relevant: Vec<Corpus> = ACT_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| query_lower.contains(k)))
        .map(|(corpus, _)| *corpus)
        .collect();

    if relevant.is_empty() {
        relevant = Corpus::all();
    }
    relevant
}

/// Pulls the cited section number out of the query, zero-padded to
/// three digits to match the normalized form used in section ids.
fn extract_section(query_lower: &str) -> Option<String> {
    let caps = SECTION_NUMBER.captures(query_lower)?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    Some(normalize_section(raw))
}

pub(crate) fn normalize_section(raw: &str) -> String {
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    let suffix: String = raw
        .chars()
        .skip_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .to_uppercase();
    format!("{:0>3}{}", digits, suffix)
}

use crate::fusion::{DocumentIdentity, DocumentKey};
use crate::query_classifier::QueryClassifier;
use once_cell::sync::Lazy;
use regex::Regex;
use sage_vector_store::ScoredDocument;
use std::collections::HashSet;

static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("punctuation regex must compile"));

/// Concept -> related rule sections and phrasings.
const CONCEPTS: &[(&str, &[&str])] = &[
    ("stack", &["405", "resolve", "resolution", "last in first out", "LIFO"]),
    ("priority", &["117", "passing priority", "holding priority"]),
    ("state-based actions", &["704", "SBA", "state based", "check"]),
    (
        "combat",
        &[
            "506",
            "507",
            "508",
            "509",
            "510",
            "declare attackers",
            "declare blockers",
            "combat damage",
        ],
    ),
    ("mana", &["106", "mana pool", "mana ability", "mana cost"]),
    ("tap", &["701.21", "tapping", "untap"]),
    ("triggered ability", &["603", "trigger", "when", "whenever", "at"]),
    ("activated ability", &["602", "activation", "colon"]),
    ("static ability", &["604", "continuous effect"]),
    ("replacement effect", &["614", "instead", "as", "enters"]),
    (
        "phase",
        &["500", "beginning", "precombat", "combat", "postcombat", "ending"],
    ),
    ("turn", &["500", "turn structure", "active player"]),
    ("damage", &["120", "deal damage", "prevent"]),
    ("counter", &["122", "+1/+1", "-1/-1", "loyalty"]),
];

/// Passages promoted ahead of the ranked results when a query names a rule.
pub const RULE_PRIORITY_LIMIT: usize = 3;

/// Query expander for rules search: appends the section numbers and
/// phrasings of every game concept the query mentions.
pub struct QueryExpander {
    concepts: Vec<(String, Vec<String>)>,
}

impl QueryExpander {
    #[must_use]
    pub fn new() -> Self {
        let concepts = CONCEPTS
            .iter()
            .map(|(concept, related)| {
                (
                    normalize(concept),
                    related.iter().map(|term| (*term).to_string()).collect(),
                )
            })
            .collect();
        Self { concepts }
    }

    /// Related terms for every concept found in the query, in table order,
    /// without duplicates.
    #[must_use]
    pub fn expansions(&self, query: &str) -> Vec<String> {
        let normalized = format!(" {} ", normalize(query));
        let mut terms: Vec<String> = Vec::new();
        for (concept, related) in &self.concepts {
            if !normalized.contains(&format!(" {concept}")) {
                continue;
            }
            for term in related {
                if !terms.contains(term) {
                    terms.push(term.clone());
                }
            }
        }
        terms
    }

    /// The original query followed by its expansions and, when it cites a
    /// rule number, `rule <number>`.
    #[must_use]
    pub fn expand(&self, query: &str) -> String {
        let mut parts = vec![query.to_string()];
        parts.extend(self.expansions(query));
        if let Some(rule) = QueryClassifier::rule_number(query) {
            parts.push(format!("rule {rule}"));
        }
        parts.join(" ")
    }
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercases and turns punctuation into spaces, collapsing runs of whitespace.
fn normalize(text: &str) -> String {
    PUNCTUATION
        .replace_all(&text.to_lowercase(), " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when `content` mentions `rule` as a whole number, so `405` matches
/// `405.1` but not `1405`, and `117.3` matches `117.3a` but not `117.30`.
#[must_use]
pub fn cites_rule(content: &str, rule: &str) -> bool {
    if rule.is_empty() {
        return false;
    }
    content.match_indices(rule).any(|(start, _)| {
        let before = content[..start].chars().next_back();
        let after = content[start + rule.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_digit() || c == '.')
            && !after.is_some_and(|c| c.is_ascii_digit())
    })
}

/// Puts `priority` passages first, then fills up to `k` from `ranked`,
/// dropping documents already taken.
///
/// Promoted passages report the best score seen so the list stays sorted.
#[must_use]
pub fn prioritize(
    priority: Vec<ScoredDocument>,
    ranked: Vec<ScoredDocument>,
    identity: DocumentIdentity,
    k: usize,
) -> Vec<ScoredDocument> {
    let top_score = ranked
        .iter()
        .chain(&priority)
        .map(|hit| hit.score)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut seen: HashSet<DocumentKey> = HashSet::new();
    let mut merged = Vec::with_capacity(k);
    for mut hit in priority {
        if merged.len() == k {
            break;
        }
        if seen.insert(identity.key(&hit.document)) {
            hit.score = top_score;
            merged.push(hit);
        }
    }
    for hit in ranked {
        if merged.len() == k {
            break;
        }
        if seen.insert(identity.key(&hit.document)) {
            merged.push(hit);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sage_vector_store::Document;

    fn hit(content: &str, score: f64) -> ScoredDocument {
        ScoredDocument::new(Document::new(content), score)
    }

    #[test]
    fn expands_known_concepts() {
        let expander = QueryExpander::new();
        let expanded = expander.expand("How does the stack work?");
        assert!(expanded.starts_with("How does the stack work?"));
        assert!(expanded.contains("405"));
        assert!(expanded.contains("last in first out"));
    }

    #[test]
    fn hyphenated_concepts_match_after_normalization() {
        let expander = QueryExpander::new();
        assert!(expander
            .expansions("when are State-Based Actions checked")
            .contains(&"704".to_string()));
    }

    #[test]
    fn concepts_match_at_word_starts_only() {
        let expander = QueryExpander::new();
        assert!(expander.expansions("a stacked deck").contains(&"405".to_string()));
        assert!(expander.expansions("an untapped land").is_empty());
        assert!(expander.expansions("flying creatures").is_empty());
    }

    #[test]
    fn shared_expansions_appear_once() {
        let expander = QueryExpander::new();
        let terms = expander.expansions("combat phase");
        assert_eq!(terms.iter().filter(|t| *t == "combat").count(), 1);
        assert!(terms.contains(&"506".to_string()));
        assert!(terms.contains(&"500".to_string()));
    }

    #[test]
    fn rule_numbers_are_repeated_as_rule_references() {
        let expander = QueryExpander::new();
        assert_eq!(expander.expand("what is 702.15b"), "what is 702.15b rule 702.15b");
        assert_eq!(expander.expand("flying"), "flying");
    }

    #[test]
    fn cites_rule_respects_number_boundaries() {
        assert!(cites_rule("405.1. The stack", "405"));
        assert!(cites_rule("See rule 117.3a.", "117.3"));
        assert!(!cites_rule("1405.1 unrelated", "405"));
        assert!(!cites_rule("117.30 unrelated", "117.3"));
        assert!(!cites_rule("405.1 text", ""));
    }

    #[test]
    fn prioritized_passages_lead_without_duplicates() {
        let merged = prioritize(
            vec![hit("405.1 stack", 0.2)],
            vec![hit("117.3 priority", 0.9), hit("405.1 stack", 0.2), hit("202.1 mana", 0.1)],
            DocumentIdentity::default(),
            3,
        );
        let contents: Vec<&str> = merged.iter().map(|h| h.document.content.as_str()).collect();
        assert_eq!(contents, vec!["405.1 stack", "117.3 priority", "202.1 mana"]);
        assert_eq!(merged[0].score, 0.9);
        assert!(merged.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn prioritize_stops_at_k() {
        let merged = prioritize(
            vec![hit("a", 1.0), hit("b", 1.0)],
            vec![hit("c", 1.0)],
            DocumentIdentity::default(),
            1,
        );
        assert_eq!(merged.len(), 1);
        assert!(prioritize(vec![], vec![], DocumentIdentity::default(), 3).is_empty());
    }
}

use once_cell::sync::Lazy;
use regex::Regex;

static RULE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d{3}(?:\.\d+[a-z]?)?\b").expect("rule reference regex must compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    /// Cites a rule number such as `405` or `702.15b`
    RuleReference,
    /// Natural-language question or keywords
    Conceptual,
}

pub struct QueryClassifier;

impl QueryClassifier {
    #[must_use]
    pub fn classify(query: &str) -> QueryType {
        if Self::is_rule_reference(query) {
            QueryType::RuleReference
        } else {
            QueryType::Conceptual
        }
    }

    #[must_use]
    pub fn is_rule_reference(query: &str) -> bool {
        RULE_REFERENCE.is_match(query.trim())
    }

    /// First rule number cited by the query, e.g. `702.15b` in `"rule 702.15b"`.
    #[must_use]
    pub fn rule_number(query: &str) -> Option<&str> {
        RULE_REFERENCE.find(query).map(|m| m.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_rule_numbers() {
        assert_eq!(QueryClassifier::classify("405"), QueryType::RuleReference);
        assert_eq!(QueryClassifier::classify("rule 702.15b"), QueryType::RuleReference);
        assert_eq!(QueryClassifier::classify("What does 117.3 say?"), QueryType::RuleReference);
    }

    #[test]
    fn plain_questions_are_conceptual() {
        assert_eq!(
            QueryClassifier::classify("what happens when a spell resolves"),
            QueryType::Conceptual
        );
        assert_eq!(QueryClassifier::classify("pay 2 mana"), QueryType::Conceptual);
        assert_eq!(QueryClassifier::classify("gain 1000 life"), QueryType::Conceptual);
        assert_eq!(QueryClassifier::classify(""), QueryType::Conceptual);
    }

    #[test]
    fn extracts_the_first_rule_number() {
        assert_eq!(QueryClassifier::rule_number("rule 702.15b"), Some("702.15b"));
        assert_eq!(QueryClassifier::rule_number("405 vs 117.3"), Some("405"));
        assert_eq!(QueryClassifier::rule_number("gain 1000 life"), None);
    }
}

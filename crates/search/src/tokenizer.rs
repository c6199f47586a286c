use once_cell::sync::Lazy;
use regex::Regex;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("non-word regex"));

/// Splits text into index terms.
///
/// Lowercases, turns every character that is neither a word character nor
/// whitespace into a space, splits on whitespace and drops single-character
/// tokens. Indexing and querying must both go through this function.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    NON_WORD
        .replace_all(&lowered, " ")
        .split_whitespace()
        .filter(|token| token.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(
            tokenize("The Stack: resolves (last-in, first-out)!"),
            vec!["the", "stack", "resolves", "last", "in", "first", "out"]
        );
    }

    #[test]
    fn drops_single_character_tokens() {
        assert_eq!(tokenize("a b cd e 1 23"), vec!["cd", "23"]);
    }

    #[test]
    fn keeps_rule_numbers_as_separate_terms() {
        assert_eq!(tokenize("Rule 702.15b"), vec!["rule", "702", "15b"]);
    }

    #[test]
    fn keeps_underscores_and_unicode_letters() {
        assert_eq!(tokenize("Æther_vial lógica"), vec!["æther_vial", "lógica"]);
    }

    #[test]
    fn empty_and_punctuation_only_input_yields_nothing() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" ?! -- ... ").is_empty());
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(tokenize("é ée"), vec!["ée"]);
    }
}

use once_cell::sync::Lazy;
use regex::Regex;

static RULE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{3}\.\d+[a-z]?)\b").expect("rule number regex"));

/// First Comprehensive Rules number cited in `content`, e.g. `104.3a` or `702.15`.
#[must_use]
pub fn extract_rule_number(content: &str) -> Option<String> {
    RULE_NUMBER
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

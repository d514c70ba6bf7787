//! Quoted-span extraction and verbatim matching
//!
//! Matching ignores case, punctuation and whitespace and nothing else: a
//! different numeral, a corrected spelling or an expanded contraction is a
//! genuine mismatch.

use once_cell::sync::Lazy;
use regex::Regex;

/// A span between a pair of straight or curly double quotes
static QUOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["“](.*?)["”]"#).expect("quote pattern is valid"));

/// A quoted span wrapped in square brackets, the audit form used after indirect attribution
static BRACKETED_QUOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\[\s*["“](.*?)["”]\s*\]"#).expect("bracket pattern is valid"));

static STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{P}\p{S}\s]+").expect("strip pattern is valid"));

/// All quoted spans in order of appearance
pub fn extract_quotes(text: &str) -> Vec<String> {
    QUOTE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Quoted spans that sit inside square brackets
pub fn extract_bracketed(text: &str) -> Vec<String> {
    BRACKETED_QUOTE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Strip punctuation and whitespace, then lower-case
pub fn normalize(text: &str) -> String {
    STRIP.replace_all(text, "").to_lowercase()
}

/// A source text normalized once for repeated lookups
#[derive(Debug, Clone)]
pub struct NormalizedSource {
    text: String,
}

impl NormalizedSource {
    pub fn new(source: &str) -> Self {
        Self {
            text: normalize(source),
        }
    }

    /// Whether the quote appears contiguously in the source
    pub fn contains(&self, quote: &str) -> bool {
        self.text.contains(&normalize(quote))
    }

    /// Quotes that do not appear in the source, deduplicated, in draft order
    pub fn unmatched(&self, quotes: &[String]) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for quote in quotes {
            if !self.contains(quote) && !missing.contains(quote) {
                missing.push(quote.clone());
            }
        }
        missing
    }
}

/// Quotes in `draft` that are not verbatim in `source`
pub fn find_unmatched(draft: &str, source: &str) -> Vec<String> {
    NormalizedSource::new(source).unmatched(&extract_quotes(draft))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_straight_and_curly() {
        let text = r#"She said "we will vote" and he replied “not today”."#;
        assert_eq!(extract_quotes(text), vec!["we will vote", "not today"]);
    }

    #[test]
    fn test_extract_keeps_apostrophes() {
        let text = r#"The mayor said "it's fine" twice."#;
        assert_eq!(extract_quotes(text), vec!["it's fine"]);
    }

    #[test]
    fn test_extract_none() {
        assert!(extract_quotes("No quotes here, just 'single' ones.").is_empty());
    }

    #[test]
    fn test_extract_bracketed() {
        let text = r#"The clerk said the bridge was costly ["it'll be expensive to fix the bridge"]. Then "hello"."#;
        assert_eq!(
            extract_bracketed(text),
            vec!["it'll be expensive to fix the bridge"]
        );
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("It's  FINE,\n really."), "itsfinereally");
        assert_eq!(normalize("“Curly” — dash…"), "curlydash");
    }

    #[test]
    fn test_punctuation_and_case_match() {
        let source = NormalizedSource::new("the mayor said it's fine.");
        assert!(source.contains("It's fine"));
    }

    #[test]
    fn test_repeated_phrase_collapse_still_matches() {
        // The verifier cannot detect a collapsed repetition
        let source = NormalizedSource::new("it'll be expensive to fix the bridge, the bridge, even so");
        assert!(source.contains("the bridge"));
    }

    #[test]
    fn test_numerals_are_not_corrected() {
        let source = NormalizedSource::new("the span is 13 feet long");
        assert!(!source.contains("30 feet"));
        assert!(!source.contains("thirteen feet"));
    }

    #[test]
    fn test_reordered_words_do_not_match() {
        let source = NormalizedSource::new("we are going to fix it");
        assert!(!source.contains("going to fix we are"));
    }

    #[test]
    fn test_misspelled_name_is_a_mismatch() {
        let source = NormalizedSource::new("Councilor Smyth moved the motion");
        assert!(!source.contains("Councilor Smith moved"));
    }

    #[test]
    fn test_find_unmatched_deduplicates() {
        let draft = r#""30 feet" then "30 feet" again and "13 feet""#;
        assert_eq!(find_unmatched(draft, "it is 13 feet"), vec!["30 feet"]);
    }
}

//! Keyword-overlap similarity between subcategory names
//!
//! The classifier is free to phrase equivalent error types differently
//! across calls; this heuristic gates taxonomy growth so that rephrasings
//! collapse onto one canonical subcategory per category. The threshold is
//! tunable, not a guarantee: false merges and false splits both happen and
//! are surfaced in the run report rather than corrected here.

use std::collections::HashSet;

/// Strictly-greater-than merge threshold over the keyword-overlap ratio.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Domain filler words that carry no distinguishing signal between
/// subcategory names.
const STOPLIST: &[&str] = &["error", "missing", "mismatch"];

fn keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| !token.is_empty() && !STOPLIST.contains(token))
        .map(str::to_string)
        .collect()
}

/// `|A ∩ B| / max(|A|, |B|)` over stoplist-stripped token sets.
/// Returns 0.0 when either side has no keywords left.
pub fn keyword_overlap(a: &str, b: &str) -> f64 {
    let keywords_a = keywords(a);
    let keywords_b = keywords(b);

    let denominator = keywords_a.len().max(keywords_b.len());
    if denominator == 0 {
        return 0.0;
    }

    let shared = keywords_a.intersection(&keywords_b).count();
    shared as f64 / denominator as f64
}

/// First existing subcategory scoring strictly above the threshold
/// against the candidate, if any.
pub fn find_similar<'a>(candidate: &str, existing: &'a [String]) -> Option<&'a str> {
    existing
        .iter()
        .find(|subcategory| keyword_overlap(candidate, subcategory) > SIMILARITY_THRESHOLD)
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_names_score_one() {
        assert_eq!(keyword_overlap("null pointer deref", "null pointer deref"), 1.0);
    }

    #[test]
    fn disjoint_names_score_zero() {
        assert_eq!(keyword_overlap("array out of bounds", "uninitialized variable"), 0.0);
    }

    #[test]
    fn stoplist_words_are_ignored() {
        // After stripping "missing" and "error" both reduce to {semicolon}.
        assert_eq!(keyword_overlap("missing semicolon", "semicolon error"), 1.0);
    }

    #[test]
    fn ratio_uses_larger_token_set() {
        // 1 shared keyword out of max(2, 3) = 3.
        let score = keyword_overlap("return statement", "absent return value");
        assert!((score - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn exact_threshold_does_not_merge() {
        // 7 shared keywords / max(10, 7) = 0.7 exactly: strict > means no match.
        let candidate = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let existing = vec!["alpha beta gamma delta epsilon zeta eta".to_string()];
        assert_eq!(keyword_overlap(candidate, &existing[0]), 0.7);
        assert!(find_similar(candidate, &existing).is_none());
    }

    #[test]
    fn above_threshold_merges() {
        // 5 shared keywords / max(7, 5) ≈ 0.714.
        let candidate = "alpha beta gamma delta epsilon zeta eta";
        let existing = vec!["alpha beta gamma delta epsilon".to_string()];
        let score = keyword_overlap(candidate, &existing[0]);
        assert!(score > SIMILARITY_THRESHOLD);
        assert_eq!(find_similar(candidate, &existing), Some(existing[0].as_str()));
    }

    #[test]
    fn empty_keyword_sets_never_match() {
        assert_eq!(keyword_overlap("error missing", "mismatch"), 0.0);
        assert!(find_similar("error", &["missing".to_string()]).is_none());
    }

    #[test]
    fn comparison_is_case_insensitive() {
        let existing = vec!["Unbalanced Braces".to_string()];
        assert_eq!(find_similar("unbalanced braces", &existing), Some("Unbalanced Braces"));
    }
}

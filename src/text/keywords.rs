//! Keyword extraction and overlap ratios
//!
//! Questions and passages are reduced to sets of content keywords:
//! lowercase alphanumeric tokens with stop words removed and a light
//! plural stem applied. Two ratios are derived from those sets:
//! - `overlap_ratio`: symmetric Jaccard overlap, for query-to-query checks
//! - `coverage`: fraction of the query's keywords found in a text

use std::collections::BTreeSet;

/// Minimum token length kept as a keyword
const MIN_KEYWORD_LEN: usize = 2;

/// English function words that carry no subject on their own
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "besides", "but", "by", "can",
    "could", "did", "do", "does", "doing", "else", "for", "from", "further", "get", "had",
    "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how", "i", "if", "in",
    "into", "is", "it", "its", "just", "let", "may", "me", "might", "more", "most", "much",
    "must", "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other",
    "our", "ours", "out", "over", "please", "same", "she", "should", "so", "some", "such",
    "tell", "than", "that", "the", "their", "theirs", "them", "then", "there", "these", "they",
    "this", "those", "through", "to", "too", "under", "until", "up", "very", "was", "we",
    "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with",
    "would", "you", "your", "yours",
];

/// Split text into lowercase alphanumeric tokens, in order
pub fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Content keywords of a text
pub fn keywords(text: &str) -> BTreeSet<String> {
    tokens(text)
        .into_iter()
        .filter(|t| t.chars().count() >= MIN_KEYWORD_LEN)
        .filter(|t| !is_stop_word(t))
        .map(stem)
        .filter(|t| !is_stop_word(t))
        .collect()
}

/// Jaccard overlap `|a ∩ b| / |a ∪ b|`; 0.0 when both sets are empty
pub fn overlap_ratio(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Fraction of `query` keywords present in `text` keywords; 0.0 for an empty query
pub fn coverage(query: &BTreeSet<String>, text: &BTreeSet<String>) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    query.intersection(text).count() as f32 / query.len() as f32
}

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

fn stem(word: String) -> String {
    let is_plural = word.len() > 3
        && word.ends_with('s')
        && !word.ends_with("ss")
        && !word.ends_with("us")
        && !word.ends_with("is");

    if is_plural {
        word[..word.len() - 1].to_string()
    } else {
        word
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_keywords_strip_stop_words_and_punctuation() {
        let kw = keywords("What is the tuition fee?");
        assert_eq!(kw, set(&["tuition", "fee"]));
    }

    #[test]
    fn test_keywords_stem_plurals() {
        let kw = keywords("Payment plans and fees");
        assert_eq!(kw, set(&["payment", "plan", "fee"]));
    }

    #[test]
    fn test_stem_keeps_non_plural_endings() {
        assert_eq!(keywords("class"), set(&["class"]));
        assert_eq!(keywords("campus"), set(&["campus"]));
        assert_eq!(keywords("analysis"), set(&["analysis"]));
        assert_eq!(keywords("bus"), set(&["bus"]));
    }

    #[test]
    fn test_stemmed_stop_words_are_dropped() {
        assert!(keywords("others ares").is_empty());
    }

    #[test]
    fn test_keywords_of_pronoun_question_are_empty() {
        assert!(keywords("What about it?").is_empty());
    }

    #[test]
    fn test_overlap_ratio() {
        let a = set(&["tuition", "fee"]);
        let b = set(&["payment", "plan", "available", "tuition", "fee"]);
        assert!((overlap_ratio(&a, &b) - 0.4).abs() < 1e-6);
        assert_eq!(overlap_ratio(&a, &set(&["grading", "scale"])), 0.0);
        assert_eq!(overlap_ratio(&BTreeSet::new(), &BTreeSet::new()), 0.0);
    }

    #[test]
    fn test_coverage() {
        let q = set(&["tuition", "fee"]);
        let text = keywords("The tuition fee is charged per unit.");
        assert_eq!(coverage(&q, &text), 1.0);
        assert_eq!(coverage(&BTreeSet::new(), &text), 0.0);
        assert_eq!(coverage(&q, &set(&["grading"])), 0.0);
    }
}

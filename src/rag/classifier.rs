// Follow-up detection for conversational questions
use crate::config::ClassifierConfig;
use crate::session::Turn;
use crate::text;

/// Openers that tie a question to the previous exchange
const CONTINUATION_MARKERS: &[&str] = &[
    "what about",
    "how about",
    "what else",
    "anything else",
    "and",
    "also",
    "additionally",
    "furthermore",
    "besides",
    "then",
    "so",
    "but",
];

/// Pronouns that usually point back at an earlier subject
const REFERRING_PRONOUNS: &[&str] = &[
    "it", "its", "that", "this", "those", "these", "they", "them", "their", "he", "she",
];

/// Decides whether a question depends on recent turns
#[derive(Debug, Clone, Default)]
pub struct FollowUpClassifier {
    config: ClassifierConfig,
}

impl FollowUpClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// True only when there is history AND the question can't stand alone.
    /// Ambiguous questions are treated as standalone.
    pub fn is_follow_up(&self, question: &str, recent_turns: &[Turn]) -> bool {
        if recent_turns.is_empty() {
            return false;
        }

        let words = text::tokens(question);
        if words.is_empty() {
            return false;
        }

        if starts_with_marker(&words) {
            return true;
        }

        let keyword_count = text::keywords(question).len();

        if has_referring_pronoun(&words) && keyword_count <= self.config.pronoun_keyword_limit {
            return true;
        }

        words.len() <= self.config.short_question_words && keyword_count == 0
    }

    /// Bracketed notes describing why a question reads as a follow-up
    pub fn context_hint(&self, question: &str) -> String {
        let words = text::tokens(question);
        let mut hints = Vec::new();

        if starts_with_marker(&words) {
            hints.push("[CONTEXT: This is a follow-up question related to the previous response]");
        }
        if has_referring_pronoun(&words) {
            hints.push("[CONTEXT: The user is referring to something mentioned previously]");
        }
        if words.len() <= self.config.short_question_words && question.trim_end().ends_with('?') {
            hints.push("[CONTEXT: This appears to be a short follow-up question]");
        }

        hints.join("\n")
    }
}

fn starts_with_marker(words: &[String]) -> bool {
    CONTINUATION_MARKERS.iter().any(|marker| {
        let marker_words: Vec<&str> = marker.split_whitespace().collect();
        words.len() >= marker_words.len()
            && words
                .iter()
                .zip(marker_words.iter())
                .all(|(w, m)| w == m)
    })
}

fn has_referring_pronoun(words: &[String]) -> bool {
    words.iter().any(|w| REFERRING_PRONOUNS.contains(&w.as_str()))
}

// Follow-up rewriting into standalone questions
use std::sync::Arc;
use std::time::Duration;

use crate::llm::{generate_with_retry, LanguageModel};
use crate::prompt::PromptBuilder;
use crate::session::Turn;

/// Labels models sometimes echo in front of the rewritten question
const ECHOED_LABELS: &[&str] = &["standalone question:", "question:", "rewritten question:"];

/// Turns follow-ups into self-contained questions via the language model
#[derive(Clone)]
pub struct QuestionRewriter {
    model: Arc<dyn LanguageModel>,
    prompts: PromptBuilder,
    window: usize,
    timeout: Duration,
}

impl QuestionRewriter {
    pub fn new(model: Arc<dyn LanguageModel>, prompts: PromptBuilder, window: usize, timeout: Duration) -> Self {
        Self {
            model,
            prompts,
            window,
            timeout,
        }
    }

    /// Rewrite `question` using the last `window` turns.
    ///
    /// Falls back to prefixing the most recent question when the model
    /// fails or returns nothing usable.
    pub async fn rewrite(&self, question: &str, recent_turns: &[Turn]) -> String {
        let skip = recent_turns.len().saturating_sub(self.window);
        let window = &recent_turns[skip..];
        let prompt = self.prompts.rewrite_prompt(question, window);

        match generate_with_retry(self.model.as_ref(), &prompt, self.timeout).await {
            Ok(output) => match clean_rewrite(&output) {
                Some(standalone) => standalone,
                None => {
                    tracing::warn!(question, "rewriter returned no usable question");
                    heuristic_rewrite(question, recent_turns)
                }
            },
            Err(e) => {
                tracing::warn!(question, error = %e, "rewriter unavailable, using heuristic rewrite");
                heuristic_rewrite(question, recent_turns)
            }
        }
    }
}

/// First non-empty line with echoed labels and wrapping quotes removed
fn clean_rewrite(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;

    let mut cleaned = line;
    for label in ECHOED_LABELS {
        let matches = cleaned
            .get(..label.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(label));
        if matches {
            cleaned = cleaned[label.len()..].trim_start();
            break;
        }
    }

    let cleaned = cleaned.trim_matches(|c| c == '"' || c == '\'' || c == '`').trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

fn heuristic_rewrite(question: &str, recent_turns: &[Turn]) -> String {
    match recent_turns.last() {
        Some(turn) => format!("{} {}", turn.question, question),
        None => question.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{RagError, Result};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct Recording {
        reply: Result<String>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for Recording {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(RagError::generation(e.to_string())),
            }
        }
    }

    fn turns(n: usize) -> Vec<Turn> {
        (0..n)
            .map(|i| Turn {
                question: format!("question {}", i),
                answer: format!("answer {}", i),
                timestamp: Utc::now(),
            })
            .collect()
    }

    fn rewriter(model: Arc<Recording>) -> QuestionRewriter {
        QuestionRewriter::new(model, PromptBuilder::default(), 2, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_rewrite_uses_model_output() {
        let model = Arc::new(Recording {
            reply: Ok("Standalone question: \"What payment plans exist for the tuition fee?\"\n".to_string()),
            prompts: Mutex::new(Vec::new()),
        });

        let standalone = rewriter(Arc::clone(&model)).rewrite("What about payment plans?", &turns(4)).await;
        assert_eq!(standalone, "What payment plans exist for the tuition fee?");

        // only the configured window reaches the prompt
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("question 3"));
        assert!(prompts[0].contains("question 2"));
        assert!(!prompts[0].contains("question 1"));
    }

    #[tokio::test]
    async fn test_rewrite_falls_back_on_failure() {
        let model = Arc::new(Recording {
            reply: Err(RagError::generation("down")),
            prompts: Mutex::new(Vec::new()),
        });

        let standalone = rewriter(Arc::clone(&model)).rewrite("and the deadline?", &turns(2)).await;
        assert_eq!(standalone, "question 1 and the deadline?");
        // identical prompt retried once
        assert_eq!(model.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rewrite_falls_back_on_blank_output() {
        let model = Arc::new(Recording {
            reply: Ok("  \n \"\" \n".to_string()),
            prompts: Mutex::new(Vec::new()),
        });

        let standalone = rewriter(model).rewrite("why?", &turns(1)).await;
        assert_eq!(standalone, "question 0 why?");
    }

    #[test]
    fn test_clean_rewrite() {
        assert_eq!(clean_rewrite("What is X?").as_deref(), Some("What is X?"));
        assert_eq!(clean_rewrite("\n\nQuestion: 'What is X?'\nextra").as_deref(), Some("What is X?"));
        assert_eq!(clean_rewrite("   "), None);
    }
}

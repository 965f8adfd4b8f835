//! Prompt assembly
//!
//! All wording lives in `PromptTemplate` (configurable through the `[prompt]`
//! config section); `PromptBuilder` only arranges the pieces.

use serde::{Deserialize, Serialize};

use crate::collaborators::UserHints;
use crate::rag::retrieval::RetrievedChunk;
use crate::session::Turn;

/// Layout of retrieved passages inside a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextFormat {
    /// Passages with section and category headers
    Structured,
    /// Numbered list, one passage per entry
    Numbered,
}

/// Wording and layout of every prompt the pipeline sends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplate {
    pub persona: String,
    pub answer_instructions: Vec<String>,
    pub fallback_instructions: Vec<String>,
    pub rewrite_instruction: String,
    pub context_format: ContextFormat,
    /// Passages beyond this many characters of context are left out of the
    /// prompt and of the answer's sources
    pub max_context_chars: usize,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            persona: "You are Bulldog Buddy, a friendly and loyal Smart Campus Assistant.".to_string(),
            answer_instructions: vec![
                "Answer as if you already know the information; never mention the context or the handbook.".to_string(),
                "Be accurate and concise.".to_string(),
                "If the context does not contain the answer, say so honestly.".to_string(),
            ],
            fallback_instructions: vec![
                "Answer using your general knowledge.".to_string(),
                "Be accurate and helpful.".to_string(),
                "If you don't know something, say so honestly.".to_string(),
            ],
            rewrite_instruction: "Rewrite the follow-up question below as a single standalone question that can be understood without the conversation. Reply with the question only.".to_string(),
            context_format: ContextFormat::Structured,
            max_context_chars: 6000,
        }
    }
}

/// Everything the answer prompt is built from
#[derive(Debug, Clone, Copy)]
pub struct AnswerInputs<'a> {
    pub question: &'a str,
    pub chunks: &'a [RetrievedChunk],
    /// Category note from the context cache
    pub cache_hint: &'a str,
    /// Follow-up markers from the classifier
    pub conversation_hint: &'a str,
    pub user: Option<&'a UserHints>,
}

/// Builds prompts from a template
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    template: PromptTemplate,
}

impl PromptBuilder {
    pub fn new(template: PromptTemplate) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Prompt for answering with retrieved passages
    pub fn answer_prompt(&self, inputs: AnswerInputs<'_>) -> String {
        let mut sections = vec![self.template.persona.clone()];

        if let Some(user) = inputs.user {
            sections.push(personalization(user));
        }

        sections.push(format!("Context:\n{}", self.format_context(inputs.chunks)));
        if !inputs.cache_hint.is_empty() {
            sections.push(inputs.cache_hint.to_string());
        }

        sections.push(question_block(inputs.question, inputs.conversation_hint));
        sections.push(instructions(&self.template.answer_instructions));
        sections.push("Answer:".to_string());

        sections.retain(|s| !s.is_empty());
        sections.join("\n\n")
    }

    /// Prompt for answering without passages
    pub fn fallback_prompt(&self, question: &str, conversation_hint: &str, user: Option<&UserHints>) -> String {
        let mut sections = vec![self.template.persona.clone()];
        if let Some(user) = user {
            sections.push(personalization(user));
        }
        sections.push(question_block(question, conversation_hint));
        sections.push(instructions(&self.template.fallback_instructions));
        sections.push("Answer:".to_string());

        sections.retain(|s| !s.is_empty());
        sections.join("\n\n")
    }

    /// Prompt asking the model to make a follow-up self-contained
    pub fn rewrite_prompt(&self, question: &str, turns: &[Turn]) -> String {
        let history: Vec<String> = turns
            .iter()
            .map(|t| format!("User: {}\nAssistant: {}", t.question, t.answer))
            .collect();

        format!(
            "{}\n\nConversation:\n{}\n\nFollow-up question: {}\n\nStandalone question:",
            self.template.rewrite_instruction,
            history.join("\n"),
            question
        )
    }

    /// Leading passages that fit the context budget; the first always fits
    pub fn fit_context(&self, chunks: Vec<RetrievedChunk>) -> Vec<RetrievedChunk> {
        let mut used = 0;
        let mut kept = Vec::with_capacity(chunks.len());

        for retrieved in chunks {
            if used + retrieved.content.len() > self.template.max_context_chars && !kept.is_empty() {
                break;
            }
            used += retrieved.content.len();
            kept.push(retrieved);
        }

        kept
    }

    fn format_context(&self, chunks: &[RetrievedChunk]) -> String {
        let parts: Vec<String> = chunks
            .iter()
            .enumerate()
            .map(|(idx, retrieved)| match self.template.context_format {
                ContextFormat::Structured => format!(
                    "[Section {}] (category: {})\n{}",
                    retrieved.chunk.source_id, retrieved.chunk.category, retrieved.content
                ),
                ContextFormat::Numbered => format!("{}. {}", idx + 1, retrieved.content),
            })
            .collect();

        match self.template.context_format {
            ContextFormat::Structured => parts.join("\n\n"),
            ContextFormat::Numbered => parts.join("\n"),
        }
    }
}

fn question_block(question: &str, conversation_hint: &str) -> String {
    if conversation_hint.is_empty() {
        format!("Question: {}", question)
    } else {
        format!("Question: {}\n{}", question, conversation_hint)
    }
}

fn instructions(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let bullets: Vec<String> = lines.iter().map(|l| format!("- {}", l)).collect();
    format!("Instructions:\n{}", bullets.join("\n"))
}

fn personalization(user: &UserHints) -> String {
    let mut lines = Vec::new();
    if let Some(name) = &user.display_name {
        lines.push(format!("The user's name is {}. Use it sparingly.", name));
    }
    for preference in &user.preferences {
        lines.push(format!("User preference: {}", preference));
    }
    lines.join("\n")
}

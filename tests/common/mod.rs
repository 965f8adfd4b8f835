//! Shared fixtures for integration tests: a scripted language model and
//! instrumented retrieval indexes.

#![allow(dead_code)]

use async_trait::async_trait;
use buddyrag::errors::{RagError, Result};
use buddyrag::llm::LanguageModel;
use buddyrag::prompt::PromptTemplate;
use buddyrag::rag::retrieval::{IndexLoader, InMemoryIndex, Passage, RetrievalIndex, SearchHit};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Small handbook with financial, academic and campus sections
pub fn handbook() -> InMemoryIndex {
    InMemoryIndex::new(vec![
        Passage::new("4.1", "Financial", "Schedule of fees: the tuition fee is charged per academic unit."),
        Passage::new("4.3", "Financial", "Payment plans let students settle the tuition fee in installments."),
        Passage::new("4.5", "Financial", "Refunds of the tuition fee are granted before the second week of classes."),
        Passage::new("6.2", "Academic", "The grading scale runs from 1.00 (excellent) to 5.00 (failed)."),
        Passage::new("6.3", "Academic", "Students whose grading average drops below 3.00 are placed on probation."),
        Passage::new("8.1", "Campus", "The library is open from 7 AM to 9 PM on weekdays."),
    ])
}

/// Language model that answers deterministically and records every call.
///
/// Rewrite prompts are recognized by the default rewrite instruction and
/// answered from the `rewrites` table, echoing the follow-up when unknown.
pub struct ScriptedModel {
    rewrites: HashMap<String, String>,
    fail_answers: bool,
    delay: Duration,
    prompts: Mutex<Vec<String>>,
    forgotten: Mutex<Vec<String>>,
    answers: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            rewrites: HashMap::new(),
            fail_answers: false,
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
            forgotten: Mutex::new(Vec::new()),
            answers: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_rewrite(mut self, follow_up: &str, standalone: &str) -> Self {
        self.rewrites.insert(follow_up.to_string(), standalone.to_string());
        self
    }

    /// Fail every answer call; rewrites still succeed
    pub fn failing_answers(mut self) -> Self {
        self.fail_answers = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Prompts that asked for an answer rather than a rewrite
    pub fn answer_prompts(&self) -> Vec<String> {
        self.prompts().into_iter().filter(|p| !is_rewrite_prompt(p)).collect()
    }

    pub fn rewrite_calls(&self) -> usize {
        self.prompts().iter().filter(|p| is_rewrite_prompt(p)).count()
    }

    pub fn forgotten(&self) -> Vec<String> {
        self.forgotten.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn is_rewrite_prompt(prompt: &str) -> bool {
    prompt.starts_with(&PromptTemplate::default().rewrite_instruction)
}

fn follow_up_of(prompt: &str) -> Option<&str> {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Follow-up question: "))
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if is_rewrite_prompt(prompt) {
            let follow_up = follow_up_of(prompt).unwrap_or_default();
            return Ok(self
                .rewrites
                .get(follow_up)
                .cloned()
                .unwrap_or_else(|| follow_up.to_string()));
        }

        if self.fail_answers {
            return Err(RagError::generation("model offline"));
        }

        let n = self.answers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("answer {}", n))
    }

    async fn forget_session(&self, session_id: &str) {
        self.forgotten.lock().unwrap().push(session_id.to_string());
    }
}

/// Wraps an index and counts searches
pub struct CountingIndex {
    inner: Arc<dyn RetrievalIndex>,
    searches: AtomicUsize,
}

impl CountingIndex {
    pub fn new(inner: impl RetrievalIndex + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
            searches: AtomicUsize::new(0),
        }
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RetrievalIndex for CountingIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(query, k).await
    }
}

/// Returns the same hits for every query
pub struct StaticIndex {
    hits: Vec<SearchHit>,
}

impl StaticIndex {
    /// Campus passages that share no keyword with financial questions
    pub fn off_topic() -> Self {
        let hit = |source: &str, content: &str, score: f32| SearchHit {
            content: content.to_string(),
            source_id: source.to_string(),
            category: "Campus".to_string(),
            score,
        };

        Self {
            hits: vec![
                hit("9.1", "Cafeteria opening hours on weekends.", 0.42),
                hit("9.4", "Shuttle bus routes around the main gate.", 0.37),
            ],
        }
    }
}

#[async_trait]
impl RetrievalIndex for StaticIndex {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<SearchHit>> {
        Ok(self.hits.iter().take(k).cloned().collect())
    }
}

/// Index whose backend is down
pub struct FailingIndex;

#[async_trait]
impl RetrievalIndex for FailingIndex {
    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<SearchHit>> {
        Err(RagError::retrieval("vector store offline"))
    }
}

/// Loads the handbook after a delay, counting loads
pub struct SlowHandbookLoader {
    delay: Duration,
    loads: Arc<AtomicUsize>,
}

impl SlowHandbookLoader {
    pub fn new(delay: Duration) -> (Self, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let loader = Self {
            delay,
            loads: Arc::clone(&loads),
        };
        (loader, loads)
    }
}

#[async_trait]
impl IndexLoader for SlowHandbookLoader {
    async fn load(&self) -> Result<Arc<dyn RetrievalIndex>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Arc::new(handbook()))
    }
}

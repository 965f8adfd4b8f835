//! Retrieval orchestrator - per-question coordinator
//!
//! Drives one question through the pipeline state machine:
//! - Follow-up classification and rewriting
//! - Context cache relatedness check
//! - Retrieval with a single relevance retry
//! - Answer or general-knowledge fallback generation
//! - Commit of the turn and cache under the session state lock
//!
//! Runs on the same session are serialized by the session's run gate.
//! Runs on different sessions proceed independently.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::collaborators::{ExchangeRecord, TranscriptSink, UserContextProvider, UserHints};
use crate::config::Config;
use crate::errors::{RagError, Result};
use crate::llm::{generate_with_retry, LanguageModel};
use crate::orchestrator::state::{PipelineEvent, PipelineRun, PipelineState};
use crate::prompt::{AnswerInputs, PromptBuilder};
use crate::rag::cache::ContextCache;
use crate::rag::classifier::FollowUpClassifier;
use crate::rag::retrieval::{ChunkRef, RetrievalEngine, RetrievalIndex, RetrievedChunk};
use crate::rag::rewriter::QuestionRewriter;
use crate::rag::validator::RelevanceValidator;
use crate::session::{Session, SessionStore, Turn};
use crate::text;

/// How an answer was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerMode {
    /// Grounded in retrieved passages
    Retrieval,
    /// General knowledge after retrieval was rejected
    Fallback,
}

/// Result of one `ask`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    /// Passages the answer was grounded in; empty on fallback
    pub sources: Vec<ChunkRef>,
    /// Relevance in [0, 1], two decimals
    pub confidence: f32,
    pub session_id: String,
    pub follow_up: bool,
    /// Rewritten question, when the input was a follow-up
    pub standalone_question: Option<String>,
    pub mode: AnswerMode,
    /// States visited, `Received` through `Done`
    pub path: Vec<PipelineState>,
}

/// Builder for `RetrievalOrchestrator`
pub struct OrchestratorBuilder {
    config: Config,
    index: Arc<dyn RetrievalIndex>,
    model: Arc<dyn LanguageModel>,
    transcripts: Option<Arc<dyn TranscriptSink>>,
    users: Option<Arc<dyn UserContextProvider>>,
}

impl OrchestratorBuilder {
    /// Persist every finalized exchange to `sink`
    pub fn transcripts(mut self, sink: Arc<dyn TranscriptSink>) -> Self {
        self.transcripts = Some(sink);
        self
    }

    /// Personalize prompts with hints from `provider`
    pub fn user_context(mut self, provider: Arc<dyn UserContextProvider>) -> Self {
        self.users = Some(provider);
        self
    }

    /// Validate the configuration and assemble the orchestrator
    pub fn build(self) -> Result<RetrievalOrchestrator> {
        let config = self.config;
        config.validate()?;
        let prompts = PromptBuilder::new(config.prompt.clone());
        let llm_timeout = Duration::from_secs(config.llm.timeout_secs);

        let category_routes: Vec<(String, BTreeSet<String>)> = config
            .retrieval
            .category_routes
            .iter()
            .map(|(category, words)| {
                let keywords: BTreeSet<String> = words.iter().flat_map(|w| text::keywords(w)).collect();
                (category.clone(), keywords)
            })
            .collect();

        let inner = Inner {
            store: Arc::new(SessionStore::new(&config.session, &config.cache)),
            engine: RetrievalEngine::new(
                self.index,
                config.retrieval.top_k,
                Duration::from_secs(config.retrieval.timeout_secs),
            ),
            classifier: FollowUpClassifier::new(config.classifier.clone()),
            rewriter: QuestionRewriter::new(
                Arc::clone(&self.model),
                prompts.clone(),
                config.session.rewrite_window,
                llm_timeout,
            ),
            validator: RelevanceValidator::new(config.validator.threshold),
            model: self.model,
            prompts,
            category_routes,
            history_window: config.session.rewrite_window,
            fallback_confidence: config.validator.fallback_confidence,
            llm_timeout,
            reap_interval: Duration::from_secs(config.session.reap_interval_secs),
            transcripts: self.transcripts,
            users: self.users,
        };

        Ok(RetrievalOrchestrator { inner: Arc::new(inner) })
    }
}

struct Inner {
    store: Arc<SessionStore>,
    engine: RetrievalEngine,
    classifier: FollowUpClassifier,
    rewriter: QuestionRewriter,
    validator: RelevanceValidator,
    model: Arc<dyn LanguageModel>,
    prompts: PromptBuilder,
    category_routes: Vec<(String, BTreeSet<String>)>,
    history_window: usize,
    fallback_confidence: f32,
    llm_timeout: Duration,
    reap_interval: Duration,
    transcripts: Option<Arc<dyn TranscriptSink>>,
    users: Option<Arc<dyn UserContextProvider>>,
}

/// Answer produced by the retrieval loop, before commit
struct Outcome {
    answer: String,
    sources: Vec<ChunkRef>,
    confidence: f32,
    mode: AnswerMode,
}

/// Conversational retrieval orchestrator; cheap to clone
#[derive(Clone)]
pub struct RetrievalOrchestrator {
    inner: Arc<Inner>,
}

impl RetrievalOrchestrator {
    pub fn builder(
        config: Config,
        index: Arc<dyn RetrievalIndex>,
        model: Arc<dyn LanguageModel>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            index,
            model,
            transcripts: None,
            users: None,
        }
    }

    pub fn new(config: Config, index: Arc<dyn RetrievalIndex>, model: Arc<dyn LanguageModel>) -> Result<Self> {
        Self::builder(config, index, model).build()
    }

    /// Bring the retrieval index up before the first question.
    ///
    /// Optional: the first `ask` initializes a lazy index itself. Loading is
    /// never bounded by the per-search timeout.
    pub async fn init(&self) -> Result<()> {
        self.inner.engine.prepare().await?;
        tracing::info!("retrieval orchestrator ready");
        Ok(())
    }

    /// Answer `question` within `session_id`.
    ///
    /// The run executes on its own task, so dropping the returned future
    /// does not abandon a half-committed session.
    pub async fn ask(&self, session_id: &str, user_id: &str, question: &str) -> Result<AskResponse> {
        let this = self.clone();
        let session_id = session_id.to_string();
        let user_id = user_id.to_string();
        let question = question.to_string();

        tokio::spawn(async move { this.run(&session_id, &user_id, &question).await })
            .await
            .map_err(|e| RagError::Internal(format!("ask task failed: {}", e)))?
    }

    /// Clear turns and cache of a session, waiting for any run in progress
    pub async fn reset_session(&self, session_id: &str) {
        if let Some(handle) = self.inner.store.get(session_id) {
            let _gate = handle.begin_run().await;
            handle.with(|session| session.reset());
            tracing::info!(session_id, "session reset");
        }
        self.inner.model.forget_session(session_id).await;
    }

    /// Make `session_id` the active conversation for `user_id`.
    ///
    /// An existing session owned by another user is wiped before reuse.
    pub async fn set_session(&self, session_id: &str, user_id: &str) {
        let handle = self.inner.store.get_or_create(session_id, user_id);
        let _gate = handle.begin_run().await;

        let reassigned = handle.with(|session| {
            session.touch();
            if session.user_id == user_id {
                return false;
            }
            session.reset();
            session.user_id = user_id.to_string();
            true
        });

        if reassigned {
            tracing::info!(session_id, user_id, "session reassigned to new user");
            self.inner.model.forget_session(session_id).await;
        }
    }

    /// Copy of a session's state, if it exists
    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.inner.store.get(session_id).map(|handle| handle.snapshot())
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.inner.store
    }

    /// Start the background task that evicts idle sessions
    pub fn spawn_idle_reaper(&self) -> JoinHandle<()> {
        Arc::clone(&self.inner.store).spawn_idle_reaper(self.inner.reap_interval)
    }

    async fn run(&self, session_id: &str, user_id: &str, question: &str) -> Result<AskResponse> {
        let inner = &self.inner;
        let handle = inner.store.get_or_create(session_id, user_id);
        let gate = handle.begin_run().await;
        let mut run = PipelineRun::new();

        let recent = handle.with(|session| {
            session.touch();
            session.recent_turns(inner.history_window)
        });

        let follow_up = inner.classifier.is_follow_up(question, &recent);
        run.advance(PipelineEvent::Classify)?;

        let (query, standalone_question) = if follow_up {
            let rewritten = inner.rewriter.rewrite(question, &recent).await;
            run.advance(PipelineEvent::FollowUp)?;
            tracing::debug!(session_id, question, rewritten = %rewritten, "follow-up rewritten");
            (rewritten.clone(), Some(rewritten))
        } else {
            run.advance(PipelineEvent::Standalone)?;
            (question.to_string(), None)
        };

        let conversation_hint = if follow_up {
            inner.classifier.context_hint(question)
        } else {
            String::new()
        };

        let cached_categories = handle.with(|session| {
            if session.cache.is_related(&query) {
                Some(session.cache.categories())
            } else {
                session.cache.clear();
                None
            }
        });
        run.advance(PipelineEvent::CheckCache)?;

        let mut categories = cached_categories
            .filter(|c| !c.is_empty())
            .or_else(|| self.route_categories(&query));

        let user = self.user_hints(user_id).await;

        let outcome = loop {
            let chunks = match inner.engine.retrieve(&query, categories.as_deref()).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::error!(session_id, question, error = %e, "retrieval failed");
                    return Err(e);
                }
            };
            run.advance(PipelineEvent::Retrieve)?;

            let verdict = inner.validator.assess(&query, &chunks);
            run.advance(PipelineEvent::Validate)?;

            if verdict.accepted {
                run.advance(PipelineEvent::UsePassages)?;
                break self
                    .answer_from_passages(
                        session_id,
                        question,
                        &query,
                        &conversation_hint,
                        chunks,
                        user.as_ref(),
                    )
                    .await?;
            }

            if run.can_retry() {
                tracing::info!(
                    session_id,
                    average = verdict.average,
                    narrowed = categories.is_some(),
                    "relevance miss, retrying against the full index"
                );
                handle.with(|session| session.cache.clear());
                run.advance(PipelineEvent::Retry)?;
                categories = None;
                continue;
            }

            tracing::info!(
                session_id,
                average = verdict.average,
                "relevance miss after retry, answering from general knowledge"
            );
            run.advance(PipelineEvent::GiveUp)?;
            break self
                .answer_from_knowledge(session_id, question, &query, &conversation_hint, user.as_ref())
                .await?;
        };

        let now = Utc::now();
        handle.with(|session| {
            if outcome.mode == AnswerMode::Retrieval {
                session.cache.update_at(&query, outcome.sources.clone(), now);
            }
            session.push_turn(Turn {
                question: question.to_string(),
                answer: outcome.answer.clone(),
                timestamp: now,
            });
        });
        run.advance(PipelineEvent::Commit)?;
        run.advance(PipelineEvent::Finish)?;
        drop(gate);

        tracing::info!(
            session_id,
            follow_up,
            mode = ?outcome.mode,
            confidence = outcome.confidence,
            sources = outcome.sources.len(),
            "question answered"
        );

        let record = ExchangeRecord {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            question: question.to_string(),
            answer: outcome.answer.clone(),
            sources: outcome.sources.clone(),
            confidence: outcome.confidence,
            timestamp: now,
        };
        self.persist(&record).await;

        Ok(AskResponse {
            answer: outcome.answer,
            sources: outcome.sources,
            confidence: outcome.confidence,
            session_id: session_id.to_string(),
            follow_up,
            standalone_question,
            mode: outcome.mode,
            path: run.into_path(),
        })
    }

    async fn answer_from_passages(
        &self,
        session_id: &str,
        question: &str,
        query: &str,
        conversation_hint: &str,
        chunks: Vec<RetrievedChunk>,
        user: Option<&UserHints>,
    ) -> Result<Outcome> {
        // sources and confidence describe only what reaches the prompt
        let chunks = self.inner.prompts.fit_context(chunks);
        let average = RelevanceValidator::average_overlap(query, &chunks);
        let sources: Vec<ChunkRef> = chunks.iter().map(|c| c.chunk.clone()).collect();
        let cache_hint = ContextCache::hint_for(&sources);

        let prompt = self.inner.prompts.answer_prompt(AnswerInputs {
            question: query,
            chunks: &chunks,
            cache_hint: &cache_hint,
            conversation_hint,
            user,
        });
        let answer = self.generate(session_id, question, &prompt).await?;

        Ok(Outcome {
            answer,
            sources,
            confidence: round_confidence(average),
            mode: AnswerMode::Retrieval,
        })
    }

    async fn answer_from_knowledge(
        &self,
        session_id: &str,
        question: &str,
        query: &str,
        conversation_hint: &str,
        user: Option<&UserHints>,
    ) -> Result<Outcome> {
        let prompt = self.inner.prompts.fallback_prompt(query, conversation_hint, user);
        let answer = self.generate(session_id, question, &prompt).await?;

        Ok(Outcome {
            answer,
            sources: Vec::new(),
            confidence: round_confidence(self.inner.fallback_confidence),
            mode: AnswerMode::Fallback,
        })
    }

    async fn generate(&self, session_id: &str, question: &str, prompt: &str) -> Result<String> {
        match generate_with_retry(self.inner.model.as_ref(), prompt, self.inner.llm_timeout).await {
            Ok(answer) => Ok(answer.trim().to_string()),
            Err(e) => {
                tracing::error!(session_id, question, error = %e, "answer generation failed");
                Err(e)
            }
        }
    }

    /// Categories whose route keywords appear in the query
    fn route_categories(&self, query: &str) -> Option<Vec<String>> {
        let query_keywords = text::keywords(query);
        let matched: Vec<String> = self
            .inner
            .category_routes
            .iter()
            .filter(|(_, keywords)| !keywords.is_disjoint(&query_keywords))
            .map(|(category, _)| category.clone())
            .collect();

        (!matched.is_empty()).then_some(matched)
    }

    async fn user_hints(&self, user_id: &str) -> Option<UserHints> {
        let provider = self.inner.users.as_ref()?;
        match provider.hints(user_id).await {
            Ok(hints) => hints,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "user context unavailable, answering without it");
                None
            }
        }
    }

    async fn persist(&self, record: &ExchangeRecord) {
        let Some(sink) = &self.inner.transcripts else {
            return;
        };
        if let Err(e) = sink.record(record).await {
            tracing::warn!(session_id = %record.session_id, error = %e, "failed to record exchange");
        }
    }
}

fn round_confidence(value: f32) -> f32 {
    (value.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_confidence() {
        assert_eq!(round_confidence(0.4567), 0.46);
        assert_eq!(round_confidence(1.7), 1.0);
        assert_eq!(round_confidence(-0.2), 0.0);
    }
}

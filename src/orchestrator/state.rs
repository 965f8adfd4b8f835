//! Pipeline state machine for one `ask` run
//!
//! Valid transitions:
//! 1.  Received     → Classified    (on: Classify)
//! 2.  Classified   → Rewritten     (on: FollowUp)
//! 3.  Classified   → Direct        (on: Standalone)
//! 4.  Rewritten    → CacheChecked  (on: CheckCache)
//! 5.  Direct       → CacheChecked  (on: CheckCache)
//! 6.  CacheChecked → Retrieved     (on: Retrieve)
//! 7.  Retrieved    → Validated     (on: Validate)
//! 8.  Validated    → CacheChecked  (on: Retry, at most once per run)
//! 9.  Validated    → Answered      (on: UsePassages)
//! 10. Validated    → Fallback      (on: GiveUp)
//! 11. Answered     → Cached        (on: Commit)
//! 12. Fallback     → Cached        (on: Commit)
//! 13. Cached       → Done          (on: Finish)
//! 14. Done         → Done          (terminal)

use crate::errors::{RagError, Result};
use serde::{Deserialize, Serialize};

/// Retrieval retries allowed after a rejected batch
pub const MAX_RETRIEVAL_RETRIES: usize = 1;

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    Received,
    Classified,
    Rewritten,
    Direct,
    CacheChecked,
    Retrieved,
    Validated,
    Answered,
    Fallback,
    Cached,
    Done,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    Classify,
    FollowUp,
    Standalone,
    CheckCache,
    Retrieve,
    Validate,
    Retry,
    UsePassages,
    GiveUp,
    Commit,
    Finish,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done)
    }

    /// Attempt a transition; invalid pairs are errors
    pub fn transition(&self, event: PipelineEvent) -> Result<PipelineState> {
        use PipelineEvent::*;
        use PipelineState::*;

        let next = match (self, event) {
            (Received, Classify) => Classified,
            (Classified, FollowUp) => Rewritten,
            (Classified, Standalone) => Direct,
            (Rewritten, CheckCache) | (Direct, CheckCache) => CacheChecked,
            (CacheChecked, Retrieve) => Retrieved,
            (Retrieved, Validate) => Validated,
            (Validated, Retry) => CacheChecked,
            (Validated, UsePassages) => Answered,
            (Validated, GiveUp) => Fallback,
            (Answered, Commit) | (Fallback, Commit) => Cached,
            (Cached, Finish) => Done,
            (Done, _) => Done,
            (from, event) => {
                return Err(RagError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                });
            }
        };

        Ok(next)
    }
}

/// Tracks one run through the pipeline, enforcing the retry budget
#[derive(Debug, Clone)]
pub struct PipelineRun {
    state: PipelineState,
    path: Vec<PipelineState>,
    retries: usize,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Received,
            path: vec![PipelineState::Received],
            retries: 0,
        }
    }

    pub fn advance(&mut self, event: PipelineEvent) -> Result<PipelineState> {
        if event == PipelineEvent::Retry && !self.can_retry() {
            return Err(RagError::InvalidTransition {
                from: format!("{:?}", self.state),
                event: "Retry (budget exhausted)".to_string(),
            });
        }

        let next = self.state.transition(event)?;
        if event == PipelineEvent::Retry {
            self.retries += 1;
        }
        tracing::trace!(from = ?self.state, to = ?next, "pipeline transition");
        self.state = next;
        self.path.push(next);
        Ok(next)
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn can_retry(&self) -> bool {
        self.retries < MAX_RETRIEVAL_RETRIES
    }

    pub fn retries(&self) -> usize {
        self.retries
    }

    pub fn into_path(self) -> Vec<PipelineState> {
        self.path
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

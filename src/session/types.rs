//! Per-conversation working state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::rag::cache::ContextCache;

/// One question/answer exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

/// Working state of one conversation
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    turns: VecDeque<Turn>,
    max_turns: usize,
    pub cache: ContextCache,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: &str, user_id: &str, max_turns: usize, cache: ContextCache) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            turns: VecDeque::with_capacity(max_turns),
            max_turns,
            cache,
            created_at: now,
            last_active_at: now,
        }
    }

    /// Append a turn, evicting the oldest when the window is full
    pub fn push_turn(&mut self, turn: Turn) {
        if self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.last_active_at = turn.timestamp;
        self.turns.push_back(turn);
    }

    pub fn turns(&self) -> &VecDeque<Turn> {
        &self.turns
    }

    /// The most recent `n` turns, oldest first
    pub fn recent_turns(&self, n: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.back()
    }

    /// Forget turns and cached context; identity and creation time stay
    pub fn reset(&mut self) {
        self.turns.clear();
        self.cache.clear();
        self.last_active_at = Utc::now();
    }

    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }
}

//! Contracts for the services around the pipeline: durable transcript
//! storage and user profile hints.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::rag::retrieval::ChunkRef;

/// A finalized exchange, handed over for durable storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub session_id: String,
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub sources: Vec<ChunkRef>,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

/// Durable store of finalized exchanges
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn record(&self, exchange: &ExchangeRecord) -> Result<()>;
}

/// Personalization hints for a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserHints {
    pub display_name: Option<String>,
    pub preferences: Vec<String>,
}

/// Source of optional personalization hints
#[async_trait]
pub trait UserContextProvider: Send + Sync {
    /// `Ok(None)` when nothing is known about the user
    async fn hints(&self, user_id: &str) -> Result<Option<UserHints>>;
}

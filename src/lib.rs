//! BuddyRAG - session-scoped conversational retrieval
//!
//! Answers questions from a passage index while keeping each conversation's
//! history and retrieval context isolated from every other conversation.
//!
//! # Architecture
//!
//! - **Session**: per-conversation turns and context cache, keyed store
//! - **RAG**: follow-up classifier, question rewriter, context cache, relevance validator
//! - **Retrieval**: index contract, deduplicating engine, lazily initialized shared index
//! - **Orchestrator**: pipeline state machine tying the components together

pub mod collaborators;
pub mod config;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod orchestrator;
pub mod prompt;
pub mod rag;
pub mod session;
pub mod text;

pub mod cli;

// Re-export commonly used types
pub use config::Config;
pub use errors::{RagError, Result};
pub use orchestrator::{AnswerMode, AskResponse, RetrievalOrchestrator};

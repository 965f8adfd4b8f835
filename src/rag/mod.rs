// Conversational retrieval components
//
// Components:
// - Classifier: decides whether a question leans on earlier turns
// - Rewriter: turns follow-ups into standalone questions
// - Cache: per-session current/previous retrieval results
// - Validator: relevance gate in front of the language model
// - Retrieval: index contract, deduplicating engine and backends

pub mod cache;
pub mod classifier;
pub mod retrieval;
pub mod rewriter;
pub mod validator;

// Re-export key types
pub use cache::{ContextCache, ContextCacheEntry};
pub use classifier::FollowUpClassifier;
pub use retrieval::{ChunkRef, RetrievalEngine, RetrievalIndex, RetrievedChunk, SearchHit};
pub use rewriter::QuestionRewriter;
pub use validator::{RelevanceValidator, RelevanceVerdict};

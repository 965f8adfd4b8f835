// Session state: per-conversation working set and its store
//
// Components:
// - Types: Session and Turn
// - Store: keyed, race-free session registry with idle eviction
// - Persistence: JSONL transcript sink for finalized exchanges

pub mod persistence;
pub mod store;
pub mod types;

// Re-export key types
pub use persistence::{JsonlTranscriptSink, PersistenceConfig};
pub use store::{SessionHandle, SessionSlot, SessionStore};
pub use types::{Session, Turn};

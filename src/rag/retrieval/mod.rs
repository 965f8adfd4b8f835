// Retrieval: index contract, engine, in-memory backend and lazy init guard
pub mod engine;
pub mod memory;
pub mod shared;

pub use engine::{deduplicate, ChunkRef, RetrievalEngine, RetrievalIndex, RetrievedChunk, SearchHit};
pub use memory::{InMemoryIndex, JsonFileLoader, Passage};
pub use shared::{IndexLoader, SharedIndex};

// Relevance gate for retrieved passages
use serde::{Deserialize, Serialize};

use crate::rag::retrieval::RetrievedChunk;
use crate::text;

/// Outcome of screening a batch of passages
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceVerdict {
    /// Mean keyword coverage of the query across chunks
    pub average: f32,
    pub accepted: bool,
}

/// Accepts or rejects a whole batch of chunks; never re-orders them
#[derive(Debug, Clone, Copy)]
pub struct RelevanceValidator {
    threshold: f32,
}

impl RelevanceValidator {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Score and gate a batch with the configured threshold
    pub fn assess(&self, query: &str, chunks: &[RetrievedChunk]) -> RelevanceVerdict {
        let average = Self::average_overlap(query, chunks);
        RelevanceVerdict {
            average,
            accepted: !chunks.is_empty() && average >= self.threshold,
        }
    }

    /// Gate a batch against an explicit threshold
    pub fn is_relevant(query: &str, chunks: &[RetrievedChunk], threshold: f32) -> bool {
        !chunks.is_empty() && Self::average_overlap(query, chunks) >= threshold
    }

    /// Mean fraction of query keywords found in each chunk's content
    pub fn average_overlap(query: &str, chunks: &[RetrievedChunk]) -> f32 {
        if chunks.is_empty() {
            return 0.0;
        }

        let query_keywords = text::keywords(query);
        let total: f32 = chunks
            .iter()
            .map(|c| text::coverage(&query_keywords, &text::keywords(&c.content)))
            .sum();

        total / chunks.len() as f32
    }
}

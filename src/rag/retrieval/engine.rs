// Retrieval engine: index contract, chunk snapshots and deduplication
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{RagError, Result};

/// Maximum characters kept in a chunk preview
pub const PREVIEW_CHARS: usize = 200;

/// Over-fetch factor used when a search is filtered by category after the fact
const CATEGORY_OVERFETCH: usize = 4;

/// Raw hit returned by a retrieval index, score-sorted descending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    pub source_id: String,
    pub category: String,
    pub score: f32,
}

/// Immutable snapshot of a retrieved passage, as cached and returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub source_id: String,
    pub category: String,
    pub content_preview: String,
    pub similarity_score: f32,
}

/// A chunk together with the full passage text it was cut from
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: ChunkRef,
    pub content: String,
}

impl From<SearchHit> for RetrievedChunk {
    fn from(hit: SearchHit) -> Self {
        Self {
            chunk: ChunkRef {
                source_id: hit.source_id,
                category: hit.category,
                content_preview: preview(&hit.content),
                similarity_score: hit.score,
            },
            content: hit.content,
        }
    }
}

/// Shared, read-mostly retrieval backend
#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    /// Top-k passages for a query, highest score first
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;

    /// Finish any deferred setup; searches may still call this lazily
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Top-k passages restricted to the given categories
    async fn search_in(&self, query: &str, k: usize, categories: &[String]) -> Result<Vec<SearchHit>> {
        let hits = self.search(query, k.saturating_mul(CATEGORY_OVERFETCH)).await?;
        Ok(hits
            .into_iter()
            .filter(|hit| categories.iter().any(|c| c.eq_ignore_ascii_case(&hit.category)))
            .take(k)
            .collect())
    }
}

/// Retrieval engine: bounded, deduplicated searches against a shared index
#[derive(Clone)]
pub struct RetrievalEngine {
    index: Arc<dyn RetrievalIndex>,
    top_k: usize,
    timeout: Duration,
}

impl RetrievalEngine {
    pub fn new(index: Arc<dyn RetrievalIndex>, top_k: usize, timeout: Duration) -> Self {
        Self { index, top_k, timeout }
    }

    /// Run deferred index setup, outside any search timeout
    pub async fn prepare(&self) -> Result<()> {
        self.index.prepare().await.map_err(as_retrieval_error)
    }

    /// Search the index, optionally narrowed to categories, and deduplicate by source
    pub async fn retrieve(&self, query: &str, categories: Option<&[String]>) -> Result<Vec<RetrievedChunk>> {
        self.prepare().await?;

        let search = async {
            match categories {
                Some(categories) if !categories.is_empty() => {
                    self.index.search_in(query, self.top_k, categories).await
                }
                _ => self.index.search(query, self.top_k).await,
            }
        };

        let hits = tokio::time::timeout(self.timeout, search)
            .await
            .map_err(|_| {
                RagError::retrieval(format!("search timed out after {}ms", self.timeout.as_millis()))
            })?
            .map_err(as_retrieval_error)?;

        Ok(deduplicate(hits))
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}

fn as_retrieval_error(e: RagError) -> RagError {
    match e {
        RagError::RetrievalUnavailable { .. } => e,
        other => RagError::retrieval(other.to_string()),
    }
}

/// Keep the highest-scoring hit per source section, ordered by score descending
pub fn deduplicate(hits: Vec<SearchHit>) -> Vec<RetrievedChunk> {
    let mut best: Vec<SearchHit> = Vec::with_capacity(hits.len());
    let mut position: HashMap<String, usize> = HashMap::new();

    for hit in hits {
        match position.get(&hit.source_id) {
            Some(&idx) => {
                if hit.score > best[idx].score {
                    best[idx] = hit;
                }
            }
            None => {
                position.insert(hit.source_id.clone(), best.len());
                best.push(hit);
            }
        }
    }

    best.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    best.into_iter().map(RetrievedChunk::from).collect()
}

fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let cut: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        content.to_string()
    }
}

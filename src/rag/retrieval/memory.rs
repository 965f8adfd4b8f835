// In-memory passage index with keyword-coverage scoring
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::Result;
use crate::rag::retrieval::engine::{RetrievalIndex, SearchHit};
use crate::rag::retrieval::shared::IndexLoader;
use crate::text;

/// A source passage as stored in a handbook export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Section identifier, e.g. "4.1"
    pub source_id: String,
    pub category: String,
    pub content: String,
}

impl Passage {
    pub fn new(source_id: impl Into<String>, category: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            category: category.into(),
            content: content.into(),
        }
    }
}

struct IndexedPassage {
    passage: Passage,
    keywords: BTreeSet<String>,
}

/// Read-only index over a fixed set of passages
pub struct InMemoryIndex {
    passages: Vec<IndexedPassage>,
}

impl InMemoryIndex {
    pub fn new(passages: Vec<Passage>) -> Self {
        let passages = passages
            .into_iter()
            .map(|passage| IndexedPassage {
                keywords: text::keywords(&passage.content),
                passage,
            })
            .collect();

        Self { passages }
    }

    /// Load passages from a JSON array file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let passages: Vec<Passage> = serde_json::from_str(&json)?;
        Ok(Self::new(passages))
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Distinct categories present in the index
    pub fn categories(&self) -> BTreeSet<String> {
        self.passages
            .iter()
            .map(|p| p.passage.category.clone())
            .collect()
    }
}

#[async_trait]
impl RetrievalIndex for InMemoryIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let query_keywords = text::keywords(query);

        let mut hits: Vec<SearchHit> = self
            .passages
            .iter()
            .filter_map(|indexed| {
                let score = text::coverage(&query_keywords, &indexed.keywords);
                (score > 0.0).then(|| SearchHit {
                    content: indexed.passage.content.clone(),
                    source_id: indexed.passage.source_id.clone(),
                    category: indexed.passage.category.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }
}

/// Loads an `InMemoryIndex` from a JSON passage export on first use
pub struct JsonFileLoader {
    path: PathBuf,
}

impl JsonFileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl IndexLoader for JsonFileLoader {
    async fn load(&self) -> Result<Arc<dyn RetrievalIndex>> {
        let json = tokio::fs::read_to_string(&self.path).await?;
        let passages: Vec<Passage> = serde_json::from_str(&json)?;
        let index = InMemoryIndex::new(passages);
        tracing::info!(path = %self.path.display(), passages = index.len(), "passage index loaded");
        Ok(Arc::new(index))
    }
}

// Per-session context cache: current and previous retrieval results
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;
use crate::rag::retrieval::ChunkRef;
use crate::text;

/// Current and displaced retrieval results of one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextCacheEntry {
    pub query: String,
    pub chunks: Vec<ChunkRef>,
    pub previous_query: String,
    pub previous_chunks: Vec<ChunkRef>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Context cache with relatedness and expiry checks
#[derive(Debug, Clone)]
pub struct ContextCache {
    entry: ContextCacheEntry,
    relatedness_threshold: f32,
    expiry: Duration,
}

impl ContextCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entry: ContextCacheEntry::default(),
            relatedness_threshold: config.relatedness_threshold,
            expiry: crate::config::span_secs(config.expiry_secs),
        }
    }

    /// Replace the current slot, moving it to the previous slot
    pub fn update(&mut self, query: &str, chunks: Vec<ChunkRef>) {
        self.update_at(query, chunks, Utc::now());
    }

    pub fn update_at(&mut self, query: &str, chunks: Vec<ChunkRef>, now: DateTime<Utc>) {
        let displaced_query = std::mem::replace(&mut self.entry.query, query.to_string());
        let displaced_chunks = std::mem::replace(&mut self.entry.chunks, chunks);

        self.entry.previous_query = displaced_query;
        self.entry.previous_chunks = displaced_chunks;
        self.entry.updated_at = Some(now);
    }

    /// Drop both slots
    pub fn clear(&mut self) {
        self.entry = ContextCacheEntry::default();
    }

    /// Whether `query` may reuse the cached context
    pub fn is_related(&self, query: &str) -> bool {
        self.is_related_at(query, Utc::now())
    }

    /// Keyword overlap above the threshold AND cache younger than the expiry
    pub fn is_related_at(&self, query: &str, now: DateTime<Utc>) -> bool {
        let Some(updated_at) = self.entry.updated_at else {
            return false;
        };
        if self.entry.query.is_empty() {
            return false;
        }

        let fresh = now.signed_duration_since(updated_at) < self.expiry;
        let overlap = text::overlap_ratio(&text::keywords(query), &text::keywords(&self.entry.query));

        fresh && overlap > self.relatedness_threshold
    }

    /// Short note naming the categories of the current passages
    pub fn prompt_hint(&self) -> String {
        Self::hint_for(&self.entry.chunks)
    }

    /// Category note for a batch about to become the current passages
    pub fn hint_for(chunks: &[ChunkRef]) -> String {
        let categories = distinct_categories(chunks);
        if categories.is_empty() {
            return String::new();
        }

        format!(
            "Current sources: {}. Prefer these over anything discussed earlier in the conversation.",
            categories.join(", ")
        )
    }

    /// Distinct categories of the current chunks, in retrieval order
    pub fn categories(&self) -> Vec<String> {
        distinct_categories(&self.entry.chunks)
    }

    pub fn entry(&self) -> &ContextCacheEntry {
        &self.entry
    }

    pub fn current_chunks(&self) -> &[ChunkRef] {
        &self.entry.chunks
    }

    pub fn previous_chunks(&self) -> &[ChunkRef] {
        &self.entry.previous_chunks
    }

    pub fn is_empty(&self) -> bool {
        self.entry.query.is_empty() && self.entry.chunks.is_empty()
    }
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

fn distinct_categories(chunks: &[ChunkRef]) -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    for chunk in chunks {
        if !categories.contains(&chunk.category) {
            categories.push(chunk.category.clone());
        }
    }
    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, category: &str) -> ChunkRef {
        ChunkRef {
            source_id: source.to_string(),
            category: category.to_string(),
            content_preview: format!("preview {}", source),
            similarity_score: 0.8,
        }
    }

    #[test]
    fn test_update_then_read_round_trip() {
        let mut cache = ContextCache::default();
        let chunks = vec![chunk("4.1", "Financial"), chunk("4.3", "Financial")];

        cache.update("tuition fee", chunks.clone());
        assert_eq!(cache.current_chunks(), chunks.as_slice());
        assert_eq!(cache.entry().query, "tuition fee");
        assert!(cache.previous_chunks().is_empty());
    }

    #[test]
    fn test_update_moves_current_to_previous() {
        let mut cache = ContextCache::default();
        let first = vec![chunk("4.1", "Financial")];
        let second = vec![chunk("4.3", "Financial")];

        cache.update("tuition fee", first.clone());
        cache.update("tuition fee payment plans", second.clone());
        cache.update("tuition fee refunds", vec![chunk("4.5", "Financial")]);

        // first generation is gone after two more updates
        assert_eq!(cache.previous_chunks(), second.as_slice());
        assert_eq!(cache.entry().previous_query, "tuition fee payment plans");
        assert!(!cache.current_chunks().iter().any(|c| first.contains(c)));
    }

    #[test]
    fn test_is_related_requires_overlap() {
        let mut cache = ContextCache::default();
        let now = Utc::now();
        cache.update_at("What is the tuition fee?", vec![chunk("4.1", "Financial")], now);

        assert!(cache.is_related_at("What payment plans are available for the tuition fee?", now));
        assert!(!cache.is_related_at("What is the grading scale?", now));
    }

    #[test]
    fn test_is_related_requires_freshness() {
        let mut cache = ContextCache::default();
        let then = Utc::now();
        cache.update_at("tuition fee", vec![chunk("4.1", "Financial")], then);

        assert!(cache.is_related_at("tuition fee", then + Duration::seconds(299)));
        assert!(!cache.is_related_at("tuition fee", then + Duration::seconds(300)));
    }

    #[test]
    fn test_unbounded_expiry_never_expires() {
        let mut cache = ContextCache::new(&CacheConfig {
            expiry_secs: u64::MAX,
            ..Default::default()
        });
        let then = Utc::now();
        cache.update_at("tuition fee", vec![chunk("4.1", "Financial")], then);

        assert!(cache.is_related_at("tuition fee", then + Duration::days(3650)));
    }

    #[test]
    fn test_empty_cache_is_unrelated() {
        let cache = ContextCache::default();
        assert!(!cache.is_related("tuition fee"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_drops_both_slots() {
        let mut cache = ContextCache::default();
        cache.update("a b", vec![chunk("1", "General")]);
        cache.update("a b c", vec![chunk("2", "General")]);
        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.previous_chunks().is_empty());
        assert!(cache.entry().updated_at.is_none());
    }

    #[test]
    fn test_prompt_hint_names_current_categories() {
        let mut cache = ContextCache::default();
        assert_eq!(cache.prompt_hint(), "");

        cache.update(
            "fees and grades",
            vec![chunk("4.1", "Financial"), chunk("6.2", "Academic"), chunk("4.3", "Financial")],
        );
        let hint = cache.prompt_hint();
        assert!(hint.contains("Financial, Academic"));
        assert_eq!(cache.categories(), vec!["Financial", "Academic"]);
    }
}

//! Vector index over embedded chunks.
//!
//! A [`VectorIndex`] is built per access scope by the [`IndexBuilder`], the
//! scopes are merged into one composite index, and the result is persisted
//! with [`save_index`]. Queries go through an [`IndexHandle`], which swaps in
//! rebuilt indexes without disturbing readers.

mod builder;
mod handle;
mod store;

pub use builder::{chunk_id, IndexBuilder};
pub use handle::IndexHandle;
pub use store::{index_file, load_index, save_index, INDEX_FILE};

use crate::chunking::{Chunk, META_ACCESS};
use crate::error::{AifaqError, Result};
use crate::sources::AccessScope;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Namespace for chunk ids derived with UUIDv5.
pub(crate) const CHUNK_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_9a4e_52d3_4b8e_a0c7_3e2f_d1b4_9c58);

/// An embedded chunk stored in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    pub chunk: Chunk,
    /// Cosine similarity (higher is better).
    pub score: f32,
}

/// Metadata constraint applied before ranking.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchFilter {
    #[default]
    All,
    /// Keep chunks whose metadata `key` equals `value`.
    MetadataEquals { key: String, value: String },
}

impl SearchFilter {
    /// Only chunks tagged with `scope`.
    pub fn access(scope: AccessScope) -> Self {
        SearchFilter::MetadataEquals {
            key: META_ACCESS.to_string(),
            value: scope.as_str().to_string(),
        }
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        match self {
            SearchFilter::All => true,
            SearchFilter::MetadataEquals { key, value } => {
                chunk.metadata.get(key).is_some_and(|v| v == value)
            }
        }
    }
}

/// In-memory exact nearest-neighbour index.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    embedding_model: String,
    dimensions: usize,
    created_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
    ids: HashSet<String>,
}

impl VectorIndex {
    /// Create an empty index for vectors produced by `embedding_model`.
    pub fn new(embedding_model: &str, dimensions: usize) -> Self {
        Self {
            embedding_model: embedding_model.to_string(),
            dimensions,
            created_at: Utc::now(),
            entries: Vec::new(),
            ids: HashSet::new(),
        }
    }

    pub(crate) fn from_parts(
        embedding_model: String,
        dimensions: usize,
        created_at: DateTime<Utc>,
        entries: Vec<IndexEntry>,
    ) -> Self {
        let ids = entries.iter().map(|e| e.id.clone()).collect();
        Self {
            embedding_model,
            dimensions,
            created_at,
            entries,
            ids,
        }
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Append an entry. Ids must be unique and vectors must match the index dimensions.
    pub fn insert(&mut self, entry: IndexEntry) -> Result<()> {
        if entry.embedding.len() != self.dimensions {
            return Err(AifaqError::Index(format!(
                "Embedding for {} has {} dimensions, index expects {}",
                entry.id,
                entry.embedding.len(),
                self.dimensions
            )));
        }
        if !self.ids.insert(entry.id.clone()) {
            return Err(AifaqError::Index(format!("Duplicate entry id {}", entry.id)));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Union of two indexes. Entries of `other` follow those of `self`; an id
    /// already present is re-keyed so both entries survive.
    #[instrument(skip_all, fields(left = self.len(), right = other.len()))]
    pub fn merge(mut self, other: VectorIndex) -> Result<VectorIndex> {
        if self.embedding_model != other.embedding_model {
            return Err(AifaqError::EmbeddingModelMismatch {
                index: self.embedding_model,
                configured: other.embedding_model,
            });
        }
        if self.dimensions != other.dimensions {
            return Err(AifaqError::Index(format!(
                "Cannot merge indexes with {} and {} dimensions",
                self.dimensions, other.dimensions
            )));
        }

        let mut rekeyed = 0;
        for mut entry in other.entries {
            if self.ids.contains(&entry.id) {
                let mut attempt = 1u32;
                let mut candidate = rekey(&entry.id, attempt);
                while self.ids.contains(&candidate) {
                    attempt += 1;
                    candidate = rekey(&entry.id, attempt);
                }
                entry.id = candidate;
                rekeyed += 1;
            }
            self.ids.insert(entry.id.clone());
            self.entries.push(entry);
        }

        if rekeyed > 0 {
            debug!("Re-keyed {} colliding entries during merge", rekeyed);
        }
        self.created_at = self.created_at.max(other.created_at);
        Ok(self)
    }

    /// Top-`k` entries passing `filter`, by descending cosine similarity.
    ///
    /// The filter is applied before ranking, so `k` results are returned
    /// whenever at least `k` entries pass it. Ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize, filter: &SearchFilter) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = self
            .entries
            .iter()
            .filter(|e| filter.matches(&e.chunk))
            .map(|e| SearchResult {
                id: e.id.clone(),
                chunk: e.chunk.clone(),
                score: cosine_similarity(query, &e.embedding),
            })
            .collect();

        // Stable sort keeps insertion order between equal scores.
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        results
    }

    /// Entries containing every whitespace-separated term of `query`
    /// (case-insensitive) in their text or in one of their metadata values.
    /// An empty query matches everything.
    pub fn entries_matching(&self, query: &str) -> Vec<&IndexEntry> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        self.entries
            .iter()
            .filter(|entry| {
                let text = entry.chunk.text.to_lowercase();
                let values: Vec<String> = entry
                    .chunk
                    .metadata
                    .values()
                    .map(|v| v.to_lowercase())
                    .collect();
                terms
                    .iter()
                    .all(|term| text.contains(term) || values.iter().any(|v| v.contains(term)))
            })
            .collect()
    }
}

fn rekey(id: &str, attempt: u32) -> String {
    Uuid::new_v5(&CHUNK_NAMESPACE, format!("{}#merge{}", id, attempt).as_bytes()).to_string()
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{Metadata, META_SOURCE, META_TITLE};

    fn entry(id: &str, text: &str, access: &str, embedding: Vec<f32>) -> IndexEntry {
        let mut metadata = Metadata::new();
        metadata.insert(META_SOURCE.to_string(), format!("{}.txt", id));
        metadata.insert(META_ACCESS.to_string(), access.to_string());
        IndexEntry {
            id: id.to_string(),
            chunk: Chunk {
                text: text.to_string(),
                metadata,
                offset: 0,
                ordinal: 0,
                document_index: 0,
            },
            embedding,
        }
    }

    fn index_with(entries: Vec<IndexEntry>) -> VectorIndex {
        let mut index = VectorIndex::new("stub", 2);
        for e in entries {
            index.insert(e).unwrap();
        }
        index
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[test]
    fn test_insert_rejects_wrong_dimensions_and_duplicates() {
        let mut index = VectorIndex::new("stub", 2);
        assert!(index.insert(entry("a", "x", "public", vec![1.0])).is_err());
        index.insert(entry("a", "x", "public", vec![1.0, 0.0])).unwrap();
        assert!(index.insert(entry("a", "y", "public", vec![0.0, 1.0])).is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected_after_merge_and_reload() {
        let left = index_with(vec![entry("a", "x", "public", vec![1.0, 0.0])]);
        let right = index_with(vec![entry("a", "y", "private", vec![0.0, 1.0])]);
        let mut merged = left.merge(right).unwrap();
        let rekeyed = merged.entries()[1].id.clone();

        assert!(merged.insert(entry("a", "z", "public", vec![1.0, 1.0])).is_err());
        assert!(merged.insert(entry(&rekeyed, "z", "public", vec![1.0, 1.0])).is_err());

        let mut reloaded = VectorIndex::from_parts(
            "stub".to_string(),
            2,
            Utc::now(),
            merged.entries().to_vec(),
        );
        assert!(reloaded.insert(entry(&rekeyed, "z", "public", vec![1.0, 1.0])).is_err());
        reloaded.insert(entry("b", "z", "public", vec![1.0, 1.0])).unwrap();
        assert_eq!(reloaded.len(), 3);
    }

    #[test]
    fn test_search_orders_by_score_with_stable_ties() {
        let index = index_with(vec![
            entry("low", "l", "public", vec![0.0, 1.0]),
            entry("tie1", "t1", "public", vec![1.0, 0.0]),
            entry("tie2", "t2", "public", vec![2.0, 0.0]),
        ]);

        let results = index.search(&[1.0, 0.0], 5, &SearchFilter::All);
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["tie1", "tie2", "low"]);
    }

    #[test]
    fn test_filter_applies_before_top_k() {
        let index = index_with(vec![
            entry("p1", "private close", "private", vec![1.0, 0.0]),
            entry("p2", "private closer", "private", vec![1.0, 0.01]),
            entry("pub", "public far", "public", vec![0.2, 1.0]),
        ]);

        let results = index.search(&[1.0, 0.0], 1, &SearchFilter::access(AccessScope::Public));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "pub");
    }

    #[test]
    fn test_filter_with_no_matches_is_empty() {
        let index = index_with(vec![entry("p", "private", "private", vec![1.0, 0.0])]);
        assert!(index
            .search(&[1.0, 0.0], 5, &SearchFilter::access(AccessScope::Public))
            .is_empty());
    }

    #[test]
    fn test_merge_keeps_both_sides_and_rekeys_collisions() {
        let left = index_with(vec![entry("same", "left text", "public", vec![1.0, 0.0])]);
        let right = index_with(vec![
            entry("same", "right text", "private", vec![0.0, 1.0]),
            entry("other", "other text", "private", vec![1.0, 1.0]),
        ]);

        let merged = left.merge(right).unwrap();
        assert_eq!(merged.len(), 3);

        let texts: Vec<_> = merged.entries().iter().map(|e| e.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["left text", "right text", "other text"]);

        let ids: HashSet<_> = merged.entries().iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids.len(), 3);

        let hit = merged.search(&[0.0, 1.0], 1, &SearchFilter::All);
        assert_eq!(hit[0].chunk.text, "right text");
    }

    #[test]
    fn test_merge_rejects_different_models() {
        let left = VectorIndex::new("model-a", 2);
        let right = VectorIndex::new("model-b", 2);
        assert!(matches!(
            left.merge(right),
            Err(AifaqError::EmbeddingModelMismatch { .. })
        ));
    }

    #[test]
    fn test_entries_matching_requires_every_term() {
        let mut tagged = entry("t", "Mentoring for founders", "public", vec![1.0, 0.0]);
        tagged.chunk.metadata.insert(META_TITLE.to_string(), "Keystone Program".to_string());
        let index = index_with(vec![
            tagged,
            entry("u", "Funding rounds for founders", "private", vec![0.0, 1.0]),
        ]);

        let ids = |q: &str| -> Vec<String> {
            index.entries_matching(q).iter().map(|e| e.id.clone()).collect()
        };
        assert_eq!(ids("FOUNDERS"), vec!["t", "u"]);
        assert_eq!(ids("founders keystone"), vec!["t"]);
        assert_eq!(ids("founders private"), vec!["u"]);
        assert!(ids("founders keystone funding").is_empty());
        assert_eq!(ids("").len(), 2);
    }
}

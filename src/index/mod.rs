//! In-process nearest-neighbor index over chunk embeddings.
//!
//! The index holds one `(chunk, vector)` entry per chunk identity and answers exact top-K
//! similarity queries. Readers clone an [`Arc`] snapshot under a read lock and score against
//! it lock-free, so concurrent queries proceed in parallel. Mutations clone the state, apply
//! their changes, and swap a fresh `Arc` in place; an in-flight query therefore never
//! observes a half-rebuilt index.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::chunking::{Chunk, ChunkKey, compute_chunk_hash};
use crate::config::SimilarityMetric;

/// Errors returned by index queries.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index has no entries; the corpus has not been built yet.
    #[error("index is empty; build the corpus before querying")]
    Empty,
    /// The query vector length does not match the indexed vectors.
    #[error("query vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the vectors stored in the index.
        expected: usize,
        /// Dimension of the query vector.
        actual: usize,
    },
}

/// Retrieval hit: a chunk and its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// Retrieved chunk with provenance.
    pub chunk: Chunk,
    /// Similarity score; higher is closer. Euclidean distances are negated.
    pub score: f32,
}

/// How a single upsert was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new entry was created.
    Inserted,
    /// The chunk existed with different text; entry and vector were replaced.
    Updated,
    /// The chunk existed with identical text; nothing changed.
    Unchanged,
}

/// Counters describing how a batch of upserts was applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexSummary {
    /// Entries newly created by the batch.
    pub inserted: usize,
    /// Entries replaced because the chunk text changed.
    pub updated: usize,
    /// Entries left untouched because the chunk text was identical.
    pub unchanged: usize,
    /// Stale entries dropped because the document shrank past them.
    pub removed: usize,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    chunk: Chunk,
    chunk_hash: String,
    vector: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
struct IndexState {
    /// Entries in insertion order; slot position is the retrieval tie-breaker.
    entries: Vec<IndexEntry>,
    by_key: HashMap<ChunkKey, usize>,
}

impl IndexState {
    fn apply_batch(&mut self, batch: Vec<(Chunk, Vec<f32>)>, summary: &mut IndexSummary) {
        for (chunk, vector) in batch {
            let key = chunk.key();
            let chunk_hash = compute_chunk_hash(&chunk.text);
            match self.by_key.get(&key) {
                Some(&slot) if self.entries[slot].chunk_hash == chunk_hash => {
                    summary.unchanged += 1;
                }
                Some(&slot) => {
                    self.entries[slot] = IndexEntry {
                        chunk,
                        chunk_hash,
                        vector,
                    };
                    summary.updated += 1;
                }
                None => {
                    self.by_key.insert(key, self.entries.len());
                    self.entries.push(IndexEntry {
                        chunk,
                        chunk_hash,
                        vector,
                    });
                    summary.inserted += 1;
                }
            }
        }
    }

    fn rebuild_key_map(&mut self) {
        self.by_key = self
            .entries
            .iter()
            .enumerate()
            .map(|(slot, entry)| (entry.chunk.key(), slot))
            .collect();
    }
}

/// Exact nearest-neighbor index with a similarity metric fixed at construction.
pub struct VectorIndex {
    metric: SimilarityMetric,
    state: RwLock<Arc<IndexState>>,
}

impl VectorIndex {
    /// Create an empty index using the given similarity metric.
    pub fn new(metric: SimilarityMetric) -> Self {
        Self {
            metric,
            state: RwLock::new(Arc::new(IndexState::default())),
        }
    }

    /// The similarity metric this index was built with.
    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    /// Number of chunks currently indexed.
    pub fn len(&self) -> usize {
        self.snapshot().entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace a single chunk entry. Idempotent per chunk identity:
    /// identical text is a no-op, changed text replaces the entry and vector.
    pub fn upsert(&self, chunk: Chunk, vector: Vec<f32>) -> UpsertOutcome {
        let summary = self.upsert_batch(vec![(chunk, vector)]);
        if summary.inserted == 1 {
            UpsertOutcome::Inserted
        } else if summary.updated == 1 {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Unchanged
        }
    }

    /// Apply a batch of upserts under a single write lock and state swap.
    pub fn upsert_batch(&self, batch: Vec<(Chunk, Vec<f32>)>) -> IndexSummary {
        let mut summary = IndexSummary::default();
        if batch.is_empty() {
            return summary;
        }

        let mut guard = self.state.write().expect("index lock poisoned");
        let mut next = (**guard).clone();
        next.apply_batch(batch, &mut summary);
        *guard = Arc::new(next);
        summary
    }

    /// Replace a document's entries with `batch` under a single write lock and state swap.
    ///
    /// Chunks in the batch are upserted by identity; entries of `doc_id` with a sequence
    /// number at or past the batch length are dropped, so a document that shrank between
    /// builds does not keep stale tail chunks. Readers observe either the old state or the
    /// fully synchronized one, never an intermediate.
    pub fn sync_document(&self, doc_id: &str, batch: Vec<(Chunk, Vec<f32>)>) -> IndexSummary {
        let keep_below = batch.len();
        let mut summary = IndexSummary::default();

        let mut guard = self.state.write().expect("index lock poisoned");
        let mut next = (**guard).clone();
        next.apply_batch(batch, &mut summary);

        let before = next.entries.len();
        next.entries
            .retain(|entry| entry.chunk.doc_id != doc_id || entry.chunk.seq < keep_below);
        summary.removed = before - next.entries.len();
        if summary.removed > 0 {
            next.rebuild_key_map();
        }

        *guard = Arc::new(next);
        summary
    }

    /// Remove every entry belonging to `doc_id`; returns the number removed.
    pub fn remove_document(&self, doc_id: &str) -> usize {
        let mut guard = self.state.write().expect("index lock poisoned");
        let current = &**guard;

        let retained: Vec<IndexEntry> = current
            .entries
            .iter()
            .filter(|entry| entry.chunk.doc_id != doc_id)
            .cloned()
            .collect();
        let removed = current.entries.len() - retained.len();
        if removed == 0 {
            return 0;
        }

        let mut next = IndexState {
            entries: retained,
            by_key: HashMap::new(),
        };
        next.rebuild_key_map();

        *guard = Arc::new(next);
        removed
    }

    /// Return the `k` nearest chunks by descending similarity.
    ///
    /// Ties are broken by insertion order, which follows the original chunk order within a
    /// corpus build. Returns fewer than `k` hits when the corpus is smaller; an empty index
    /// is an error so callers can distinguish "not built" from "no matches".
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        let snapshot = self.snapshot();
        if snapshot.entries.is_empty() {
            return Err(IndexError::Empty);
        }

        let expected = snapshot.entries[0].vector.len();
        if query.len() != expected {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(f32, usize)> = snapshot
            .entries
            .iter()
            .enumerate()
            .map(|(slot, entry)| (similarity(self.metric, query, &entry.vector), slot))
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, slot)| ScoredChunk {
                chunk: snapshot.entries[slot].chunk.clone(),
                score,
            })
            .collect())
    }

    fn snapshot(&self) -> Arc<IndexState> {
        self.state.read().expect("index lock poisoned").clone()
    }
}

fn similarity(metric: SimilarityMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        SimilarityMetric::Cosine => cosine_similarity(a, b),
        SimilarityMetric::Euclidean => -euclidean_distance(a, b),
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: &str, seq: usize, text: &str) -> Chunk {
        Chunk {
            doc_id: doc.to_string(),
            seq,
            text: text.to_string(),
        }
    }

    #[test]
    fn empty_index_rejects_queries() {
        let index = VectorIndex::new(SimilarityMetric::Cosine);
        let error = index.search(&[1.0, 0.0], 3).unwrap_err();
        assert!(matches!(error, IndexError::Empty));
    }

    #[test]
    fn search_orders_by_similarity_and_caps_at_k() {
        let index = VectorIndex::new(SimilarityMetric::Cosine);
        index.upsert(chunk("a.txt", 0, "east"), vec![1.0, 0.0]);
        index.upsert(chunk("a.txt", 1, "north"), vec![0.0, 1.0]);
        index.upsert(chunk("b.txt", 0, "northeast"), vec![1.0, 1.0]);

        let hits = index.search(&[1.0, 0.1], 2).expect("hits");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "east");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn search_returns_fewer_than_k_for_small_corpus() {
        let index = VectorIndex::new(SimilarityMetric::Cosine);
        index.upsert(chunk("a.txt", 0, "only"), vec![1.0, 0.0]);

        let hits = index.search(&[1.0, 0.0], 10).expect("hits");
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let index = VectorIndex::new(SimilarityMetric::Cosine);
        // Identical vectors, so every score ties.
        index.upsert(chunk("a.txt", 0, "first"), vec![1.0, 0.0]);
        index.upsert(chunk("a.txt", 1, "second"), vec![1.0, 0.0]);
        index.upsert(chunk("a.txt", 2, "third"), vec![1.0, 0.0]);

        let hits = index.search(&[1.0, 0.0], 3).expect("hits");
        let texts: Vec<_> = hits.iter().map(|hit| hit.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn upsert_is_idempotent_per_chunk_identity() {
        let index = VectorIndex::new(SimilarityMetric::Cosine);
        let outcome = index.upsert(chunk("a.txt", 0, "alpha"), vec![1.0, 0.0]);
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let outcome = index.upsert(chunk("a.txt", 0, "alpha"), vec![1.0, 0.0]);
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert_eq!(index.len(), 1);

        let outcome = index.upsert(chunk("a.txt", 0, "alpha revised"), vec![0.0, 1.0]);
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(index.len(), 1);

        let hits = index.search(&[0.0, 1.0], 1).expect("hits");
        assert_eq!(hits[0].chunk.text, "alpha revised");
    }

    #[test]
    fn replacing_one_chunk_leaves_other_entries_untouched() {
        let index = VectorIndex::new(SimilarityMetric::Cosine);
        index.upsert(chunk("a.txt", 0, "stable"), vec![1.0, 0.0]);
        index.upsert(chunk("a.txt", 1, "volatile"), vec![0.0, 1.0]);

        let before = index.search(&[1.0, 0.0], 1).expect("hits");
        index.upsert(chunk("a.txt", 1, "volatile v2"), vec![0.0, -1.0]);
        let after = index.search(&[1.0, 0.0], 1).expect("hits");

        assert_eq!(before[0].chunk.text, after[0].chunk.text);
        assert_eq!(before[0].score, after[0].score);
    }

    #[test]
    fn sync_drops_tail_chunks_of_a_shrunken_document() {
        let index = VectorIndex::new(SimilarityMetric::Cosine);
        index.upsert(chunk("doc.txt", 0, "head"), vec![1.0, 0.0]);
        index.upsert(chunk("doc.txt", 1, "middle"), vec![0.5, 0.5]);
        index.upsert(chunk("doc.txt", 2, "tail"), vec![0.0, 1.0]);

        let summary = index.sync_document(
            "doc.txt",
            vec![(chunk("doc.txt", 0, "head rewritten"), vec![1.0, 0.1])],
        );
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.removed, 2);
        assert_eq!(index.len(), 1);

        let hits = index.search(&[0.0, 1.0], 10).expect("hits");
        let texts: Vec<_> = hits.iter().map(|hit| hit.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["head rewritten"]);
    }

    #[test]
    fn sync_leaves_other_documents_untouched() {
        let index = VectorIndex::new(SimilarityMetric::Cosine);
        index.upsert(chunk("stable.txt", 0, "stable"), vec![1.0, 0.0]);
        index.upsert(chunk("shrinking.txt", 0, "first"), vec![0.0, 1.0]);
        index.upsert(chunk("shrinking.txt", 1, "second"), vec![0.1, 0.9]);

        let summary = index.sync_document(
            "shrinking.txt",
            vec![(chunk("shrinking.txt", 0, "first"), vec![0.0, 1.0])],
        );
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.removed, 1);

        let hits = index.search(&[1.0, 0.0], 1).expect("hits");
        assert_eq!(hits[0].chunk.doc_id, "stable.txt");
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn remove_document_drops_all_its_chunks() {
        let index = VectorIndex::new(SimilarityMetric::Cosine);
        index.upsert(chunk("gone.txt", 0, "one"), vec![1.0, 0.0]);
        index.upsert(chunk("gone.txt", 1, "two"), vec![0.9, 0.1]);
        index.upsert(chunk("kept.txt", 0, "three"), vec![0.0, 1.0]);

        assert_eq!(index.remove_document("gone.txt"), 2);
        assert_eq!(index.len(), 1);

        let hits = index.search(&[1.0, 0.0], 10).expect("hits");
        assert!(hits.iter().all(|hit| hit.chunk.doc_id == "kept.txt"));

        assert_eq!(index.remove_document("gone.txt"), 0);
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let index = VectorIndex::new(SimilarityMetric::Cosine);
        index.upsert(chunk("a.txt", 0, "alpha"), vec![1.0, 0.0, 0.0]);

        let error = index.search(&[1.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            error,
            IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn euclidean_metric_prefers_nearest_point() {
        let index = VectorIndex::new(SimilarityMetric::Euclidean);
        index.upsert(chunk("a.txt", 0, "near"), vec![1.0, 1.0]);
        index.upsert(chunk("a.txt", 1, "far"), vec![10.0, 10.0]);

        let hits = index.search(&[0.9, 1.1], 2).expect("hits");
        assert_eq!(hits[0].chunk.text, "near");
        assert!(hits[0].score > hits[1].score);
    }
}

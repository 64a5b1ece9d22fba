//! Error and outcome types for the pipeline service.

use thiserror::Error;

use crate::config::ConfigError;
use crate::embedding::EmbeddingClientError;
use crate::index::IndexError;
use crate::ingest::IngestError;
use crate::responder::ResponderError;

/// Errors emitted while building the corpus index.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The document folder itself could not be ingested.
    #[error("Failed to ingest documents: {0}")]
    Ingest(#[from] IngestError),
    /// Chunking parameters were invalid.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ConfigError),
    /// Embedding provider failed to produce vectors for the corpus.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
}

/// Errors emitted while answering a query.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// Embedding provider failed to embed the query text.
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// The index rejected the retrieval request.
    #[error("Retrieval failed: {0}")]
    Index(#[from] IndexError),
    /// An external model invocation failed or timed out.
    #[error("Responder failed: {0}")]
    Responder(#[from] ResponderError),
}

impl AnswerError {
    /// Whether the failure means the corpus has not been built yet.
    pub fn is_index_empty(&self) -> bool {
        matches!(self, Self::Index(IndexError::Empty))
    }
}

/// Summary of a completed corpus build.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct BuildOutcome {
    /// Documents successfully ingested and indexed.
    pub documents: usize,
    /// Documents skipped because extraction failed.
    pub skipped_documents: usize,
    /// Total chunks produced across all documents.
    pub chunks: usize,
    /// Index entries newly created.
    pub inserted: usize,
    /// Index entries replaced because chunk text changed.
    pub updated: usize,
    /// Index entries left untouched (identical text re-ingested).
    pub unchanged: usize,
    /// Stale index entries dropped because their document shrank.
    pub removed: usize,
}

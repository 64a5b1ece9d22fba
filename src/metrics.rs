use std::sync::atomic::{AtomicU64, Ordering};

use crate::responder::Mode;

/// Thread-safe counters describing ingestion and query activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_ingested: AtomicU64,
    documents_skipped: AtomicU64,
    chunks_indexed: AtomicU64,
    extract_answers: AtomicU64,
    summary_answers: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ingested document and the number of chunks produced for it.
    pub fn record_document(&self, chunk_count: u64) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a document that could not be ingested and was skipped.
    pub fn record_skipped_document(&self) {
        self.documents_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an answered query and the mode the responder resolved to.
    pub fn record_answer(&self, mode: Mode) {
        match mode {
            Mode::Extract => self.extract_answers.fetch_add(1, Ordering::Relaxed),
            Mode::Summarize => self.summary_answers.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            documents_skipped: self.documents_skipped.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            extract_answers: self.extract_answers.load(Ordering::Relaxed),
            summary_answers: self.summary_answers.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents ingested since startup.
    pub documents_ingested: u64,
    /// Number of documents skipped because extraction failed.
    pub documents_skipped: u64,
    /// Total chunk count indexed across all documents.
    pub chunks_indexed: u64,
    /// Queries answered in extractive mode.
    pub extract_answers: u64,
    /// Queries answered in summarization mode.
    pub summary_answers: u64,
}

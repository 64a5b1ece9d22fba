//! Pipeline service coordinating ingestion, chunking, embedding, indexing, and answering.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt, stream};

use crate::chunking::{Chunk, chunk_document};
use crate::config::{SimilarityMetric, get_config};
use crate::embedding::{EmbeddingClient, get_embedding_client};
use crate::index::{IndexSummary, ScoredChunk, VectorIndex};
use crate::ingest::ingest_folder;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::pipeline::types::{AnswerError, BuildError, BuildOutcome};
use crate::responder::{Answer, Responder, get_qa_client, get_summarizer_client};

/// Chunking and retrieval parameters carried by the pipeline context.
#[derive(Debug, Clone, Copy)]
pub struct PipelineParams {
    /// Maximum chunk length in characters.
    pub chunk_max_chars: usize,
    /// Character overlap shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per query.
    pub retrieval_top_k: usize,
    /// Documents embedded concurrently during a corpus build.
    pub embed_concurrency: usize,
}

impl PipelineParams {
    /// Read parameters from the process configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        Self {
            chunk_max_chars: config.chunk_max_chars,
            chunk_overlap: config.chunk_overlap,
            retrieval_top_k: config.retrieval_top_k,
            embed_concurrency: config.embed_concurrency.max(1),
        }
    }
}

/// Explicitly constructed pipeline context owning the embedding client, index, responder, and
/// metrics. Construct it once near process start, share it through an `Arc`, and drop it at
/// shutdown; there is no module-level mutable state behind it.
pub struct PipelineService {
    embedder: Box<dyn EmbeddingClient>,
    index: VectorIndex,
    responder: Responder,
    metrics: Arc<PipelineMetrics>,
    params: PipelineParams,
}

/// Abstraction over the pipeline used by external surfaces (HTTP handlers, tests).
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Ingest a folder and build (or refresh) the index from its documents.
    async fn build_corpus(&self, folder: &Path) -> Result<BuildOutcome, BuildError>;

    /// Answer a query end-to-end: embed, retrieve, respond.
    async fn answer(&self, query: &str) -> Result<Answer, AnswerError>;

    /// Remove every indexed chunk belonging to a document.
    async fn remove_document(&self, doc_id: &str) -> usize;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl PipelineService {
    /// Build a pipeline service from process configuration.
    pub fn new() -> Self {
        let config = get_config();
        tracing::info!(provider = ?config.embedding_provider, "Initializing embedding client");
        let embedder = get_embedding_client();
        let responder = Responder::new(
            get_qa_client(),
            get_summarizer_client(),
            config.summary_triggers.clone(),
            config.qa_confidence_threshold,
        );

        Self::with_components(
            embedder,
            responder,
            config.similarity_metric,
            PipelineParams::from_config(),
        )
    }

    /// Assemble a pipeline from explicit components; used by `new` and by tests.
    pub fn with_components(
        embedder: Box<dyn EmbeddingClient>,
        responder: Responder,
        metric: SimilarityMetric,
        params: PipelineParams,
    ) -> Self {
        Self {
            embedder,
            index: VectorIndex::new(metric),
            responder,
            metrics: Arc::new(PipelineMetrics::new()),
            params,
        }
    }

    /// Ingest every supported document under `folder`, chunk and embed each one, and
    /// synchronize the index with the results.
    ///
    /// Documents are embedded concurrently up to the configured limit. Each document's index
    /// entries are then synchronized in one swap: changed chunks are replaced, identical ones
    /// left alone, and entries past the document's current chunk count dropped, so a document
    /// that shrank does not keep stale tails. Documents no longer present in the folder keep
    /// their entries; removing them goes through [`Self::remove_document`].
    pub async fn build_corpus(&self, folder: &Path) -> Result<BuildOutcome, BuildError> {
        tracing::info!(folder = %folder.display(), "Building corpus");
        let report = ingest_folder(folder)?;
        for _ in &report.skipped {
            self.metrics.record_skipped_document();
        }

        let mut outcome = BuildOutcome {
            skipped_documents: report.skipped.len(),
            ..BuildOutcome::default()
        };

        // Chunking is synchronous and cheap; doing it up front hands the embedding stream
        // owned batches instead of per-document borrows.
        let mut pending = Vec::with_capacity(report.documents.len());
        for document in &report.documents {
            let chunks: Vec<Chunk> = chunk_document(
                document,
                self.params.chunk_max_chars,
                self.params.chunk_overlap,
            )?
            .collect();
            pending.push((document.id.clone(), chunks));
        }

        let embedded: Vec<(String, Vec<(Chunk, Vec<f32>)>)> = stream::iter(pending)
            .map(|(doc_id, chunks)| self.embed_chunks(doc_id, chunks))
            .buffered(self.params.embed_concurrency)
            .try_collect()
            .await?;

        for (doc_id, batch) in embedded {
            let chunk_count = batch.len();
            let IndexSummary {
                inserted,
                updated,
                unchanged,
                removed,
            } = self.index.sync_document(&doc_id, batch);

            self.metrics.record_document(chunk_count as u64);
            outcome.documents += 1;
            outcome.chunks += chunk_count;
            outcome.inserted += inserted;
            outcome.updated += updated;
            outcome.unchanged += unchanged;
            outcome.removed += removed;
            tracing::debug!(
                document = %doc_id,
                chunks = chunk_count,
                inserted,
                updated,
                unchanged,
                removed,
                "Document indexed"
            );
        }

        tracing::info!(
            documents = outcome.documents,
            skipped = outcome.skipped_documents,
            chunks = outcome.chunks,
            "Corpus build complete"
        );
        Ok(outcome)
    }

    /// Embed one document's chunks in a single provider call.
    async fn embed_chunks(
        &self,
        doc_id: String,
        chunks: Vec<Chunk>,
    ) -> Result<(String, Vec<(Chunk, Vec<f32>)>), BuildError> {
        if chunks.is_empty() {
            return Ok((doc_id, Vec::new()));
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed(texts).await?;
        debug_assert_eq!(chunks.len(), vectors.len());

        Ok((doc_id, chunks.into_iter().zip(vectors).collect()))
    }

    /// Embed the query and return its `k` nearest chunks.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, AnswerError> {
        let vector = self.embedder.embed_one(query.to_string()).await?;
        Ok(self.index.search(&vector, k)?)
    }

    /// Answer a query end-to-end: embed, retrieve top-K, select a mode, invoke the model.
    pub async fn answer(&self, query: &str) -> Result<Answer, AnswerError> {
        let hits = self.retrieve(query, self.params.retrieval_top_k).await?;
        let answer = self.responder.respond(query, &hits).await?;

        self.metrics.record_answer(answer.mode);
        tracing::info!(
            mode = ?answer.mode,
            confidence = ?answer.confidence,
            sources = answer.sources.len(),
            "Query answered"
        );
        Ok(answer)
    }

    /// Remove every indexed chunk belonging to `doc_id`; returns the number removed.
    pub fn remove_document(&self, doc_id: &str) -> usize {
        let removed = self.index.remove_document(doc_id);
        tracing::info!(document = doc_id, removed, "Document removed from index");
        removed
    }

    /// Number of chunks currently indexed.
    pub fn indexed_chunks(&self) -> usize {
        self.index.len()
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl PipelineApi for PipelineService {
    async fn build_corpus(&self, folder: &Path) -> Result<BuildOutcome, BuildError> {
        PipelineService::build_corpus(self, folder).await
    }

    async fn answer(&self, query: &str) -> Result<Answer, AnswerError> {
        PipelineService::answer(self, query).await
    }

    async fn remove_document(&self, doc_id: &str) -> usize {
        PipelineService::remove_document(self, doc_id)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        PipelineService::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbeddingClient;
    use crate::responder::{
        ModelClientError, Mode, QaClient, QaSpan, SummarizationClient,
    };
    use std::fs;

    struct FixedQa;

    #[async_trait]
    impl QaClient for FixedQa {
        async fn answer_span(
            &self,
            _question: &str,
            _context: &str,
        ) -> Result<QaSpan, ModelClientError> {
            Ok(QaSpan {
                answer: "span".into(),
                confidence: 0.9,
            })
        }
    }

    struct FixedSummarizer;

    #[async_trait]
    impl SummarizationClient for FixedSummarizer {
        async fn summarize(&self, _text: &str) -> Result<String, ModelClientError> {
            Ok("summary".into())
        }
    }

    fn service() -> PipelineService {
        PipelineService::with_components(
            Box::new(HashEmbeddingClient::new(32)),
            Responder::new(
                Box::new(FixedQa),
                Box::new(FixedSummarizer),
                vec!["summary".into(), "summarize".into()],
                0.3,
            ),
            SimilarityMetric::Cosine,
            PipelineParams {
                chunk_max_chars: 50,
                chunk_overlap: 10,
                retrieval_top_k: 3,
                embed_concurrency: 2,
            },
        )
    }

    #[tokio::test]
    async fn answering_before_build_reports_empty_index() {
        let service = service();
        let error = service.answer("anything").await.unwrap_err();
        assert!(error.is_index_empty());
    }

    #[tokio::test]
    async fn build_then_answer_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("facts.txt"), "Paris is the capital of France.")
            .expect("write");

        let service = service();
        let outcome = service.build_corpus(dir.path()).await.expect("build");
        assert_eq!(outcome.documents, 1);
        assert_eq!(outcome.chunks, 1);
        assert_eq!(outcome.inserted, 1);

        let answer = service.answer("capital of France?").await.expect("answer");
        assert_eq!(answer.mode, Mode::Extract);
        assert_eq!(answer.sources, vec!["facts.txt".to_string()]);

        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.documents_ingested, 1);
        assert_eq!(snapshot.extract_answers, 1);
    }

    #[tokio::test]
    async fn rebuilding_identical_corpus_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("facts.txt"), "Stable content.").expect("write");

        let service = service();
        service.build_corpus(dir.path()).await.expect("build");
        let second = service.build_corpus(dir.path()).await.expect("rebuild");

        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.unchanged, 1);
        assert_eq!(service.indexed_chunks(), 1);
    }

    #[tokio::test]
    async fn shrunken_document_loses_its_tail_chunks_on_rebuild() {
        let dir = tempfile::tempdir().expect("tempdir");
        let long = "alpha beta gamma ".repeat(8);
        fs::write(dir.path().join("doc.txt"), &long).expect("write");

        let service = service();
        let first = service.build_corpus(dir.path()).await.expect("build");
        assert!(first.chunks >= 2);

        fs::write(dir.path().join("doc.txt"), "short").expect("rewrite");
        let second = service.build_corpus(dir.path()).await.expect("rebuild");
        assert_eq!(second.chunks, 1);
        assert_eq!(second.updated, 1);
        assert_eq!(second.removed, first.chunks - 1);
        assert_eq!(service.indexed_chunks(), 1);

        let hits = service.retrieve("gamma", 10).await.expect("hits");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "short");
    }

    #[tokio::test]
    async fn removing_a_document_excludes_it_from_retrieval() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("keep.txt"), "kept text").expect("write");
        fs::write(dir.path().join("drop.txt"), "dropped text").expect("write");

        let service = service();
        service.build_corpus(dir.path()).await.expect("build");
        assert_eq!(service.remove_document("drop.txt"), 1);

        let hits = service.retrieve("dropped text", 10).await.expect("hits");
        assert!(hits.iter().all(|hit| hit.chunk.doc_id == "keep.txt"));
    }
}

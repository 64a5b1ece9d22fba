//! Answer generation over retrieved context.
//!
//! The responder owns the two terminal modes of a query. Mode selection is deterministic: a
//! query containing a configured trigger word is summarized outright; anything else goes
//! through the extractive QA model first, and only a confidence below the configured
//! threshold reroutes it to summarization. A model *failure* is never rerouted — it surfaces
//! as a [`ResponderError`] naming the failing mode, so callers cannot mistake an outage for a
//! low-confidence answer.

mod models;

pub use models::{HttpQaClient, OllamaSummarizationClient, get_qa_client, get_summarizer_client};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::index::ScoredChunk;

/// Errors raised by the external model clients.
#[derive(Debug, Error)]
pub enum ModelClientError {
    /// Provider was unreachable or the request timed out.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("generation failed: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced by the responder, annotated with the failing mode.
#[derive(Debug, Error)]
pub enum ResponderError {
    /// The extractive QA model invocation failed.
    #[error("extractive QA model failed: {0}")]
    Qa(#[source] ModelClientError),
    /// The summarization model invocation failed.
    #[error("summarization model failed: {0}")]
    Summarization(#[source] ModelClientError),
}

impl ResponderError {
    /// The mode whose model invocation failed.
    pub fn failing_mode(&self) -> Mode {
        match self {
            Self::Qa(_) => Mode::Extract,
            Self::Summarization(_) => Mode::Summarize,
        }
    }
}

/// Terminal answer modes; a tagged variant, not a dispatch hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Verbatim span selected from retrieved context by the QA model.
    Extract,
    /// Generated summary of the retrieved context.
    Summarize,
}

/// Extractive answer span returned by a QA model.
#[derive(Debug, Clone)]
pub struct QaSpan {
    /// Best answer span found in the context.
    pub answer: String,
    /// Model confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Answer returned to the caller, annotated with its provenance.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Answer text (extracted span or generated summary).
    pub text: String,
    /// Mode the responder resolved to.
    pub mode: Mode,
    /// QA confidence; absent in summarization mode.
    pub confidence: Option<f32>,
    /// Deduplicated source document identifiers in first-retrieved order.
    pub sources: Vec<String>,
}

/// Interface implemented by extractive question-answering models.
#[async_trait]
pub trait QaClient: Send + Sync {
    /// Select the best answer span for `question` within `context`.
    async fn answer_span(&self, question: &str, context: &str)
    -> Result<QaSpan, ModelClientError>;
}

/// Interface implemented by summarization models.
#[async_trait]
pub trait SummarizationClient: Send + Sync {
    /// Generate a concise summary of `text`.
    async fn summarize(&self, text: &str) -> Result<String, ModelClientError>;
}

/// Chooses between extract and summarize modes and invokes the corresponding model.
pub struct Responder {
    qa: Box<dyn QaClient>,
    summarizer: Box<dyn SummarizationClient>,
    summary_triggers: Vec<String>,
    confidence_threshold: f32,
}

impl Responder {
    /// Build a responder from its model clients and selection parameters.
    pub fn new(
        qa: Box<dyn QaClient>,
        summarizer: Box<dyn SummarizationClient>,
        summary_triggers: Vec<String>,
        confidence_threshold: f32,
    ) -> Self {
        Self {
            qa,
            summarizer,
            summary_triggers,
            confidence_threshold,
        }
    }

    /// Whether the query text alone forces summarization mode.
    pub fn triggers_summary(&self, query: &str) -> bool {
        let lowered = query.to_lowercase();
        self.summary_triggers
            .iter()
            .any(|trigger| lowered.contains(trigger.as_str()))
    }

    /// Answer `query` over the retrieved chunks.
    pub async fn respond(
        &self,
        query: &str,
        hits: &[ScoredChunk],
    ) -> Result<Answer, ResponderError> {
        let context = concat_context(hits);
        let sources = collect_sources(hits);

        if self.triggers_summary(query) {
            tracing::debug!(query, "Summary trigger matched");
            return self.summarize(&context, sources).await;
        }

        let span = self
            .qa
            .answer_span(query, &context)
            .await
            .map_err(ResponderError::Qa)?;

        if span.confidence < self.confidence_threshold {
            tracing::debug!(
                confidence = span.confidence,
                threshold = self.confidence_threshold,
                "QA confidence below threshold; switching to summarization"
            );
            return self.summarize(&context, sources).await;
        }

        Ok(Answer {
            text: span.answer,
            mode: Mode::Extract,
            confidence: Some(span.confidence),
            sources,
        })
    }

    async fn summarize(
        &self,
        context: &str,
        sources: Vec<String>,
    ) -> Result<Answer, ResponderError> {
        let summary = self
            .summarizer
            .summarize(context)
            .await
            .map_err(ResponderError::Summarization)?;

        Ok(Answer {
            text: summary,
            mode: Mode::Summarize,
            confidence: None,
            sources,
        })
    }
}

/// Concatenate retrieved chunk texts into the model context window.
fn concat_context(hits: &[ScoredChunk]) -> String {
    let texts: Vec<&str> = hits.iter().map(|hit| hit.chunk.text.as_str()).collect();
    texts.join(" ")
}

/// Deduplicated source document identifiers, keeping first-retrieved order.
fn collect_sources(hits: &[ScoredChunk]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut sources = Vec::new();
    for hit in hits {
        if seen.insert(hit.chunk.doc_id.as_str()) {
            sources.push(hit.chunk.doc_id.clone());
        }
    }
    sources
}

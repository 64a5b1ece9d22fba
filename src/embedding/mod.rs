//! Embedding client abstraction and adapters.
//!
//! The pipeline treats embedding as a pure function from text to a fixed-length vector,
//! deterministic for identical input. Two adapters exist: a deterministic in-process hash
//! embedder for offline use and tests, and an HTTP client for a local Ollama runtime. Every
//! network call carries a bounded timeout so a stuck provider cannot stall the pipeline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::{EmbeddingProvider, get_config};

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unreachable or the request timed out.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, preserving input order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;

    /// Embed a single text, typically a query.
    async fn embed_one(&self, text: String) -> Result<Vec<f32>, EmbeddingClientError> {
        let mut vectors = self.embed(vec![text]).await?;
        if vectors.len() != 1 {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected exactly one vector for a single input, got {}",
                vectors.len()
            )));
        }
        Ok(vectors.remove(0))
    }
}

/// Deterministic embedding client that hashes bytes into a normalized vector.
pub struct HashEmbeddingClient {
    dimension: usize,
}

impl HashEmbeddingClient {
    /// Construct a hash embedder producing vectors of the given dimensionality.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            // Basic hashing of content into the vector slot
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        Ok(texts
            .into_iter()
            .map(|text| Self::encode(&text, self.dimension))
            .collect())
    }
}

/// Embedding client backed by a local Ollama runtime.
pub struct OllamaEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbeddingClient {
    /// Construct a client targeting `base_url` with a per-request timeout.
    pub fn new(base_url: String, model: String, timeout: Duration) -> Self {
        let http = Client::builder()
            .user_agent("docqa/embed")
            .timeout(timeout)
            .build()
            .expect("Failed to construct reqwest::Client for embeddings");
        Self {
            http,
            base_url,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        let expected = texts.len();
        tracing::debug!(model = %self.model, texts = expected, "Requesting embeddings");

        let payload = json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(EmbeddingClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaEmbedResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if body.embeddings.len() != expected {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected {expected} vectors, got {}",
                body.embeddings.len()
            )));
        }

        Ok(body.embeddings)
    }
}

/// Build an embedding client suitable for the current configuration.
pub fn get_embedding_client() -> Box<dyn EmbeddingClient> {
    let config = get_config();
    match config.embedding_provider {
        EmbeddingProvider::Hash => Box::new(HashEmbeddingClient::new(config.embedding_dimension)),
        EmbeddingProvider::Ollama => {
            let base_url = config
                .ollama_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            Box::new(OllamaEmbeddingClient::new(
                base_url,
                config.embedding_model.clone(),
                Duration::from_secs(config.model_timeout_secs),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn hash_client_is_deterministic_and_normalized() {
        let client = HashEmbeddingClient::new(16);
        let first = client.embed(vec!["hello world".into()]).await.expect("ok");
        let second = client.embed(vec!["hello world".into()]).await.expect("ok");
        assert_eq!(first, second);

        let norm: f32 = first[0].iter().map(|value| value * value).sum::<f32>();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn embed_one_rejects_a_multi_vector_response() {
        // Misbehaving backend that ignores the input count.
        struct ChattyClient;

        #[async_trait]
        impl EmbeddingClient for ChattyClient {
            async fn embed(
                &self,
                _texts: Vec<String>,
            ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
                Ok(vec![vec![1.0, 0.0], vec![0.0, 1.0]])
            }
        }

        let error = ChattyClient.embed_one("query".into()).await.unwrap_err();
        assert!(matches!(error, EmbeddingClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn hash_client_rejects_empty_batches() {
        let client = HashEmbeddingClient::new(16);
        let error = client.embed(Vec::new()).await.unwrap_err();
        assert!(matches!(error, EmbeddingClientError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn ollama_client_parses_batch_response() {
        let server = MockServer::start_async().await;
        let client = OllamaEmbeddingClient::new(
            server.base_url(),
            "nomic-embed-text".into(),
            Duration::from_secs(5),
        );

        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(json!({
                    "embeddings": [[0.1, 0.2], [0.3, 0.4]]
                }));
            })
            .await;

        let vectors = client
            .embed(vec!["first".into(), "second".into()])
            .await
            .expect("embeddings");

        mock.assert();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn ollama_client_flags_vector_count_mismatch() {
        let server = MockServer::start_async().await;
        let client = OllamaEmbeddingClient::new(
            server.base_url(),
            "nomic-embed-text".into(),
            Duration::from_secs(5),
        );

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(json!({ "embeddings": [[0.1]] }));
            })
            .await;

        let error = client
            .embed(vec!["first".into(), "second".into()])
            .await
            .unwrap_err();
        assert!(matches!(error, EmbeddingClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn ollama_client_surfaces_error_status() {
        let server = MockServer::start_async().await;
        let client = OllamaEmbeddingClient::new(
            server.base_url(),
            "nomic-embed-text".into(),
            Duration::from_secs(5),
        );

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(500).body("boom");
            })
            .await;

        let error = client.embed(vec!["first".into()]).await.unwrap_err();
        assert!(matches!(error, EmbeddingClientError::GenerationFailed(_)));
    }
}

//! HTTP adapters for the extractive QA and summarization models.
//!
//! Both clients issue JSON requests to local inference runtimes and carry a bounded request
//! timeout, so a stuck model call fails the query instead of blocking the pipeline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{ModelClientError, QaClient, QaSpan, SummarizationClient};
use crate::config::get_config;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_QA_SERVICE_URL: &str = "http://127.0.0.1:8500";

/// Extractive QA client speaking the question-answering inference protocol:
/// `POST /qa` with `{model, question, context}` returning `{answer, score}`.
pub struct HttpQaClient {
    http: Client,
    base_url: String,
    model: String,
}

impl HttpQaClient {
    /// Construct a client targeting `base_url` with a per-request timeout.
    pub fn new(base_url: String, model: String, timeout: Duration) -> Self {
        let http = Client::builder()
            .user_agent("docqa/qa")
            .timeout(timeout)
            .build()
            .expect("Failed to construct reqwest::Client for QA");
        Self {
            http,
            base_url,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/qa", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct QaResponse {
    answer: String,
    score: f32,
}

#[async_trait]
impl QaClient for HttpQaClient {
    async fn answer_span(
        &self,
        question: &str,
        context: &str,
    ) -> Result<QaSpan, ModelClientError> {
        let payload = json!({
            "model": self.model,
            "question": question,
            "context": context,
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                ModelClientError::ProviderUnavailable(format!(
                    "failed to reach QA service at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ModelClientError::ProviderUnavailable(format!(
                "QA endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelClientError::GenerationFailed(format!(
                "QA service returned {status}: {body}"
            )));
        }

        let body: QaResponse = response.json().await.map_err(|error| {
            ModelClientError::InvalidResponse(format!("failed to decode QA response: {error}"))
        })?;

        if !(0.0..=1.0).contains(&body.score) {
            return Err(ModelClientError::InvalidResponse(format!(
                "confidence {} outside [0, 1]",
                body.score
            )));
        }

        Ok(QaSpan {
            answer: body.answer.trim().to_string(),
            confidence: body.score,
        })
    }
}

/// Summarization client backed by a local Ollama runtime.
pub struct OllamaSummarizationClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaSummarizationClient {
    /// Construct a client targeting `base_url` with a per-request timeout.
    pub fn new(base_url: String, model: String, timeout: Duration) -> Self {
        let http = Client::builder()
            .user_agent("docqa/summary")
            .timeout(timeout)
            .build()
            .expect("Failed to construct reqwest::Client for summarization");
        Self {
            http,
            base_url,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl SummarizationClient for OllamaSummarizationClient {
    async fn summarize(&self, text: &str) -> Result<String, ModelClientError> {
        let prompt =
            format!("Summarize the following passages in one short paragraph:\n\n{text}");
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                // Lower temperature for deterministic summaries.
                "temperature": 0.1,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                ModelClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ModelClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            ModelClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(ModelClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}

/// Build the extractive QA client from configuration.
pub fn get_qa_client() -> Box<dyn QaClient> {
    let config = get_config();
    let base_url = config
        .qa_service_url
        .clone()
        .unwrap_or_else(|| DEFAULT_QA_SERVICE_URL.to_string());
    Box::new(HttpQaClient::new(
        base_url,
        config.qa_model.clone(),
        Duration::from_secs(config.model_timeout_secs),
    ))
}

/// Build the summarization client from configuration.
pub fn get_summarizer_client() -> Box<dyn SummarizationClient> {
    let config = get_config();
    let base_url = config
        .ollama_url
        .clone()
        .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
    Box::new(OllamaSummarizationClient::new(
        base_url,
        config.summarizer_model.clone(),
        Duration::from_secs(config.model_timeout_secs),
    ))
}

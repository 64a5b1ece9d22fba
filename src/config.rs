use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Chunking parameters describe an impossible window.
    #[error(
        "Invalid chunking parameters: overlap ({overlap}) must be smaller than max chunk size ({max_chars})"
    )]
    InvalidChunking {
        /// Configured maximum chunk size in characters.
        max_chars: usize,
        /// Configured overlap between consecutive chunks in characters.
        overlap: usize,
    },
}

/// Runtime configuration for the document QA server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Folder scanned for source documents at startup (`DOCS_DIR`).
    pub docs_dir: Option<String>,
    /// Maximum chunk length in characters (`CHUNK_MAX_CHARS`).
    pub chunk_max_chars: usize,
    /// Character overlap shared by consecutive chunks (`CHUNK_OVERLAP`).
    pub chunk_overlap: usize,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Similarity metric fixed at index construction.
    pub similarity_metric: SimilarityMetric,
    /// Base URL of the Ollama runtime serving embeddings and summaries.
    pub ollama_url: Option<String>,
    /// Base URL of the extractive QA service (`QA_SERVICE_URL`).
    pub qa_service_url: Option<String>,
    /// Extractive QA model identifier.
    pub qa_model: String,
    /// Summarization model identifier.
    pub summarizer_model: String,
    /// Number of chunks retrieved per query (`RETRIEVAL_TOP_K`).
    pub retrieval_top_k: usize,
    /// QA confidence below which the responder switches to summarization.
    pub qa_confidence_threshold: f32,
    /// Lowercased query substrings that force summarization mode.
    pub summary_triggers: Vec<String>,
    /// Upper bound on any single external model call, in seconds.
    pub model_timeout_secs: u64,
    /// Concurrent embedding requests issued during corpus build.
    pub embed_concurrency: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the pipeline.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic in-process byte-hash embedder (no external runtime).
    Hash,
    /// Local Ollama runtime.
    Ollama,
}

/// Vector distance used by the nearest-neighbor index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Cosine similarity over normalized vectors.
    Cosine,
    /// Euclidean (L2) distance, reported as a negated similarity score.
    Euclidean,
}

const DEFAULT_CHUNK_MAX_CHARS: usize = 1000;
const DEFAULT_CHUNK_OVERLAP: usize = 200;
const DEFAULT_RETRIEVAL_TOP_K: usize = 4;
const DEFAULT_QA_CONFIDENCE_THRESHOLD: f32 = 0.3;
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EMBED_CONCURRENCY: usize = 4;
const DEFAULT_SUMMARY_TRIGGERS: &[&str] =
    &["summarize", "summarise", "summary", "explain", "overview"];

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            docs_dir: load_env_optional("DOCS_DIR"),
            chunk_max_chars: load_env_parsed("CHUNK_MAX_CHARS", DEFAULT_CHUNK_MAX_CHARS)?,
            chunk_overlap: load_env_parsed("CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?,
            embedding_provider: load_env("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            similarity_metric: load_env_optional("SIMILARITY_METRIC")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("SIMILARITY_METRIC".to_string()))
                })
                .transpose()?
                .unwrap_or(SimilarityMetric::Cosine),
            ollama_url: load_env_optional("OLLAMA_URL"),
            qa_service_url: load_env_optional("QA_SERVICE_URL"),
            qa_model: load_env_or("QA_MODEL", "roberta-base-squad2"),
            summarizer_model: load_env_or("SUMMARIZER_MODEL", "distilbart-cnn-12-6"),
            retrieval_top_k: load_env_parsed("RETRIEVAL_TOP_K", DEFAULT_RETRIEVAL_TOP_K)?,
            qa_confidence_threshold: load_env_parsed(
                "QA_CONFIDENCE_THRESHOLD",
                DEFAULT_QA_CONFIDENCE_THRESHOLD,
            )?,
            summary_triggers: load_env_optional("SUMMARY_TRIGGERS")
                .map(|raw| {
                    raw.split(',')
                        .map(|token| token.trim().to_lowercase())
                        .filter(|token| !token.is_empty())
                        .collect()
                })
                .unwrap_or_else(default_summary_triggers),
            model_timeout_secs: load_env_parsed("MODEL_TIMEOUT_SECS", DEFAULT_MODEL_TIMEOUT_SECS)?,
            embed_concurrency: load_env_parsed("EMBED_CONCURRENCY", DEFAULT_EMBED_CONCURRENCY)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        };

        validate_chunking(config.chunk_max_chars, config.chunk_overlap)?;
        Ok(config)
    }
}

/// Reject chunk windows that cannot make forward progress.
///
/// A zero-size window produces nothing, and an overlap that reaches the window
/// size would re-emit the same span forever.
pub fn validate_chunking(max_chars: usize, overlap: usize) -> Result<(), ConfigError> {
    if max_chars == 0 || overlap >= max_chars {
        return Err(ConfigError::InvalidChunking { max_chars, overlap });
    }
    Ok(())
}

fn default_summary_triggers() -> Vec<String> {
    DEFAULT_SUMMARY_TRIGGERS
        .iter()
        .map(|trigger| (*trigger).to_string())
        .collect()
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|parsed| parsed.unwrap_or(default))
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hash" => Ok(Self::Hash),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for SimilarityMetric {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        docs_dir = ?config.docs_dir,
        chunk_max_chars = config.chunk_max_chars,
        chunk_overlap = config.chunk_overlap,
        embedding_provider = ?config.embedding_provider,
        retrieval_top_k = config.retrieval_top_k,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_chunking_rejects_zero_window() {
        let error = validate_chunking(0, 0).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::InvalidChunking {
                max_chars: 0,
                overlap: 0
            }
        ));
    }

    #[test]
    fn validate_chunking_rejects_overlap_at_window_size() {
        assert!(validate_chunking(200, 200).is_err());
        assert!(validate_chunking(200, 500).is_err());
    }

    #[test]
    fn validate_chunking_accepts_smaller_overlap() {
        assert!(validate_chunking(1000, 200).is_ok());
        assert!(validate_chunking(1, 0).is_ok());
    }

    #[test]
    fn provider_and_metric_parse_case_insensitively() {
        assert!(matches!(
            "OLLAMA".parse::<EmbeddingProvider>(),
            Ok(EmbeddingProvider::Ollama)
        ));
        assert!(matches!(
            "l2".parse::<SimilarityMetric>(),
            Ok(SimilarityMetric::Euclidean)
        ));
        assert!("faiss".parse::<SimilarityMetric>().is_err());
    }
}

#![deny(missing_docs)]

//! Core library for the Doc QA retrieval-augmented answering server.

/// HTTP routing and REST handlers.
pub mod api;
/// Sliding-window chunking over document text.
pub mod chunking;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// In-process nearest-neighbor index over chunk embeddings.
pub mod index;
/// Document ingestion and text extraction.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Pipeline orchestration and the `answer` entry point.
pub mod pipeline;
/// Mode selection and external model clients.
pub mod responder;

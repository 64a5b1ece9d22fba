//! Pipeline orchestration: ingest, chunk, embed, index, and answer.

mod service;
mod types;

pub use service::{PipelineApi, PipelineParams, PipelineService};
pub use types::{AnswerError, BuildError, BuildOutcome};

//! Error taxonomy shared across the pipeline.
//!
//! Every stage surfaces its failure as a distinct [`PipelineError`] variant so
//! a failed request always identifies which stage broke. There is no silent
//! partial success: the orchestrator either returns a complete
//! [`crate::pipeline::ScrapeOutcome`] or one of these errors.

use thiserror::Error;

/// Errors produced by the scrape-and-extract pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Loading the source page failed (network error, bad status, timeout).
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// Fetching or parsing a single PDF failed.
    #[error("pdf extraction failed for {url}: {message}")]
    PdfExtraction { url: String, message: String },

    /// A single embedding API call failed (after bounded retries).
    #[error("embedding request failed: {0}")]
    EmbeddingRequest(String),

    /// Embedding generation failed; `batch` is the zero-based index of the
    /// failing batch within the chunk sequence.
    #[error("embedding generation failed at batch {batch}: {message}")]
    Embedding { batch: usize, message: String },

    /// Vector store upsert/query/clear failure. Not retried.
    #[error("vector store operation failed: {0}")]
    Store(String),

    /// Chat completion call failure.
    #[error("chat completion failed: {0}")]
    Llm(String),

    /// The model's output did not parse into the expected record shape.
    #[error("model output failed validation: {0}")]
    OutputValidation(String),

    /// The fetched document could not be used (no links, unparseable, empty).
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP transport failure outside the navigation/PDF paths.
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}

//! ```text
//! {url, keyword} ──► discovery ──► pdf ──► chunking ──► embeddings
//!                                                           │
//!                      stores::sqlite  ◄── PassageRecords ◄─┘
//!                            │
//!     extraction::retrieval_prompt ──► top-K query ──► llm ──► records
//! ```
//!
//! Single-shot pipeline: crawl a page for keyword-matched PDF links, pull
//! the PDF text, index it as embeddings, then answer a fixed retrieval
//! prompt with an LLM call that emits validated auditor-resignation records.

pub mod chunking;
pub mod config;
pub mod discovery;
pub mod embeddings;
pub mod extraction;
pub mod llm;
pub mod pdf;
pub mod pipeline;
pub mod stores;
pub mod types;

pub use chunking::TextSplitter;
pub use config::ScoutConfig;
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider, OpenAiEmbedder};
pub use extraction::{ExtractedRecord, ExtractionSchema};
pub use llm::{ChatProvider, OpenAiChatClient};
pub use pdf::{PdfTextExtractor, TextExtractor};
pub use pipeline::{PipelineOptions, ScrapeOutcome, ScrapePipeline, ScrapeRequest};
pub use stores::{PassageMatch, PassageRecord, SqlitePassageStore, VectorStore};
pub use types::PipelineError;

//! Vector storage for indexed passages.
//!
//! [`VectorStore`] abstracts the index the pipeline writes to and queries
//! from. Writes are additive: every record carries a freshly generated id,
//! so re-ingesting the same document accumulates duplicates until
//! [`VectorStore::clear`] wipes the index.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::PipelineError;

pub use sqlite::SqlitePassageStore;

/// A chunk of document text paired with its embedding, ready for upsert.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PassageRecord {
    /// Fresh UUID per record; there is no stable identity across runs.
    pub id: String,
    /// URL of the page the source PDFs were discovered on.
    pub source_url: String,
    /// Zero-based index of the chunk within the concatenated document text.
    pub chunk_index: usize,
    /// The chunk text itself; this is what queries hand back downstream.
    pub content: String,
    pub embedding: Vec<f32>,
}

impl PassageRecord {
    pub fn new(
        source_url: impl Into<String>,
        chunk_index: usize,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_url: source_url.into(),
            chunk_index,
            content: content.into(),
            embedding,
        }
    }
}

/// A query hit: passage metadata plus similarity score, no raw vector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PassageMatch {
    pub content: String,
    pub source_url: String,
    pub chunk_index: usize,
    pub score: f32,
}

/// Remote vector index operations. Failures surface as
/// [`PipelineError::Store`]; nothing is retried internally.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts the records. Ids are caller-generated; no atomicity guarantee
    /// across the batch.
    async fn upsert(&self, records: Vec<PassageRecord>) -> Result<(), PipelineError>;

    /// Returns up to `top_k` nearest matches by cosine similarity, most
    /// similar first, with metadata but without vector values.
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<PassageMatch>, PipelineError>;

    /// Deletes every record in the index. Destructive and irreversible;
    /// intended for reset, not the steady-state flow.
    async fn clear(&self) -> Result<(), PipelineError>;

    /// Total number of stored passages.
    async fn count(&self) -> Result<usize, PipelineError>;
}

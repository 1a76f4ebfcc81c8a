//! SQLite-backed vector store using the sqlite-vec extension.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use rig::OneOrMany;
use rig::embeddings::embedding::{Embedding, EmbeddingError, EmbeddingModel};
use rig_sqlite::{Column, ColumnValue, SqliteVectorStore, SqliteVectorStoreTable};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{Connection, ffi};

use super::{PassageMatch, PassageRecord, VectorStore};
use crate::embeddings::hash_to_vec;
use crate::types::PipelineError;

/// Row shape persisted in the `passages` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PassageRow {
    pub id: String,
    pub source_url: String,
    pub chunk_index: usize,
    pub content: String,
}

impl From<PassageRecord> for PassageRow {
    fn from(record: PassageRecord) -> Self {
        Self {
            id: record.id,
            source_url: record.source_url,
            chunk_index: record.chunk_index,
            content: record.content,
        }
    }
}

impl SqliteVectorStoreTable for PassageRow {
    fn name() -> &'static str {
        "passages"
    }

    fn schema() -> Vec<Column> {
        vec![
            Column::new("id", "TEXT PRIMARY KEY"),
            Column::new("source_url", "TEXT").indexed(),
            Column::new("chunk_index", "TEXT"),
            Column::new("content", "TEXT"),
        ]
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn column_values(&self) -> Vec<(&'static str, Box<dyn ColumnValue>)> {
        vec![
            ("id", Box::new(self.id.clone())),
            ("source_url", Box::new(self.source_url.clone())),
            ("chunk_index", Box::new(self.chunk_index.to_string())),
            ("content", Box::new(self.content.clone())),
        ]
    }
}

/// Embedding model handed to rig-sqlite when opening the store.
///
/// It only determines the dimensionality of the `passages_embeddings` vec0
/// table; passage vectors are always supplied precomputed, so its
/// hash-derived output is never persisted by the pipeline.
#[derive(Clone)]
pub struct PassageTableModel {
    dimensions: usize,
}

impl PassageTableModel {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl EmbeddingModel for PassageTableModel {
    const MAX_DOCUMENTS: usize = 500;

    type Client = ();

    fn make(_client: &Self::Client, _model: impl Into<String>, dims: Option<usize>) -> Self {
        Self {
            dimensions: dims.unwrap_or_default(),
        }
    }

    fn ndims(&self) -> usize {
        self.dimensions
    }

    fn embed_texts(
        &self,
        texts: impl IntoIterator<Item = String> + Send,
    ) -> impl std::future::Future<Output = Result<Vec<Embedding>, EmbeddingError>> + Send {
        let dimensions = self.dimensions;
        let documents: Vec<String> = texts.into_iter().collect();
        async move {
            Ok(documents
                .into_iter()
                .map(|document| Embedding {
                    vec: hash_to_vec(&document, dimensions)
                        .into_iter()
                        .map(f64::from)
                        .collect(),
                    document,
                })
                .collect())
        }
    }
}

/// Vector index persisted in a SQLite database file.
#[derive(Clone)]
pub struct SqlitePassageStore<E>
where
    E: EmbeddingModel + 'static,
{
    inner: SqliteVectorStore<E, PassageRow>,
    /// Separate handle for raw SQL not covered by rig-sqlite; clone of the
    /// connection used by the inner store.
    conn: Connection,
}

impl<E> SqlitePassageStore<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    /// Opens (or creates) the database at `path` and prepares the passage
    /// tables for the model's dimensionality.
    pub async fn open(path: impl AsRef<Path>, model: &E) -> Result<Self, PipelineError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| PipelineError::Store(err.to_string()))?;
        conn.call(|conn| {
            let result = conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0));
            match result {
                Ok(_) => Ok(()),
                Err(err) => Err(tokio_rusqlite::Error::Rusqlite(err)),
            }
        })
        .await
        .map_err(|err| PipelineError::Store(err.to_string()))?;

        let conn_for_queries = conn.clone();
        let store = SqliteVectorStore::new(conn, model)
            .await
            .map_err(|err| PipelineError::Store(err.to_string()))?;
        Ok(Self {
            inner: store,
            conn: conn_for_queries,
        })
    }

    fn register_sqlite_vec() -> Result<(), PipelineError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(PipelineError::Store)
    }
}

#[async_trait::async_trait]
impl<E> VectorStore for SqlitePassageStore<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    async fn upsert(&self, records: Vec<PassageRecord>) -> Result<(), PipelineError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let vec: Vec<f64> = record.embedding.iter().copied().map(f64::from).collect();
            let embedding = Embedding {
                document: record.content.clone(),
                vec,
            };
            rows.push((PassageRow::from(record), OneOrMany::one(embedding)));
        }
        self.inner
            .add_rows(rows)
            .await
            .map_err(|err| PipelineError::Store(err.to_string()))?;
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<PassageMatch>, PipelineError> {
        let embedding_json = serde_json::to_string(embedding)
            .map_err(|err| PipelineError::Store(err.to_string()))?;

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT p.content, p.source_url, p.chunk_index, \
                         vec_distance_cosine(e.embedding, vec_f32(?)) as distance \
                         FROM passages p \
                         JOIN passages_embeddings e ON p.rowid = e.rowid \
                         ORDER BY distance ASC \
                         LIMIT {}",
                        top_k
                    ))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let rows = stmt
                    .query_map([&embedding_json], |row| {
                        let distance: f32 = row.get(3)?;
                        Ok(PassageMatch {
                            content: row.get(0)?,
                            source_url: row.get(1)?,
                            chunk_index: row.get::<_, String>(2)?.parse().unwrap_or(0),
                            // cosine distance in [0, 2]; report similarity
                            score: 1.0 - distance,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut matches = Vec::new();
                for row in rows {
                    matches.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(matches)
            })
            .await
            .map_err(|err| PipelineError::Store(err.to_string()))
    }

    async fn clear(&self) -> Result<(), PipelineError> {
        self.conn
            .call(|conn| {
                conn.execute("DELETE FROM passages", [])
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                conn.execute("DELETE FROM passages_embeddings", [])
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| PipelineError::Store(err.to_string()))
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM passages", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| PipelineError::Store(err.to_string()))
    }
}

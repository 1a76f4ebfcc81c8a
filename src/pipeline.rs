//! End-to-end orchestration of one scrape-and-extract request.
//!
//! ```text
//! page ──► discovery ──► pdf text (bounded concurrent) ──► chunking
//!                                                              │
//!                       vector store ◄── embeddings (batched) ◄┘
//!                            │
//!        retrieval prompt ──►│ top-K query
//!                            ▼
//!               chat completion ──► validated records
//! ```
//!
//! All provider clients are injected; the pipeline owns no global state.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use tracing::{info, warn};
use url::Url;

use crate::chunking::TextSplitter;
use crate::discovery;
use crate::embeddings::{EmbeddingProvider, embed_chunks, embed_query};
use crate::extraction::{ExtractedRecord, ExtractionSchema, parse_records};
use crate::llm::ChatProvider;
use crate::pdf::TextExtractor;
use crate::stores::{PassageRecord, VectorStore};
use crate::types::PipelineError;

/// One scrape request: the page to crawl and the anchor-text keyword.
#[derive(Clone, Debug)]
pub struct ScrapeRequest {
    pub url: Url,
    pub keyword: String,
}

/// Result of a completed request.
///
/// `failed_links` lists PDFs that were skipped after fetch/parse failures;
/// a non-empty list never masquerades as a fully clean run.
#[derive(Clone, Debug, Default)]
pub struct ScrapeOutcome {
    pub records: Vec<ExtractedRecord>,
    /// The model's raw text output, before validation.
    pub raw_response: String,
    pub links_discovered: usize,
    pub documents_extracted: usize,
    pub failed_links: Vec<(Url, String)>,
    pub chunks_indexed: usize,
}

/// Tuning knobs for one pipeline instance.
#[derive(Clone, Copy, Debug)]
pub struct PipelineOptions {
    /// Maximum texts per embedding API call.
    pub embed_batch_size: usize,
    /// Matches requested from the vector store.
    pub top_k: usize,
    /// Concurrent PDF fetch/parse workers.
    pub pdf_concurrency: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            embed_batch_size: 500,
            top_k: 10,
            pdf_concurrency: 4,
        }
    }
}

/// Drives the full document-to-structured-record pipeline.
pub struct ScrapePipeline {
    http: reqwest::Client,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chat: Arc<dyn ChatProvider>,
    splitter: TextSplitter,
    schema: ExtractionSchema,
    options: PipelineOptions,
}

impl ScrapePipeline {
    pub fn new(
        http: reqwest::Client,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        chat: Arc<dyn ChatProvider>,
        splitter: TextSplitter,
    ) -> Self {
        Self {
            http,
            extractor,
            embedder,
            store,
            chat,
            splitter,
            schema: ExtractionSchema::auditor_resignations(),
            options: PipelineOptions::default(),
        }
    }

    /// Replaces the extraction schema (prompts + one-shot example).
    #[must_use]
    pub fn with_schema(mut self, schema: ExtractionSchema) -> Self {
        self.schema = schema;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs one request to completion.
    ///
    /// Zero discovered links short-circuits to an empty outcome. Individual
    /// PDF failures are skipped and reported in the outcome; the request
    /// fails only when no document text survives.
    pub async fn run(&self, request: &ScrapeRequest) -> Result<ScrapeOutcome, PipelineError> {
        let links =
            discovery::discover_pdf_links(&self.http, &request.url, &request.keyword).await?;
        info!(url = %request.url, keyword = %request.keyword, links = links.len(), "discovered pdf links");

        if links.is_empty() {
            return Ok(ScrapeOutcome::default());
        }
        let links_discovered = links.len();

        let (text, documents_extracted, failed_links) = self.harvest_documents(links).await?;

        let chunks = self.splitter.split_to_vec(&text);
        info!(chunks = chunks.len(), chars = text.len(), "chunked document text");
        if chunks.is_empty() {
            // Nothing to index. With failed links in play the harvest may
            // have dropped the only document that mattered, so treat empty
            // text plus failures as a failed request rather than a quiet
            // empty outcome.
            if !failed_links.is_empty() {
                return Err(PipelineError::InvalidDocument(format!(
                    "no pdf text extracted; {} of {links_discovered} links failed",
                    failed_links.len()
                )));
            }
            return Ok(ScrapeOutcome {
                links_discovered,
                documents_extracted,
                failed_links,
                ..ScrapeOutcome::default()
            });
        }

        let vectors = embed_chunks(
            self.embedder.as_ref(),
            &chunks,
            self.options.embed_batch_size,
        )
        .await?;

        let records: Vec<PassageRecord> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (chunk, embedding))| {
                PassageRecord::new(request.url.as_str(), index, chunk.clone(), embedding)
            })
            .collect();
        let chunks_indexed = records.len();
        self.store.upsert(records).await?;
        info!(chunks_indexed, "upserted passage records");

        let query_vector = embed_query(self.embedder.as_ref(), &self.schema.retrieval_prompt).await?;
        let matches = self.store.query(&query_vector, self.options.top_k).await?;
        info!(matches = matches.len(), top_k = self.options.top_k, "queried vector store");

        let passages: Vec<String> = matches.into_iter().map(|hit| hit.content).collect();
        let prompt = self.schema.extraction_prompt(&passages);
        let raw_response = self.chat.complete(&self.schema.system_prompt, &prompt).await?;
        let extracted = parse_records(&raw_response)?;
        info!(records = extracted.len(), "extraction complete");

        Ok(ScrapeOutcome {
            records: extracted,
            raw_response,
            links_discovered,
            documents_extracted,
            failed_links,
            chunks_indexed,
        })
    }

    /// Clears the vector store.
    pub async fn reset(&self) -> Result<(), PipelineError> {
        self.store.clear().await
    }

    /// Fetches and parses every PDF with a bounded worker pool, concatenating
    /// texts in discovery order. Per-link failures are collected, not fatal,
    /// unless nothing survives.
    async fn harvest_documents(
        &self,
        links: Vec<Url>,
    ) -> Result<(String, usize, Vec<(Url, String)>), PipelineError> {
        let total = links.len();
        let results: Vec<(Url, Result<String, PipelineError>)> =
            stream::iter(links.into_iter().map(|link| {
                let extractor = Arc::clone(&self.extractor);
                async move {
                    let text = extractor.extract(&link).await;
                    (link, text)
                }
            }))
            .buffered(self.options.pdf_concurrency.max(1))
            .collect()
            .await;

        let mut text = String::new();
        let mut documents_extracted = 0usize;
        let mut failed_links = Vec::new();
        for (link, result) in results {
            match result {
                Ok(extracted) => {
                    documents_extracted += 1;
                    text.push_str(&extracted);
                }
                Err(err) => {
                    warn!(url = %link, error = %err, "skipping failed pdf link");
                    failed_links.push((link, err.to_string()));
                }
            }
        }

        if documents_extracted == 0 {
            return Err(PipelineError::InvalidDocument(format!(
                "no pdf text extracted; all {total} links failed"
            )));
        }

        Ok((text, documents_extracted, failed_links))
    }
}

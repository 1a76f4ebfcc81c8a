//! Environment-driven configuration for the real provider clients.

use std::env;
use std::path::PathBuf;

use crate::types::PipelineError;

/// Settings consumed by the CLI and anyone wiring real providers.
///
/// Everything except the API key has a default matching the reference
/// behavior: `text-embedding-ada-002` (1536 dims) in batches of 500,
/// 2000/200 chunking, top-10 retrieval, `gpt-4` at temperature 0.
#[derive(Clone, Debug)]
pub struct ScoutConfig {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub embed_model: String,
    pub embed_dimensions: usize,
    pub chat_model: String,
    pub db_path: PathBuf,
    pub chunk_chars: usize,
    pub chunk_overlap: usize,
    pub embed_batch_size: usize,
    pub top_k: usize,
    pub pdf_concurrency: usize,
    pub max_retries: usize,
}

impl ScoutConfig {
    /// Loads configuration from the environment.
    ///
    /// `OPENAI_API_KEY` is required; all `AUDITSCOUT_*` variables fall back
    /// to defaults when unset.
    pub fn from_env() -> Result<Self, PipelineError> {
        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| PipelineError::Config("OPENAI_API_KEY is not set".to_string()))?;

        Ok(Self {
            openai_api_key,
            openai_base_url: env_or("AUDITSCOUT_OPENAI_BASE_URL", "https://api.openai.com/v1"),
            embed_model: env_or("AUDITSCOUT_EMBED_MODEL", "text-embedding-ada-002"),
            embed_dimensions: env_usize("AUDITSCOUT_EMBED_DIMENSIONS", 1536)?,
            chat_model: env_or("AUDITSCOUT_CHAT_MODEL", "gpt-4"),
            db_path: PathBuf::from(env_or("AUDITSCOUT_DB", "./auditscout.sqlite")),
            chunk_chars: env_usize("AUDITSCOUT_CHUNK_CHARS", 2000)?,
            chunk_overlap: env_usize("AUDITSCOUT_CHUNK_OVERLAP", 200)?,
            embed_batch_size: env_usize("AUDITSCOUT_EMBED_BATCH", 500)?,
            top_k: env_usize("AUDITSCOUT_TOP_K", 10)?,
            pdf_concurrency: env_usize("AUDITSCOUT_PDF_CONCURRENCY", 4)?,
            max_retries: env_usize("AUDITSCOUT_MAX_RETRIES", 3)?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_usize(key: &str, default: usize) -> Result<usize, PipelineError> {
    match env::var(key) {
        Ok(value) => value
            .parse::<usize>()
            .map_err(|err| PipelineError::Config(format!("{key} must be an integer: {err}"))),
        Err(_) => Ok(default),
    }
}

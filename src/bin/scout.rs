//! CLI caller for the scrape pipeline.
//!
//! ```bash
//! OPENAI_API_KEY=... scout https://exchange.example.com/news resignation
//! scout --reset
//! ```

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::FmtSubscriber;
use url::Url;

use auditscout::chunking::TextSplitter;
use auditscout::config::ScoutConfig;
use auditscout::embeddings::OpenAiEmbedder;
use auditscout::llm::OpenAiChatClient;
use auditscout::pdf::PdfTextExtractor;
use auditscout::pipeline::{PipelineOptions, ScrapePipeline, ScrapeRequest};
use auditscout::stores::VectorStore;
use auditscout::stores::sqlite::{PassageTableModel, SqlitePassageStore};
use auditscout::types::PipelineError;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), PipelineError> {
    let args: Vec<String> = env::args().skip(1).collect();
    let config = ScoutConfig::from_env()?;

    let table_model = PassageTableModel::new(config.embed_dimensions);
    let store = Arc::new(SqlitePassageStore::open(&config.db_path, &table_model).await?);

    if args.first().map(String::as_str) == Some("--reset") {
        store.clear().await?;
        println!("vector store cleared");
        return Ok(());
    }

    let [url, keyword] = args.as_slice() else {
        return Err(PipelineError::Config(
            "usage: scout <url> <keyword> | scout --reset".to_string(),
        ));
    };
    let url = Url::parse(url)
        .map_err(|err| PipelineError::Config(format!("invalid url '{url}': {err}")))?;

    let http = reqwest::Client::builder()
        .user_agent("auditscout/0.1")
        .use_rustls_tls()
        .build()?;

    let embedder = OpenAiEmbedder::new(
        &config.openai_api_key,
        &config.openai_base_url,
        config.embed_model.clone(),
        config.embed_dimensions,
        config.max_retries,
    )?;
    let chat = OpenAiChatClient::new(
        &config.openai_api_key,
        &config.openai_base_url,
        config.chat_model.clone(),
    )?;
    let splitter = TextSplitter::new(config.chunk_chars, config.chunk_overlap)?;

    let pipeline = ScrapePipeline::new(
        http.clone(),
        Arc::new(PdfTextExtractor::new(http)),
        Arc::new(embedder),
        store,
        Arc::new(chat),
        splitter,
    )
    .with_options(PipelineOptions {
        embed_batch_size: config.embed_batch_size,
        top_k: config.top_k,
        pdf_concurrency: config.pdf_concurrency,
    });

    let outcome = pipeline
        .run(&ScrapeRequest {
            url,
            keyword: keyword.clone(),
        })
        .await?;

    println!("{}", outcome.raw_response);
    println!();
    println!("links discovered   : {}", outcome.links_discovered);
    println!("documents extracted: {}", outcome.documents_extracted);
    println!("chunks indexed     : {}", outcome.chunks_indexed);
    println!("records parsed     : {}", outcome.records.len());
    for (link, reason) in &outcome.failed_links {
        println!("skipped {link}: {reason}");
    }

    Ok(())
}

fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            env::var("RUST_LOG").unwrap_or_else(|_| "auditscout=info,scout=info".to_string()),
        )
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

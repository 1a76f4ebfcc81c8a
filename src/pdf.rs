//! In-memory PDF text extraction.
//!
//! PDFs are fetched as bytes and parsed without ever touching the
//! filesystem. The [`TextExtractor`] trait is the seam the orchestrator is
//! tested through; [`PdfTextExtractor`] is the real implementation.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use crate::types::PipelineError;

/// Extracts plain text from the document behind a URL.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Returns the document's text, or an empty string when the parse yields
    /// no content. Fetch failures and corrupt payloads fail with
    /// [`PipelineError::PdfExtraction`] carrying the cause.
    async fn extract(&self, url: &Url) -> Result<String, PipelineError>;
}

/// Fetches PDFs over HTTP and parses them with `pdf-extract`.
#[derive(Clone)]
pub struct PdfTextExtractor {
    client: Client,
}

impl PdfTextExtractor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Returns true if the content type or leading bytes identify a PDF.
pub fn looks_like_pdf(content_type: Option<&str>, head: &[u8]) -> bool {
    let ct = content_type.unwrap_or("").to_ascii_lowercase();
    ct.contains("application/pdf") || head.starts_with(b"%PDF-")
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, url: &Url) -> Result<String, PipelineError> {
        let fail = |message: String| PipelineError::PdfExtraction {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| fail(err.to_string()))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let bytes = response.bytes().await.map_err(|err| fail(err.to_string()))?;
        if !looks_like_pdf(content_type.as_deref(), &bytes) {
            return Err(fail("payload is not a PDF".to_string()));
        }

        debug!(%url, bytes = bytes.len(), "parsing pdf in memory");

        // pdf-extract is CPU-bound; keep it off the async workers.
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|err| fail(err.to_string()))?
            .map_err(|err| fail(err.to_string()))?;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_identify_pdfs() {
        assert!(looks_like_pdf(None, b"%PDF-1.7 ..."));
        assert!(looks_like_pdf(Some("application/pdf"), b""));
        assert!(looks_like_pdf(Some("Application/PDF; charset=binary"), b""));
        assert!(!looks_like_pdf(Some("text/html"), b"<html>"));
        assert!(!looks_like_pdf(None, b"plain text"));
    }

    #[tokio::test]
    async fn non_pdf_payload_fails_extraction() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET).path("/fake.pdf");
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<html>not a pdf</html>");
            })
            .await;

        let extractor = PdfTextExtractor::new(Client::new());
        let url = Url::parse(&server.url("/fake.pdf")).unwrap();
        let err = extractor.extract(&url).await.unwrap_err();
        assert!(matches!(err, PipelineError::PdfExtraction { .. }));
    }

    #[tokio::test]
    async fn corrupt_pdf_payload_carries_the_url() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET).path("/broken.pdf");
                then.status(200)
                    .header("content-type", "application/pdf")
                    .body("%PDF-1.4 truncated garbage");
            })
            .await;

        let extractor = PdfTextExtractor::new(Client::new());
        let url = Url::parse(&server.url("/broken.pdf")).unwrap();
        match extractor.extract(&url).await {
            Err(PipelineError::PdfExtraction { url: failed, .. }) => {
                assert!(failed.ends_with("/broken.pdf"));
            }
            other => panic!("expected PdfExtraction error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_failure_is_a_pdf_extraction_error() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET).path("/gone.pdf");
                then.status(500);
            })
            .await;

        let extractor = PdfTextExtractor::new(Client::new());
        let url = Url::parse(&server.url("/gone.pdf")).unwrap();
        let err = extractor.extract(&url).await.unwrap_err();
        assert!(matches!(err, PipelineError::PdfExtraction { .. }));
    }
}

//! PDF link discovery on a source page.
//!
//! The page is fetched over plain HTTP and its DOM is inspected for anchors
//! whose visible text contains the keyword and whose `href` points at a PDF.
//! Relative hrefs are resolved against the page URL before use.

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::types::PipelineError;

/// Fetches the page body behind `url`.
///
/// Any network or status failure maps to [`PipelineError::Navigation`]; there
/// is no retry.
pub async fn fetch_page(client: &Client, url: &Url) -> Result<String, PipelineError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|err| PipelineError::Navigation {
            url: url.to_string(),
            message: err.to_string(),
        })?;

    response.text().await.map_err(|err| PipelineError::Navigation {
        url: url.to_string(),
        message: err.to_string(),
    })
}

/// Collects absolute URLs for anchors matching the keyword and `.pdf` filter.
///
/// An anchor is selected iff its text contains `keyword` (case-insensitive)
/// and its `href` ends with `.pdf` (case-insensitive). Anchors without an
/// `href`, and hrefs that cannot be resolved against `base`, are skipped.
/// Zero matches yields an empty vec.
pub fn collect_pdf_links(
    html: &str,
    base: &Url,
    keyword: &str,
) -> Result<Vec<Url>, PipelineError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a")
        .map_err(|err| PipelineError::InvalidDocument(err.to_string()))?;
    let keyword = keyword.to_lowercase();

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if !href.to_lowercase().ends_with(".pdf") {
            continue;
        }
        let text: String = element.text().collect();
        if !text.to_lowercase().contains(&keyword) {
            continue;
        }
        match base.join(href) {
            Ok(resolved) => links.push(resolved),
            Err(err) => debug!(href, %err, "skipping unresolvable href"),
        }
    }

    Ok(links)
}

/// Fetches `url` and returns the matching PDF links in document order.
pub async fn discover_pdf_links(
    client: &Client,
    url: &Url,
    keyword: &str,
) -> Result<Vec<Url>, PipelineError> {
    let body = fetch_page(client, url).await?;
    collect_pdf_links(&body, url, keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://exchange.example.com/news/").unwrap()
    }

    #[test]
    fn selects_keyword_and_pdf_anchors_only() {
        let html = r#"
            <a href="/docs/a.pdf">Auditor Resignation Notice</a>
            <a href="/docs/b.pdf">Annual Report</a>
            <a href="/docs/c.html">Resignation announcement</a>
        "#;
        let links = collect_pdf_links(html, &base(), "resignation").unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(
            links[0].as_str(),
            "https://exchange.example.com/docs/a.pdf"
        );
    }

    #[test]
    fn keyword_and_extension_match_case_insensitively() {
        let html = r#"
            <a href="/docs/upper.PDF">RESIGNATION of auditor</a>
            <a href="/docs/mixed.Pdf">Notice of Resignation</a>
        "#;
        let links = collect_pdf_links(html, &base(), "Resignation").unwrap();
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn anchors_without_href_are_skipped() {
        let html = r#"
            <a>resignation notice.pdf</a>
            <a href="/docs/real.pdf">resignation filing</a>
        "#;
        let links = collect_pdf_links(html, &base(), "resignation").unwrap();
        assert_eq!(links.len(), 1);
        assert!(links[0].path().ends_with("/docs/real.pdf"));
    }

    #[test]
    fn relative_and_absolute_hrefs_resolve() {
        let html = r#"
            <a href="relative.pdf">resignation</a>
            <a href="https://other.example.com/far.pdf">resignation</a>
        "#;
        let links = collect_pdf_links(html, &base(), "resignation").unwrap();
        assert_eq!(
            links[0].as_str(),
            "https://exchange.example.com/news/relative.pdf"
        );
        assert_eq!(links[1].as_str(), "https://other.example.com/far.pdf");
    }

    #[test]
    fn zero_matches_is_empty_not_error() {
        let links = collect_pdf_links("<p>no anchors here</p>", &base(), "resignation").unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn keyword_matches_nested_anchor_text() {
        let html = r#"<a href="/n.pdf"><span>Auditor</span> <b>resignation</b></a>"#;
        let links = collect_pdf_links(html, &base(), "resignation").unwrap();
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn fetch_page_maps_status_errors_to_navigation() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET).path("/missing");
                then.status(404);
            })
            .await;

        let client = Client::new();
        let url = Url::parse(&server.url("/missing")).unwrap();
        let err = fetch_page(&client, &url).await.unwrap_err();
        assert!(matches!(err, PipelineError::Navigation { .. }));
    }

    #[tokio::test]
    async fn discover_returns_links_in_document_order() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET).path("/news");
                then.status(200).body(
                    r#"<a href="/docs/first.pdf">resignation one</a>
                       <a href="/docs/second.pdf">resignation two</a>"#,
                );
            })
            .await;

        let client = Client::new();
        let url = Url::parse(&server.url("/news")).unwrap();
        let links = discover_pdf_links(&client, &url, "resignation").await.unwrap();
        assert_eq!(links.len(), 2);
        assert!(links[0].path().ends_with("first.pdf"));
        assert!(links[1].path().ends_with("second.pdf"));
    }
}

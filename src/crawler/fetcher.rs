//! HTTP fetcher and page text extraction
//!
//! One GET per URL with a fixed User-Agent and a bounded timeout. Any
//! transport error or non-2xx status is a failure; there is no retry here,
//! since failed URLs go to the failure queue instead.

use async_trait::async_trait;
use lazy_static::lazy_static;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT},
    Client,
};
use scraper::{Html, Selector};
use std::time::Duration;

use super::links::LinkExtractor;
use super::Fetcher;
use crate::config::CrawlerConfig;
use crate::models::FetchedPage;
use crate::utils::error::FetchError;
use crate::utils::normalize_whitespace;

lazy_static! {
    static ref TEXT_BLOCKS: Selector =
        Selector::parse("p, li").expect("Invalid CSS selector: p, li");
}

/// Text of the `p`/`li` elements inside the content container, one
/// non-empty block per line
///
/// # Errors
///
/// Returns `FetchError::ContentNotFound` if the container is missing
pub fn extract_text(document: &Html, container: &Selector) -> Result<String, FetchError> {
    let Some(content) = document.select(container).next() else {
        return Err(FetchError::ContentNotFound(
            "content container missing".to_string(),
        ));
    };

    let blocks: Vec<String> = content
        .select(&TEXT_BLOCKS)
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect();

    Ok(blocks.join("\n"))
}

/// reqwest-based page fetcher
pub struct HttpFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Element holding the page text
    container: Selector,

    /// In-site link filter
    links: LinkExtractor,
}

impl HttpFetcher {
    /// Create a fetcher from the crawler configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidSelector` for a bad content selector,
    /// `FetchError::InvalidUrl` for a bad base URL and `FetchError::Http`
    /// if the HTTP client cannot be created
    pub fn new(config: &CrawlerConfig) -> Result<Self, FetchError> {
        Self::with_timeout(config, config.request_timeout())
    }

    /// Create a fetcher with an explicit timeout
    pub fn with_timeout(config: &CrawlerConfig, timeout: Duration) -> Result<Self, FetchError> {
        let container = Selector::parse(&config.content_selector)
            .map_err(|e| FetchError::InvalidSelector(format!("{}: {e}", config.content_selector)))?;
        let links = LinkExtractor::new(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|_| FetchError::InvalidUrl(format!("bad user agent: {}", config.user_agent)))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            container,
            links,
        })
    }

    /// Link extractor used for discovered links
    pub fn links(&self) -> &LinkExtractor {
        &self.links
    }

    /// Parse a fetched body into text and links
    pub fn parse(&self, html: &str) -> Result<FetchedPage, FetchError> {
        let document = Html::parse_document(html);
        let text = extract_text(&document, &self.container)?;
        let links = self.links.extract_from(&document);
        Ok(FetchedPage { text, links })
    }

    async fn get_body(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http(e)
            }
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let _timer = crate::metrics::start_fetch_timer();

        let body = self.get_body(url).await?;
        let page = self.parse(&body)?;

        tracing::debug!(
            url = %url,
            chars = page.text.chars().count(),
            links = page.links.len(),
            "Fetched page"
        );
        Ok(page)
    }
}

//! In-site link extraction

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use scraper::{Html, Selector};
use url::Url;

use crate::utils::error::FetchError;
use crate::utils::extract_origin;

lazy_static! {
    static ref ANCHOR: Selector = Selector::parse("a[href]").expect("Invalid CSS selector: a[href]");
}

/// Keeps only links that stay on the configured site
///
/// Absolute links must have the same origin as the base (a look-alike host
/// such as `site.com.example` does not match); root-relative links
/// (`/Wiki_Page`, but not protocol-relative `//host/x`) are rewritten against
/// it. Everything else is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkExtractor {
    origin: String,
}

impl LinkExtractor {
    /// Create an extractor for the origin of `base_url`
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let origin =
            extract_origin(base_url).map_err(|_| FetchError::InvalidUrl(base_url.to_string()))?;
        Ok(Self { origin })
    }

    /// Origin links are resolved against, without trailing slash
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Resolve one `href`, or None if it leaves the site
    pub fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.starts_with('/') && !href.starts_with("//") {
            Some(format!("{}{href}", self.origin))
        } else {
            let parsed = Url::parse(href).ok()?;
            (parsed.origin().ascii_serialization() == self.origin).then(|| href.to_string())
        }
    }

    /// All in-site links of a parsed document
    pub fn extract_from(&self, document: &Html) -> BTreeSet<String> {
        document
            .select(&ANCHOR)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| self.resolve(href))
            .collect()
    }

    /// All in-site links of an HTML string
    pub fn extract(&self, html: &str) -> BTreeSet<String> {
        self.extract_from(&Html::parse_document(html))
    }
}

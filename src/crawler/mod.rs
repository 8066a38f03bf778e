//! Page fetching
//!
//! The worker loop only sees the [`Fetcher`] trait. [`HttpFetcher`] is the
//! production implementation; tests substitute scripted fetchers.

pub mod fetcher;
pub mod links;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::FetchedPage;
use crate::utils::error::FetchError;

pub use fetcher::{extract_text, HttpFetcher};
pub use links::LinkExtractor;

/// Retrieves a page and extracts its text and in-site links
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Thread-safe shared fetcher
pub type SharedFetcher = Arc<dyn Fetcher>;

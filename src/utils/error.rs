//! Error types for the swarmcrawl crawler
//!
//! This module defines the domain error types raised by the fetcher and
//! the coordination store.

use thiserror::Error;

/// Errors that can occur while fetching and extracting a page
///
/// Every variant is a transient task failure from the worker's point of view:
/// the URL goes to the failure queue and is never marked visited.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// The page has no content container
    #[error("Content container not found: {0}")]
    ContentNotFound(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid selector in configuration
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

/// Errors raised by a coordination store backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not obtain a pooled connection
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Command failed on the server
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A key holds a value of another type
    #[error("Wrong type for key '{0}'")]
    WrongType(String),
}

impl From<deadpool_redis::PoolError> for StoreError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl StoreError {
    /// Check if the operation may succeed when retried
    ///
    /// A type mismatch means a key was overwritten by something else and
    /// needs an operator; connection problems usually clear on their own.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::WrongType(_))
    }
}

//! Unified error handling for the swarmcrawl crate
//!
//! Domain errors ([`FetchError`], [`StoreError`]) stay local to the fetcher
//! and the coordination store. [`Error`] covers the setup paths: building
//! the distribution strategy and serving the status endpoint. The binary
//! wraps everything in `anyhow`.

use std::io;
use thiserror::Error;

pub use crate::utils::error::{FetchError, StoreError};

/// Unified error type for the swarmcrawl crate
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors (fatal at startup)
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

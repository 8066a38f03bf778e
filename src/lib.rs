//! swarmcrawl - Distributed web crawler
//!
//! Independent workers pull URLs from a shared frontier held in Redis,
//! extract in-site links and feed them back. Each distinct page is crawled
//! successfully at most once, failures are kept apart, and every worker's
//! health is visible through heartbeats.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`store`] - Coordination store abstraction (Redis, in-memory)
//! - [`frontier`] - Master queue and visited-URL index
//! - [`distribution`] - FIFO, priority and round-robin ready queues
//! - [`status`] - Per-URL task status
//! - [`liveness`] - Worker heartbeats and registrations
//! - [`failures`] - Failed-URL list
//! - [`monitor`] - Read-only snapshots and the HTTP status server
//! - [`worker`] - The crawl loop
//! - [`crawler`] - HTTP fetcher and link extraction
//! - [`storage`] - Page persistence (SQLite)
//! - [`config`] - Configuration management and settings
//! - [`metrics`] - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use swarmcrawl::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let store = swarmcrawl::store::create_redis_store(&config.store).await?;
//!     let cluster = Cluster::from_config(store, &config)?;
//!
//!     let worker = Worker::new(
//!         WorkerId::from_process(),
//!         cluster,
//!         Arc::new(HttpFetcher::new(&config.crawler)?),
//!         swarmcrawl::storage::create_sqlite_page_store(&config.page_store.sqlite_path)?,
//!         WorkerSettings::from_config(&config),
//!     );
//!     worker.run().await;
//!     Ok(())
//! }
//! ```

pub mod cluster;
pub mod config;
pub mod crawler;
pub mod distribution;
pub mod error;
pub mod failures;
pub mod frontier;
pub mod liveness;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod status;
pub mod storage;
pub mod store;
pub mod utils;
pub mod worker;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cluster::Cluster;
    pub use crate::config::Config;
    pub use crate::crawler::{Fetcher, HttpFetcher};
    pub use crate::distribution::Strategy;
    pub use crate::error::{Error, Result};
    pub use crate::liveness::{Liveness, WorkerState};
    pub use crate::models::{FetchedPage, WorkerId};
    pub use crate::monitor::{Monitor, Snapshot};
    pub use crate::status::TaskStatus;
    pub use crate::storage::PageStore;
    pub use crate::store::CoordinationStore;
    pub use crate::worker::{TickOutcome, Worker, WorkerSettings};
}

// Direct re-exports for convenience
pub use models::{FetchedPage, WorkerId};

//! Visited-URL index
//!
//! A URL enters the index only after its page was fetched and stored. Once
//! visited, it is never enqueued again.

use crate::store::{Keyspace, SharedStore, StoreResult};

/// Set of successfully crawled URLs
#[derive(Clone)]
pub struct DedupIndex {
    store: SharedStore,
    key: String,
}

impl DedupIndex {
    pub fn new(store: SharedStore, keys: &Keyspace) -> Self {
        Self {
            store,
            key: keys.visited(),
        }
    }

    /// Check if a URL was already crawled
    pub async fn is_visited(&self, url: &str) -> StoreResult<bool> {
        self.store.sismember(&self.key, url).await
    }

    /// Mark a URL as crawled (idempotent)
    ///
    /// Returns true the first time a URL is marked.
    pub async fn mark_visited(&self, url: &str) -> StoreResult<bool> {
        self.store.sadd(&self.key, url).await
    }

    /// Number of crawled URLs
    pub async fn visited_count(&self) -> StoreResult<usize> {
        self.store.scard(&self.key).await
    }
}

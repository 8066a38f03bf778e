//! Failed-URL list
//!
//! Failures are appended unconditionally (a URL that fails twice appears
//! twice). Nothing is retried automatically; [`FailureQueue::requeue_all`]
//! is an explicit operator action.

use serde::Serialize;

use crate::frontier::Frontier;
use crate::store::{Keyspace, SharedStore, StoreResult};

/// Outcome of moving failed URLs back into the frontier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequeueReport {
    /// Entries removed from the failure list
    pub drained: usize,
    /// Entries pushed back into the frontier
    pub requeued: usize,
    /// Entries dropped because the URL was visited or queued meanwhile
    pub skipped: usize,
}

/// Append-only list of failed URLs
#[derive(Clone)]
pub struct FailureQueue {
    store: SharedStore,
    key: String,
}

impl FailureQueue {
    pub fn new(store: SharedStore, keys: &Keyspace) -> Self {
        Self {
            store,
            key: keys.failed(),
        }
    }

    /// Record a failed URL
    pub async fn record_failure(&self, url: &str) -> StoreResult<()> {
        self.store.lpush(&self.key, url).await
    }

    /// Every recorded failure, oldest first
    pub async fn list_failures(&self) -> StoreResult<Vec<String>> {
        let mut urls = self.store.lrange_all(&self.key).await?;
        urls.reverse();
        Ok(urls)
    }

    /// Number of recorded failures
    pub async fn len(&self) -> StoreResult<usize> {
        self.store.llen(&self.key).await
    }

    /// Whether no failures are recorded
    pub async fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Move every failed URL back into the frontier, oldest first
    ///
    /// Each entry is popped before it is resubmitted, so concurrent failures
    /// recorded during the requeue are either moved or left in place.
    pub async fn requeue_all(&self, frontier: &Frontier) -> StoreResult<RequeueReport> {
        let mut report = RequeueReport::default();

        while let Some(url) = self.store.rpop(&self.key).await? {
            report.drained += 1;
            match frontier.submit(&url).await {
                Ok(true) => report.requeued += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    // Keep the failure on record
                    if let Err(push) = self.store.lpush(&self.key, &url).await {
                        tracing::error!(url = %url, error = %push, "Failed to restore failure entry");
                    }
                    return Err(e);
                }
            }
        }

        tracing::info!(
            drained = report.drained,
            requeued = report.requeued,
            skipped = report.skipped,
            "Requeued failed URLs"
        );
        Ok(report)
    }
}

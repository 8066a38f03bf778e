//! Shared task frontier
//!
//! New URLs enter the unrouted master list (`LPUSH`). Before taking work a
//! worker drains that list (`RPOP`, so oldest first) into the ready queues of
//! the active [`Strategy`](crate::distribution::Strategy). Under FIFO the
//! master list is already the ready queue and draining does nothing.
//!
//! Every entry point is gated twice. A visited URL (see [`DedupIndex`]) is
//! never enqueued again, and a URL already waiting in a queue is tracked in
//! the `enqueued_urls` set, so it sits in at most one queue at a time. The
//! set entry is released when a worker takes the URL.

pub mod dedup;

use crate::distribution::DistributionPolicy;
use crate::models::WorkerId;
use crate::store::{Keyspace, SharedStore, StoreResult};

pub use dedup::DedupIndex;

/// Master list plus the policy that drains it
#[derive(Clone)]
pub struct Frontier {
    store: SharedStore,
    master: String,
    enqueued: String,
    dedup: DedupIndex,
    policy: DistributionPolicy,
}

impl Frontier {
    pub fn new(store: SharedStore, keys: &Keyspace, policy: DistributionPolicy) -> Self {
        Self {
            dedup: DedupIndex::new(store.clone(), keys),
            master: keys.master_queue(),
            enqueued: keys.enqueued(),
            store,
            policy,
        }
    }

    /// Visited-URL index used by this frontier
    pub fn dedup(&self) -> &DedupIndex {
        &self.dedup
    }

    /// Distribution policy used to drain and take
    pub fn policy(&self) -> &DistributionPolicy {
        &self.policy
    }

    /// Enqueue a URL unless it was already crawled or is already queued
    ///
    /// Returns true if the URL was pushed. Idempotent: repeated submissions
    /// of a waiting URL push nothing.
    pub async fn submit(&self, url: &str) -> StoreResult<bool> {
        if self.dedup.is_visited(url).await? {
            tracing::debug!(url = %url, "Skipping visited URL");
            return Ok(false);
        }

        if !self.store.sadd(&self.enqueued, url).await? {
            tracing::debug!(url = %url, "Skipping URL already queued");
            return Ok(false);
        }

        if let Err(e) = self.store.lpush(&self.master, url).await {
            let _ = self.store.srem(&self.enqueued, url).await;
            return Err(e);
        }
        Ok(true)
    }

    /// Put a taken URL back after its tick was interrupted
    ///
    /// Skips the visited check (the failing store call may have been that
    /// check); the dispatch-time check catches a URL that was visited after
    /// all. Best effort: errors are logged, not returned. Returns true if the
    /// URL is queued again, by this call or by a resubmission meanwhile.
    pub async fn restore(&self, url: &str) -> bool {
        let pushed = match self.store.sadd(&self.enqueued, url).await {
            Ok(false) => return true,
            Ok(true) => self.store.lpush(&self.master, url).await,
            Err(e) => Err(e),
        };

        match pushed {
            Ok(()) => {
                tracing::info!(url = %url, "Returned interrupted URL to master queue");
                true
            }
            Err(e) => {
                let _ = self.store.srem(&self.enqueued, url).await;
                tracing::error!(url = %url, error = %e, "Failed to return interrupted URL to master queue");
                false
            }
        }
    }

    /// Enqueue a batch, returning how many were pushed
    pub async fn submit_all<I, S>(&self, urls: I) -> StoreResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pushed = 0;
        for url in urls {
            if self.submit(url.as_ref()).await? {
                pushed += 1;
            }
        }
        Ok(pushed)
    }

    /// Move one URL from the master list into its ready queue
    ///
    /// Returns the URL routed, or None when the master list is empty or the
    /// strategy reads the master list directly.
    pub async fn drain_one(&self) -> StoreResult<Option<String>> {
        if !self.policy.strategy().routes_from_master() {
            return Ok(None);
        }

        let Some(url) = self.store.rpop(&self.master).await? else {
            return Ok(None);
        };

        if let Err(e) = self.policy.route(&url).await {
            // Put it back rather than lose it
            tracing::warn!(url = %url, error = %e, "Routing failed, returning URL to master queue");
            self.store.lpush(&self.master, &url).await?;
            return Err(e);
        }

        Ok(Some(url))
    }

    /// Drain the master list completely, returning the number routed
    pub async fn drain_all(&self) -> StoreResult<usize> {
        let mut routed = 0;
        while self.drain_one().await?.is_some() {
            routed += 1;
        }
        if routed > 0 {
            tracing::debug!(routed, strategy = self.policy.strategy().name(), "Drained master queue");
        }
        Ok(routed)
    }

    /// Take the next ready URL for a worker
    ///
    /// The URL leaves the enqueued set, so it can be submitted again (for
    /// example after a failure is requeued).
    pub async fn take(&self, worker: &WorkerId) -> StoreResult<Option<String>> {
        let Some(url) = self.policy.take(worker).await? else {
            return Ok(None);
        };

        if let Err(e) = self.store.srem(&self.enqueued, &url).await {
            // Still marked enqueued, so push it straight back
            tracing::warn!(url = %url, error = %e, "Release failed, returning URL to master queue");
            self.store.lpush(&self.master, &url).await?;
            return Err(e);
        }
        Ok(Some(url))
    }

    /// Length of the unrouted master list
    pub async fn pending(&self) -> StoreResult<usize> {
        self.store.llen(&self.master).await
    }
}

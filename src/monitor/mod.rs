//! Read-only view of the whole crawl
//!
//! A [`Snapshot`] collects queue depths, status counts and the liveness of
//! every known worker. Missing or malformed records never fail a snapshot;
//! they show up as absent values.

pub mod server;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cluster::Cluster;
use crate::distribution::QueueDepth;
use crate::liveness::{Liveness, Registration};
use crate::status::StatusCounts;
use crate::storage::SharedPageStore;
use crate::store::StoreResult;
use crate::utils::truncate_text;

pub use server::{create_router, serve, AppState};

// ============================================================================
// Snapshot
// ============================================================================

/// Health of one known worker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerReport {
    pub id: String,
    pub liveness: Liveness,
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Seconds since the last heartbeat
    pub heartbeat_age_secs: Option<f64>,
    pub registration: Option<Registration>,
}

/// Point-in-time view of the coordination store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub strategy: String,
    /// Unrouted master queue depth; None when the master queue is itself the
    /// ready queue (FIFO) and already listed in `ready_queues`
    pub pending: Option<usize>,
    pub ready_queues: Vec<QueueDepth>,
    pub failed: usize,
    pub visited: usize,
    pub status: StatusCounts,
    /// Stored page count, when a page store is attached
    pub pages_stored: Option<usize>,
    pub workers: Vec<WorkerReport>,
}

impl Snapshot {
    /// Workers whose heartbeat is old or gone
    pub fn stale_workers(&self) -> impl Iterator<Item = &WorkerReport> {
        self.workers.iter().filter(|w| w.liveness.is_stale())
    }

    /// Total URLs waiting in ready queues
    pub fn ready_total(&self) -> usize {
        self.ready_queues.iter().map(|q| q.depth).sum()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Crawl Status @ {}", self.taken_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f, "{:-<40}", "")?;
        writeln!(f, "Strategy: {}", self.strategy)?;
        if let Some(pending) = self.pending {
            writeln!(f, "Pending (unrouted): {pending}")?;
        }
        for queue in &self.ready_queues {
            writeln!(f, "Ready {}: {}", queue.name, queue.depth)?;
        }
        writeln!(f, "Failed queue: {}", self.failed)?;
        writeln!(f, "Visited: {}", self.visited)?;
        if let Some(pages) = self.pages_stored {
            writeln!(f, "Pages stored: {pages}")?;
        }
        writeln!(
            f,
            "Status: crawling={} done={} failed={}",
            self.status.crawling, self.status.done, self.status.failed
        )?;

        writeln!(f, "{:-<40}", "")?;
        writeln!(f, "Workers: {}", self.workers.len())?;
        for worker in &self.workers {
            let state = worker
                .registration
                .as_ref()
                .and_then(|r| r.status)
                .map_or("unknown", |s| s.as_str());
            let url = worker
                .registration
                .as_ref()
                .and_then(|r| r.current_url.as_deref())
                .map_or_else(|| "-".to_string(), |u| truncate_text(u, 60));
            let age = worker
                .heartbeat_age_secs
                .map_or_else(|| "never".to_string(), |a| format!("{a:.1}s ago"));
            writeln!(
                f,
                "  {} [{}] {} {} (heartbeat {})",
                worker.id, worker.liveness, state, url, age
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// Monitor
// ============================================================================

/// Builds snapshots from the coordination store
#[derive(Clone)]
pub struct Monitor {
    cluster: Cluster,
    stale_after: Duration,
    pages: Option<SharedPageStore>,
}

impl Monitor {
    pub fn new(cluster: Cluster, stale_after: Duration) -> Self {
        Self {
            cluster,
            stale_after,
            pages: None,
        }
    }

    /// Include the page-store count in snapshots
    pub fn with_page_store(mut self, pages: SharedPageStore) -> Self {
        self.pages = Some(pages);
        self
    }

    /// Check that the coordination store answers
    pub async fn ping(&self) -> StoreResult<()> {
        self.cluster.store.ping().await
    }

    /// Snapshot at the current time
    pub async fn snapshot(&self) -> StoreResult<Snapshot> {
        self.snapshot_at(Utc::now()).await
    }

    /// Snapshot with liveness judged against `now`
    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> StoreResult<Snapshot> {
        let frontier = &self.cluster.frontier;

        let pending = if frontier.policy().strategy().routes_from_master() {
            Some(frontier.pending().await?)
        } else {
            None
        };
        let ready_queues = frontier.policy().ready_depth().await?;
        let failed = self.cluster.failures.len().await?;
        let visited = frontier.dedup().visited_count().await?;
        let status = self.cluster.status.counts().await?;

        let pages_stored = match &self.pages {
            Some(pages) => match pages.count().await {
                Ok(count) => Some(count),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to count stored pages");
                    None
                }
            },
            None => None,
        };

        let mut workers = Vec::new();
        for id in self.cluster.liveness.known_workers().await? {
            let last_heartbeat = self.cluster.liveness.last_heartbeat(&id).await?;
            let registration = self.cluster.liveness.registration(&id).await?;
            workers.push(WorkerReport {
                liveness: Liveness::classify(last_heartbeat, now, self.stale_after),
                heartbeat_age_secs: last_heartbeat
                    .map(|t| now.signed_duration_since(t).num_milliseconds() as f64 / 1000.0),
                last_heartbeat,
                registration,
                id,
            });
        }

        if let Some(pending) = pending {
            crate::metrics::set_queue_depth("url_queue", pending);
        }
        crate::metrics::set_queue_depth("failed_urls", failed);
        for queue in &ready_queues {
            crate::metrics::set_queue_depth(&queue.name, queue.depth);
        }

        Ok(Snapshot {
            taken_at: now,
            strategy: frontier.policy().strategy().name().to_string(),
            pending,
            ready_queues,
            failed,
            visited,
            status,
            pages_stored,
            workers,
        })
    }
}

//! Crawl worker loop
//!
//! Each iteration ("tick") runs sequentially:
//!
//! ```text
//! heartbeat ─► drain master queue ─► take ─► visited? ─► crawling ─► fetch
//!                                     │          │                    │
//!                                   (none)     (yes)          ┌───────┴───────┐
//!                                     ▼          ▼            ▼               ▼
//!                                   idle       skip     store page      record failure
//!                                                       submit links    status failed
//!                                                       mark visited
//!                                                       status done
//! ```
//!
//! Coordination-store errors abandon the tick; they never mark the URL as
//! failed. A URL taken but not yet recorded as visited or failed is returned
//! to the master queue, and the worker backs off and tries again.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::sync::watch;

use crate::cluster::Cluster;
use crate::config::Config;
use crate::crawler::SharedFetcher;
use crate::liveness::WorkerState;
use crate::models::WorkerId;
use crate::status::TaskStatus;
use crate::storage::{SharedPageStore, UpsertOutcome};
use crate::store::StoreResult;

// ============================================================================
// Settings
// ============================================================================

/// Pacing of the worker loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Pause after a tick that handled a URL
    pub sleep_interval: Duration,

    /// Pause after a tick that found no work or hit a store error
    pub idle_backoff: Duration,

    /// Upper bound of the random delay added to the idle backoff
    pub max_jitter: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            sleep_interval: Duration::from_secs(1),
            idle_backoff: Duration::from_secs(5),
            max_jitter: Duration::from_millis(500),
        }
    }
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        let idle_backoff = config.idle_backoff();
        Self {
            sleep_interval: config.sleep_interval(),
            idle_backoff,
            max_jitter: idle_backoff / 10,
        }
    }

    /// Idle backoff plus a random jitter
    fn idle_delay(&self) -> Duration {
        let max = self.max_jitter.as_millis() as u64;
        let jitter = if max == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=max)
        };
        self.idle_backoff + Duration::from_millis(jitter)
    }
}

// ============================================================================
// Tick Outcome
// ============================================================================

/// What one tick did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// No URL was available
    Idle,

    /// The URL taken was already visited
    Skipped { url: String },

    /// Page fetched, stored and marked visited
    Done {
        url: String,
        links_submitted: usize,
        stored: bool,
    },

    /// Fetch or page store failed; URL recorded as failed
    Failed { url: String, reason: String },
}

impl TickOutcome {
    /// Metrics label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Skipped { .. } => "skipped",
            Self::Done { .. } => "done",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether the tick found no work
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

// ============================================================================
// Worker
// ============================================================================

/// One crawl worker
pub struct Worker {
    id: WorkerId,
    cluster: Cluster,
    fetcher: SharedFetcher,
    pages: SharedPageStore,
    settings: WorkerSettings,

    /// Shutdown signal
    shutdown: watch::Sender<bool>,

    /// Shutdown receiver
    shutdown_rx: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        cluster: Cluster,
        fetcher: SharedFetcher,
        pages: SharedPageStore,
        settings: WorkerSettings,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        Self {
            id,
            cluster,
            fetcher,
            pages,
            settings,
            shutdown,
            shutdown_rx,
        }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Sender that stops [`run`](Self::run) after the current tick
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }

    /// Trigger shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Run one iteration of the crawl loop
    pub async fn tick(&self) -> StoreResult<TickOutcome> {
        let liveness = &self.cluster.liveness;

        if let Err(e) = liveness.heartbeat(&self.id).await {
            crate::metrics::record_heartbeat_error();
            return Err(e);
        }

        self.cluster.frontier.drain_all().await?;

        let Some(url) = self.cluster.frontier.take(&self.id).await? else {
            liveness.update(&self.id, WorkerState::Idle, None).await?;
            return Ok(TickOutcome::Idle);
        };

        let mut settled = false;
        match self.process(&url, &mut settled).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if !settled {
                    tracing::warn!(worker = %self.id, url = %url, error = %e, "Tick interrupted, returning URL");
                    self.cluster.frontier.restore(&url).await;
                }
                Err(e)
            }
        }
    }

    /// Handle one taken URL
    ///
    /// `settled` becomes true once the URL is on record as visited or
    /// failed; a store error before that point means the URL must be
    /// returned to the frontier.
    async fn process(&self, url: &str, settled: &mut bool) -> StoreResult<TickOutcome> {
        let liveness = &self.cluster.liveness;
        let url = url.to_string();

        if self.cluster.frontier.dedup().is_visited(&url).await? {
            *settled = true;
            tracing::debug!(worker = %self.id, url = %url, "Already visited, skipping");
            liveness.update(&self.id, WorkerState::Idle, None).await?;
            return Ok(TickOutcome::Skipped { url });
        }

        self.cluster.status.transition(&url, TaskStatus::Crawling).await?;
        liveness
            .update(&self.id, WorkerState::Crawling, Some(&url))
            .await?;
        tracing::info!(worker = %self.id, url = %url, "Crawling");

        let stored = match self.fetcher.fetch(&url).await {
            Ok(page) => match self.pages.upsert(&url, &page.text).await {
                Ok(outcome) => Ok((page, outcome)),
                Err(e) => Err(format!("page store: {e:#}")),
            },
            Err(e) => Err(e.to_string()),
        };

        match stored {
            Ok((page, outcome)) => {
                // Links go out before the visited mark so an interrupted tick
                // can redo both
                let links: Vec<&String> =
                    page.links.iter().filter(|link| **link != url).collect();
                let links_submitted = self.cluster.frontier.submit_all(links).await?;
                crate::metrics::record_links_submitted(links_submitted);

                self.cluster.frontier.dedup().mark_visited(&url).await?;
                *settled = true;
                self.cluster.status.transition(&url, TaskStatus::Done).await?;

                liveness.update(&self.id, WorkerState::Done, Some(&url)).await?;
                tracing::info!(
                    worker = %self.id,
                    url = %url,
                    links_found = page.links.len(),
                    links_submitted,
                    "Crawled"
                );
                Ok(TickOutcome::Done {
                    url,
                    links_submitted,
                    stored: outcome == UpsertOutcome::Stored,
                })
            }
            Err(reason) => {
                self.cluster.failures.record_failure(&url).await?;
                *settled = true;
                self.cluster.status.transition(&url, TaskStatus::Failed).await?;
                liveness.update(&self.id, WorkerState::Failed, Some(&url)).await?;
                tracing::warn!(worker = %self.id, url = %url, reason = %reason, "Crawl failed");
                Ok(TickOutcome::Failed { url, reason })
            }
        }
    }

    /// Run ticks until shutdown, then deregister
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        tracing::info!(
            worker = %self.id,
            strategy = self.cluster.frontier.policy().strategy().name(),
            "Worker starting"
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let delay = match self.tick().await {
                Ok(outcome) => {
                    crate::metrics::record_task_outcome(outcome.label());
                    if outcome.is_idle() {
                        tracing::debug!(worker = %self.id, "No work available");
                        self.settings.idle_delay()
                    } else {
                        self.settings.sleep_interval
                    }
                }
                Err(e) => {
                    crate::metrics::record_task_outcome("store_error");
                    if e.is_recoverable() {
                        tracing::warn!(worker = %self.id, error = %e, "Coordination store unavailable, backing off");
                    } else {
                        tracing::error!(worker = %self.id, error = %e, "Coordination store holds unexpected data, backing off");
                    }
                    self.settings.idle_delay()
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_rx.changed() => {}
            }
        }

        tracing::info!(worker = %self.id, "Worker shutting down");
        self.leave().await;
    }

    /// Run a single tick, then deregister
    pub async fn run_once(&self) -> StoreResult<TickOutcome> {
        let outcome = self.tick().await;
        if let Ok(outcome) = &outcome {
            crate::metrics::record_task_outcome(outcome.label());
        }
        self.leave().await;
        outcome
    }

    /// Remove this worker's liveness records, logging failures
    async fn leave(&self) {
        if let Err(e) = self.cluster.liveness.deregister(&self.id).await {
            tracing::warn!(worker = %self.id, error = %e, "Failed to deregister");
        }
    }
}

//! Worker liveness registry
//!
//! Each worker refreshes three records on every loop iteration:
//!
//! - `crawler:heartbeat:<id>`: Unix timestamp (fractional seconds) written
//!   with a TTL, so it disappears when the worker stops refreshing it
//! - `crawler:status:<id>`: registration hash (`current_url`, `status`,
//!   `last_active_time`)
//! - `active_crawlers`: the set of every worker id ever registered
//!
//! Staleness is judged by readers ([`Liveness::classify`]). Stale workers
//! are reported, never removed; only a graceful shutdown deregisters.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::WorkerId;
use crate::store::{Keyspace, SharedStore, StoreResult};

/// Placeholder stored in `current_url` when a worker holds no task
const IDLE_URL: &str = "idle";

/// What a worker reports it is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Idle,
    Crawling,
    Done,
    Failed,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Crawling => "crawling",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "crawling" => Ok(Self::Crawling),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown worker state: {other}")),
        }
    }
}

/// Registration record as read back from the store
///
/// Every field is optional: records may be partial or written by another
/// version of the worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub current_url: Option<String>,
    pub status: Option<WorkerState>,
    pub last_active_time: Option<DateTime<Utc>>,
}

impl Registration {
    fn from_fields(fields: &std::collections::HashMap<String, String>) -> Self {
        Self {
            current_url: fields
                .get("current_url")
                .filter(|u| !u.is_empty() && u.as_str() != IDLE_URL)
                .cloned(),
            status: fields.get("status").and_then(|s| s.parse().ok()),
            last_active_time: fields
                .get("last_active_time")
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc)),
        }
    }
}

/// Health of a worker as judged from its heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    /// Heartbeat present and recent
    Alive,
    /// Heartbeat present but older than the staleness threshold
    Unresponsive,
    /// Heartbeat absent (expired or never written)
    HeartbeatLost,
}

impl Liveness {
    /// Classify a worker from its last heartbeat
    pub fn classify(
        last_heartbeat: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Self {
        let Some(last) = last_heartbeat else {
            return Self::HeartbeatLost;
        };

        let age = now.signed_duration_since(last);
        let limit = chrono::Duration::from_std(stale_after).unwrap_or(chrono::Duration::MAX);
        if age > limit {
            Self::Unresponsive
        } else {
            Self::Alive
        }
    }

    pub fn is_stale(&self) -> bool {
        !matches!(self, Self::Alive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::Unresponsive => "unresponsive",
            Self::HeartbeatLost => "heartbeat lost",
        }
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unix seconds with sub-second precision
fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_micros()) / 1_000_000.0
}

fn from_unix_seconds(raw: &str) -> Option<DateTime<Utc>> {
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1_000_000_000.0).round() as u32;
    Utc.timestamp_opt(whole as i64, nanos.min(999_999_999)).single()
}

/// Heartbeat and registration records of all workers
#[derive(Clone)]
pub struct LivenessRegistry {
    store: SharedStore,
    keys: Keyspace,
    heartbeat_ttl: Duration,
}

impl LivenessRegistry {
    pub fn new(store: SharedStore, keys: Keyspace, heartbeat_ttl: Duration) -> Self {
        Self {
            store,
            keys,
            heartbeat_ttl,
        }
    }

    /// Refresh the heartbeat lease with the current time
    pub async fn heartbeat(&self, worker: &WorkerId) -> StoreResult<()> {
        self.heartbeat_at(worker, Utc::now()).await
    }

    /// Refresh the heartbeat lease with an explicit timestamp
    pub async fn heartbeat_at(&self, worker: &WorkerId, at: DateTime<Utc>) -> StoreResult<()> {
        let key = self.keys.heartbeat(worker.as_str());
        self.store
            .set_with_ttl(&key, &unix_seconds(at).to_string(), self.heartbeat_ttl)
            .await
    }

    /// Upsert the registration hash and join the known-worker set
    pub async fn update(
        &self,
        worker: &WorkerId,
        state: WorkerState,
        current_url: Option<&str>,
    ) -> StoreResult<()> {
        self.update_at(worker, state, current_url, Utc::now()).await
    }

    /// [`update`](Self::update) with an explicit activity time
    pub async fn update_at(
        &self,
        worker: &WorkerId,
        state: WorkerState,
        current_url: Option<&str>,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let key = self.keys.worker_status(worker.as_str());
        let active = at.to_rfc3339();
        self.store
            .hset_multiple(
                &key,
                &[
                    ("current_url", current_url.unwrap_or(IDLE_URL)),
                    ("status", state.as_str()),
                    ("last_active_time", active.as_str()),
                ],
            )
            .await?;
        self.store
            .sadd(&self.keys.active_workers(), worker.as_str())
            .await?;
        Ok(())
    }

    /// Heartbeat plus registration, as done once per loop iteration
    pub async fn tick(
        &self,
        worker: &WorkerId,
        state: WorkerState,
        current_url: Option<&str>,
    ) -> StoreResult<()> {
        let now = Utc::now();
        self.heartbeat_at(worker, now).await?;
        self.update_at(worker, state, current_url, now).await
    }

    /// Remove every record of a worker
    pub async fn deregister(&self, worker: &WorkerId) -> StoreResult<()> {
        self.store.del(&self.keys.worker_status(worker.as_str())).await?;
        self.store.del(&self.keys.heartbeat(worker.as_str())).await?;
        self.store
            .srem(&self.keys.active_workers(), worker.as_str())
            .await?;
        tracing::info!(worker = %worker, "Worker deregistered");
        Ok(())
    }

    /// Ids of every registered worker, sorted
    pub async fn known_workers(&self) -> StoreResult<Vec<String>> {
        self.store.smembers(&self.keys.active_workers()).await
    }

    /// Registration of a worker; None when no hash exists
    pub async fn registration(&self, worker: &str) -> StoreResult<Option<Registration>> {
        let fields = self.store.hgetall(&self.keys.worker_status(worker)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(Registration::from_fields(&fields)))
    }

    /// Last heartbeat time; None when absent or unparsable
    pub async fn last_heartbeat(&self, worker: &str) -> StoreResult<Option<DateTime<Utc>>> {
        let raw = self.store.get(&self.keys.heartbeat(worker)).await?;
        Ok(raw.as_deref().and_then(from_unix_seconds))
    }
}

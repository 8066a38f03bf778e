//! Per-URL task status
//!
//! One hash maps URL → `crawling | done | failed`. "Queued" is implicit (no
//! entry). Writes are plain field sets, so the last writer wins; illegal
//! transitions are logged but still written.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::store::{Keyspace, SharedStore, StoreResult};

/// State of one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Crawling,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawling => "crawling",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is expected
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self` may follow `previous`
    ///
    /// `none → crawling → done | failed`. A failed URL may be crawled again
    /// after an operator requeue.
    pub fn can_follow(&self, previous: Option<TaskStatus>) -> bool {
        match (previous, self) {
            (None, Self::Crawling) => true,
            (Some(Self::Crawling), Self::Done | Self::Failed) => true,
            (Some(Self::Failed), Self::Crawling) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crawling" => Ok(Self::Crawling),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Number of URLs in each status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub crawling: usize,
    pub done: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.crawling + self.done + self.failed
    }

    fn add(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Crawling => self.crawling += 1,
            TaskStatus::Done => self.done += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }
}

/// Reads and writes the status hash
#[derive(Clone)]
pub struct StatusTracker {
    store: SharedStore,
    key: String,
}

impl StatusTracker {
    pub fn new(store: SharedStore, keys: &Keyspace) -> Self {
        Self {
            store,
            key: keys.url_status(),
        }
    }

    /// Write a status unconditionally
    pub async fn set_status(&self, url: &str, status: TaskStatus) -> StoreResult<()> {
        self.store.hset(&self.key, url, status.as_str()).await
    }

    /// Write a status, warning when it breaks the expected transitions
    pub async fn transition(&self, url: &str, status: TaskStatus) -> StoreResult<()> {
        let previous = self.get_status(url).await?;
        if !status.can_follow(previous) {
            tracing::warn!(
                url = %url,
                from = previous.map_or("none", |p| p.as_str()),
                to = status.as_str(),
                "Unexpected status transition"
            );
        }
        self.set_status(url, status).await
    }

    /// Current status; None when queued, unknown, or unparsable
    pub async fn get_status(&self, url: &str) -> StoreResult<Option<TaskStatus>> {
        let raw = self.store.hget(&self.key, url).await?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }

    /// Count URLs per status, ignoring unknown values
    pub async fn counts(&self) -> StoreResult<StatusCounts> {
        let all = self.store.hgetall(&self.key).await?;
        let mut counts = StatusCounts::default();
        for status in all.values().filter_map(|v| v.parse::<TaskStatus>().ok()) {
            counts.add(status);
        }
        Ok(counts)
    }
}

//! Key names of every shared structure in the coordination store

/// Namespaced key builder
///
/// All keys are `<prefix>:<name>`; an empty prefix yields the bare names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    prefix: String,
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new("swarmcrawl")
    }
}

impl Keyspace {
    /// Create a keyspace with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The configured prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}:{}", self.prefix, name)
        }
    }

    /// Unrouted master list (also the ready queue under FIFO)
    pub fn master_queue(&self) -> String {
        self.key("url_queue")
    }

    /// Global priority sorted set
    pub fn priority_queue(&self) -> String {
        self.key("url_queue_priority")
    }

    /// Round-robin shard list
    pub fn shard_queue(&self, shard: u32) -> String {
        self.key(&format!("url_queue_round_robin:{shard}"))
    }

    /// Dedup index
    pub fn visited(&self) -> String {
        self.key("visited_urls")
    }

    /// URLs currently waiting in the master list or a ready queue
    pub fn enqueued(&self) -> String {
        self.key("enqueued_urls")
    }

    /// Per-URL status hash
    pub fn url_status(&self) -> String {
        self.key("url_status")
    }

    /// Failure list
    pub fn failed(&self) -> String {
        self.key("failed_urls")
    }

    /// Set of known worker ids
    pub fn active_workers(&self) -> String {
        self.key("active_crawlers")
    }

    /// Registration hash of one worker
    pub fn worker_status(&self, worker: &str) -> String {
        self.key(&format!("crawler:status:{worker}"))
    }

    /// Heartbeat lease of one worker
    pub fn heartbeat(&self, worker: &str) -> String {
        self.key(&format!("crawler:heartbeat:{worker}"))
    }
}

//! Distribution policy: how routed URLs are placed into ready queues and
//! which queue a given worker takes from.
//!
//! # Strategies
//!
//! | Strategy     | Ready queue                         | Worker takes from              |
//! |--------------|-------------------------------------|--------------------------------|
//! | `fifo`       | the master list itself              | the master list                |
//! | `priority`   | one sorted set, score = rank        | lowest score in its band       |
//! | `round_robin`| one list per shard                  | shard `worker_number mod K`    |
//!
//! The strategy is fixed at startup. All workers of one deployment must use
//! the same strategy and node count, otherwise URLs land in queues nobody
//! reads.

pub mod priority;
pub mod shard;

use serde::Serialize;

use crate::config::DistributionConfig;
use crate::error::{Error, Result};
use crate::models::WorkerId;
use crate::store::{Keyspace, ScoreRange, SharedStore, StoreResult};

pub use priority::{MachinePartition, PriorityRules};
pub use shard::shard_for;

/// How many times a priority pop is retried after losing a removal race
const MAX_TAKE_ATTEMPTS: usize = 5;

// ============================================================================
// Strategy
// ============================================================================

/// Distribution strategy, fixed at startup
#[derive(Debug, Clone)]
pub enum Strategy {
    /// The master list is the ready queue
    Fifo,

    /// Ranked sorted set split between machine pools
    Priority {
        rules: PriorityRules,
        partition: MachinePartition,
    },

    /// Hash-sharded lists
    RoundRobin { node_count: u32 },
}

impl Strategy {
    /// Build the strategy named in the configuration
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an unknown name, a zero node count, an invalid
    /// machine partition or an invalid priority pattern.
    pub fn from_config(config: &DistributionConfig) -> Result<Self> {
        match config.strategy.trim().to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "priority" => Ok(Self::Priority {
                rules: PriorityRules::from_config(config)?,
                partition: MachinePartition::new(
                    config.machine_count,
                    config.machine_index,
                    config.priority_threshold,
                )?,
            }),
            "round_robin" | "round-robin" | "roundrobin" => {
                if config.node_count == 0 {
                    return Err(Error::config("distribution.node_count must be at least 1"));
                }
                Ok(Self::RoundRobin {
                    node_count: config.node_count,
                })
            }
            other => Err(Error::config(format!(
                "Unknown distribution strategy '{other}' (expected fifo, priority or round_robin)"
            ))),
        }
    }

    /// Canonical name, also used as a metrics label
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::Priority { .. } => "priority",
            Self::RoundRobin { .. } => "round_robin",
        }
    }

    /// Whether URLs must be moved out of the master list before they can be taken
    pub fn routes_from_master(&self) -> bool {
        !matches!(self, Self::Fifo)
    }
}

/// Depth of one ready queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    /// Short queue name (`url_queue`, `url_queue_priority`, `url_queue_round_robin:1`)
    pub name: String,
    pub depth: usize,
}

// ============================================================================
// Policy
// ============================================================================

/// A strategy bound to the coordination store
#[derive(Clone)]
pub struct DistributionPolicy {
    store: SharedStore,
    keys: Keyspace,
    strategy: Strategy,
}

impl DistributionPolicy {
    pub fn new(store: SharedStore, keys: Keyspace, strategy: Strategy) -> Self {
        Self {
            store,
            keys,
            strategy,
        }
    }

    /// The active strategy
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Place a URL into its ready queue, returning the queue key
    pub async fn route(&self, url: &str) -> StoreResult<String> {
        let key = match &self.strategy {
            Strategy::Fifo => {
                let key = self.keys.master_queue();
                self.store.lpush(&key, url).await?;
                key
            }
            Strategy::Priority { rules, .. } => {
                let key = self.keys.priority_queue();
                let rank = rules.priority(url);
                self.store.zadd(&key, url, f64::from(rank)).await?;
                tracing::debug!(url = %url, rank, "Routed by priority");
                key
            }
            Strategy::RoundRobin { node_count } => {
                let shard = shard_for(url, *node_count);
                let key = self.keys.shard_queue(shard);
                self.store.lpush(&key, url).await?;
                tracing::debug!(url = %url, shard, "Routed to shard");
                key
            }
        };

        crate::metrics::record_url_routed(self.strategy.name());
        Ok(key)
    }

    /// Take the next URL this worker is allowed to serve
    pub async fn take(&self, worker: &WorkerId) -> StoreResult<Option<String>> {
        match &self.strategy {
            Strategy::Fifo => self.store.rpop(&self.keys.master_queue()).await,
            Strategy::Priority { partition, .. } => self.take_priority(partition.band()).await,
            Strategy::RoundRobin { node_count } => {
                let shard = shard::worker_shard(worker.number(), *node_count);
                self.store.rpop(&self.keys.shard_queue(shard)).await
            }
        }
    }

    /// Lowest-scored member in the band; only the worker whose removal
    /// succeeds gets the URL
    async fn take_priority(&self, band: ScoreRange) -> StoreResult<Option<String>> {
        let key = self.keys.priority_queue();

        for attempt in 1..=MAX_TAKE_ATTEMPTS {
            let Some(candidate) = self.store.zfirst_in_range(&key, band).await? else {
                return Ok(None);
            };

            if self.store.zrem(&key, &candidate).await? {
                return Ok(Some(candidate));
            }

            tracing::debug!(url = %candidate, attempt, "Lost priority pop race, retrying");
        }

        tracing::debug!(attempts = MAX_TAKE_ATTEMPTS, "Giving up on contended priority queue");
        Ok(None)
    }

    /// Depth of every ready queue the strategy uses
    pub async fn ready_depth(&self) -> StoreResult<Vec<QueueDepth>> {
        match &self.strategy {
            Strategy::Fifo => Ok(vec![QueueDepth {
                name: "url_queue".to_string(),
                depth: self.store.llen(&self.keys.master_queue()).await?,
            }]),
            Strategy::Priority { .. } => Ok(vec![QueueDepth {
                name: "url_queue_priority".to_string(),
                depth: self.store.zcard(&self.keys.priority_queue()).await?,
            }]),
            Strategy::RoundRobin { node_count } => {
                let mut depths = Vec::with_capacity(*node_count as usize);
                for shard in 0..*node_count {
                    depths.push(QueueDepth {
                        name: format!("url_queue_round_robin:{shard}"),
                        depth: self.store.llen(&self.keys.shard_queue(shard)).await?,
                    });
                }
                Ok(depths)
            }
        }
    }
}

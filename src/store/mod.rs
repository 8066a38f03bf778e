//! Coordination store abstraction
//!
//! Every piece of state shared between workers lives behind
//! [`CoordinationStore`]. The crawler only relies on the atomicity of single
//! commands (pop-and-return from a list, set membership, hash field writes,
//! sorted-set removal); no transactions or scripts are used.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Frontier · Distribution · Status · Liveness · Failures  │
//! └──────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                  CoordinationStore trait                 │
//! └──────────────────────────────────────────────────────────┘
//!                  │                              │
//!                  ▼                              ▼
//!        ┌──────────────────┐          ┌──────────────────┐
//!        │    RedisStore    │          │   MemoryStore    │
//!        │ (deadpool-redis) │          │ (single process) │
//!        └──────────────────┘          └──────────────────┘
//! ```

pub mod keys;
pub mod memory;
pub mod redis;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::utils::error::StoreError;

pub use self::keys::Keyspace;
pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Half-open score band `[min, max)` of a sorted set
///
/// `None` on either side means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreRange {
    /// Inclusive lower bound
    pub min: Option<f64>,

    /// Exclusive upper bound
    pub max: Option<f64>,
}

impl ScoreRange {
    /// The whole score range
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Scores greater than or equal to `min`
    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Scores strictly below `max`
    pub fn below(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// Check if a score falls inside the band
    pub fn contains(&self, score: f64) -> bool {
        self.min.map_or(true, |min| score >= min) && self.max.map_or(true, |max| score < max)
    }
}

/// Shared key-value store used for all cross-worker coordination
///
/// Lists follow Redis semantics: `lpush` inserts at the head and `rpop`
/// removes from the tail, so `lpush` + `rpop` is FIFO.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Push a value at the head of a list
    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Atomically remove and return the tail of a list
    async fn rpop(&self, key: &str) -> StoreResult<Option<String>>;

    /// Length of a list (0 if missing)
    async fn llen(&self, key: &str) -> StoreResult<usize>;

    /// Whole list, head first
    async fn lrange_all(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Add a member to a set; returns true if it was not present
    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Remove a member from a set; returns true if it was present
    async fn srem(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Check set membership
    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// All members of a set
    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Set cardinality
    async fn scard(&self, key: &str) -> StoreResult<usize>;

    /// Write one hash field
    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Write several hash fields in a single command
    async fn hset_multiple(&self, key: &str, fields: &[(&str, &str)]) -> StoreResult<()>;

    /// Read one hash field
    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// Read a whole hash (empty if missing)
    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Add or update a sorted-set member
    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()>;

    /// Lowest-scored member inside `range` (ties broken by member order)
    async fn zfirst_in_range(&self, key: &str, range: ScoreRange) -> StoreResult<Option<String>>;

    /// Remove a sorted-set member; returns true if this call removed it
    async fn zrem(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Sorted-set cardinality
    async fn zcard(&self, key: &str) -> StoreResult<usize>;

    /// Score of a sorted-set member
    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>>;

    /// Set a string value that expires after `ttl`
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Read a string value (None if missing or expired)
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Delete a key of any type; returns true if it existed
    async fn del(&self, key: &str) -> StoreResult<bool>;

    /// Check that the store is reachable
    async fn ping(&self) -> StoreResult<()>;
}

/// Thread-safe shared store handle
pub type SharedStore = Arc<dyn CoordinationStore>;

/// Create a shared in-memory store
pub fn create_memory_store() -> SharedStore {
    Arc::new(MemoryStore::new())
}

/// Create a shared Redis store
pub async fn create_redis_store(config: &crate::config::StoreConfig) -> StoreResult<SharedStore> {
    let store = RedisStore::new(config).await?;
    Ok(Arc::new(store))
}

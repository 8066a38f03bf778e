//! Redis-backed coordination store
//!
//! Connections come from a `deadpool-redis` pool; every trait method maps to
//! exactly one Redis command.
//!
//! # Example
//!
//! ```rust,ignore
//! use swarmcrawl::config::StoreConfig;
//! use swarmcrawl::store::{CoordinationStore, RedisStore};
//!
//! let store = RedisStore::new(&StoreConfig::default()).await?;
//! store.lpush("swarmcrawl:url_queue", "https://example.com/").await?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use ::redis::AsyncCommands;
use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};

use super::{CoordinationStore, ScoreRange, StoreResult};
use crate::config::StoreConfig;
use crate::utils::error::StoreError;

/// Redis coordination store
pub struct RedisStore {
    /// Connection pool
    pool: Pool,

    /// Redis URL, kept for logging
    url: String,
}

impl RedisStore {
    /// Connect to Redis and verify the connection with `PING`
    pub async fn new(config: &StoreConfig) -> StoreResult<Self> {
        let pool_config = PoolConfig::from_url(&config.url);
        let pool = pool_config
            .builder()
            .map_err(|e| StoreError::Pool(format!("Failed to create pool builder: {e}")))?
            .max_size(config.pool_size)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| StoreError::Pool(format!("Failed to create Redis pool: {e}")))?;

        let store = Self {
            pool,
            url: config.url.clone(),
        };
        store.ping().await?;

        tracing::info!(url = %store.url, "Connected to coordination store");

        Ok(store)
    }

    async fn conn(&self) -> StoreResult<Connection> {
        Ok(self.pool.get().await?)
    }

    fn bound(value: Option<f64>, inclusive: bool, unbounded: &str) -> String {
        match value {
            Some(v) if inclusive => v.to_string(),
            Some(v) => format!("({v}"),
            None => unbounded.to_string(),
        }
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.lpush(key, value).await?;
        Ok(())
    }

    async fn rpop(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.rpop(key, None).await?)
    }

    async fn llen(&self, key: &str) -> StoreResult<usize> {
        let mut conn = self.conn().await?;
        Ok(conn.llen(key).await?)
    }

    async fn lrange_all(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.lrange(key, 0, -1).await?)
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let added: i64 = conn.sadd(key, member).await?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.srem(key, member).await?;
        Ok(removed > 0)
    }

    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.sismember(key, member).await?)
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn().await?;
        let mut members: Vec<String> = conn.smembers(key).await?;
        members.sort();
        Ok(members)
    }

    async fn scard(&self, key: &str) -> StoreResult<usize> {
        let mut conn = self.conn().await?;
        Ok(conn.scard(key).await?)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hset_multiple(&self, key: &str, fields: &[(&str, &str)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let _: () = conn.hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.hget(key, field).await?)
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn().await?;
        Ok(conn.hgetall(key).await?)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.zadd(key, member, score).await?;
        Ok(())
    }

    async fn zfirst_in_range(&self, key: &str, range: ScoreRange) -> StoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        let min = Self::bound(range.min, true, "-inf");
        let max = Self::bound(range.max, false, "+inf");
        let members: Vec<String> = conn.zrangebyscore_limit(key, min, max, 0, 1).await?;
        Ok(members.into_iter().next())
    }

    async fn zrem(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.zrem(key, member).await?;
        Ok(removed > 0)
    }

    async fn zcard(&self, key: &str) -> StoreResult<usize> {
        let mut conn = self.conn().await?;
        Ok(conn.zcard(key).await?)
    }

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        let mut conn = self.conn().await?;
        Ok(conn.zscore(key, member).await?)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let millis = ttl.as_millis().max(1) as u64;
        let _: () = ::redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis)
            .query_async(&mut *conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.get(key).await?)
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let _: String = ::redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(())
    }
}

//! Test fixtures for integration tests
//!
//! Provides a scripted fetcher, a recording store, sample wiki HTML and
//! cluster builders

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use swarmcrawl::cluster::Cluster;
use swarmcrawl::config::{DistributionConfig, PriorityRuleConfig};
use swarmcrawl::crawler::Fetcher;
use swarmcrawl::distribution::Strategy;
use swarmcrawl::error::{FetchError, StoreError};
use swarmcrawl::models::{FetchedPage, WorkerId};
use swarmcrawl::storage::MockPageStore;
use swarmcrawl::store::{
    create_memory_store, CoordinationStore, Keyspace, MemoryStore, ScoreRange, SharedStore,
    StoreResult,
};
use swarmcrawl::worker::{Worker, WorkerSettings};

pub const BASE: &str = "https://stardewvalleywiki.com";

/// Sample wiki page with two in-site links and one external link
pub const SAMPLE_WIKI_HTML: &str = r#"
<!DOCTYPE html>
<html>
<head><title>Emily</title></head>
<body>
    <div id="mw-content-text">
        <p>Emily is a villager who lives in Pelican Town.</p>
        <ul>
            <li>Birthday: Spring 27</li>
            <li>Loves: <a href="/Amethyst">Amethyst</a></li>
        </ul>
        <p>Her sister is <a href="https://stardewvalleywiki.com/Haley">Haley</a>.</p>
        <p><a href="https://example.org/elsewhere">External</a></p>
    </div>
</body>
</html>
"#;

pub fn url(page: &str) -> String {
    format!("{BASE}/{page}")
}

/// Scripted outcome for one URL
#[derive(Clone)]
pub enum Script {
    Page { text: String, links: Vec<String> },
    Timeout,
    Status(u16),
}

/// Fetcher that answers from a script and records every call
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, text: &str, links: &[&str]) -> Self {
        self.script.lock().unwrap().insert(
            url.to_string(),
            Script::Page {
                text: text.to_string(),
                links: links.iter().map(|l| l.to_string()).collect(),
            },
        );
        self
    }

    pub fn timeout(self, url: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(url.to_string(), Script::Timeout);
        self
    }

    pub fn status(self, url: &str, code: u16) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(url.to_string(), Script::Status(code));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let script = self.script.lock().unwrap().get(url).cloned();
        match script {
            Some(Script::Page { text, links }) => Ok(FetchedPage::new(text, links)),
            Some(Script::Timeout) => Err(FetchError::Timeout),
            Some(Script::Status(code)) => Err(FetchError::Status(code)),
            None => Err(FetchError::Status(404)),
        }
    }
}

/// Distribution config with the rules used across tests
pub fn distribution(strategy: &str) -> DistributionConfig {
    DistributionConfig {
        strategy: strategy.to_string(),
        priority_rules: vec![
            PriorityRuleConfig {
                rank: 1,
                patterns: vec!["/User_talk".to_string()],
            },
            PriorityRuleConfig {
                rank: 2,
                patterns: vec!["/Emily".to_string()],
            },
        ],
        ..DistributionConfig::default()
    }
}

/// Cluster over a fresh in-memory store
pub fn cluster(strategy: &str) -> Cluster {
    cluster_on(create_memory_store(), strategy)
}

/// Cluster over an existing store (several workers sharing one store)
pub fn cluster_on(store: SharedStore, strategy: &str) -> Cluster {
    Cluster::new(
        store,
        Keyspace::default(),
        Strategy::from_config(&distribution(strategy)).unwrap(),
        Duration::from_secs(30),
    )
}

/// Worker with no pauses between ticks
pub fn worker(
    cluster: Cluster,
    fetcher: Arc<ScriptedFetcher>,
    pages: Arc<MockPageStore>,
    number: u64,
) -> Worker {
    Worker::new(
        WorkerId::new(format!("test-worker-{number}"), number),
        cluster,
        fetcher,
        pages,
        WorkerSettings {
            sleep_interval: Duration::from_millis(1),
            idle_backoff: Duration::from_millis(5),
            max_jitter: Duration::from_millis(1),
        },
    )
}

/// In-memory store that records hash writes and can fail one key on demand
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    writes: Mutex<Vec<(String, String, String)>>,
    broken: Mutex<Option<(String, bool)>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail every command on `key` until [`repair`](Self::repair)
    pub fn break_key(&self, key: &str) {
        *self.broken.lock().unwrap() = Some((key.to_string(), false));
    }

    /// Fail only writes to `key`; reads keep working
    pub fn break_writes(&self, key: &str) {
        *self.broken.lock().unwrap() = Some((key.to_string(), true));
    }

    pub fn repair(&self) {
        *self.broken.lock().unwrap() = None;
    }

    /// Values written to `field` of hash `key`, in order
    pub fn hash_writes(&self, key: &str, field: &str) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, f, _)| k == key && f == field)
            .map(|(_, _, v)| v.clone())
            .collect()
    }

    fn check(&self, key: &str) -> StoreResult<()> {
        match &*self.broken.lock().unwrap() {
            Some((broken, false)) if broken == key => {
                Err(StoreError::Pool(format!("{key} unavailable")))
            }
            _ => Ok(()),
        }
    }

    fn check_write(&self, key: &str) -> StoreResult<()> {
        match &*self.broken.lock().unwrap() {
            Some((broken, _)) if broken == key => {
                Err(StoreError::Pool(format!("{key} rejected write")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CoordinationStore for RecordingStore {
    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check_write(key)?;
        self.inner.lpush(key, value).await
    }

    async fn rpop(&self, key: &str) -> StoreResult<Option<String>> {
        self.check_write(key)?;
        self.inner.rpop(key).await
    }

    async fn llen(&self, key: &str) -> StoreResult<usize> {
        self.check(key)?;
        self.inner.llen(key).await
    }

    async fn lrange_all(&self, key: &str) -> StoreResult<Vec<String>> {
        self.check(key)?;
        self.inner.lrange_all(key).await
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.check_write(key)?;
        self.inner.sadd(key, member).await
    }

    async fn srem(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.check_write(key)?;
        self.inner.srem(key, member).await
    }

    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.check(key)?;
        self.inner.sismember(key, member).await
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.check(key)?;
        self.inner.smembers(key).await
    }

    async fn scard(&self, key: &str) -> StoreResult<usize> {
        self.check(key)?;
        self.inner.scard(key).await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.check_write(key)?;
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), field.to_string(), value.to_string()));
        self.inner.hset(key, field, value).await
    }

    async fn hset_multiple(&self, key: &str, fields: &[(&str, &str)]) -> StoreResult<()> {
        self.check_write(key)?;
        self.inner.hset_multiple(key, fields).await
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.check(key)?;
        self.inner.hget(key, field).await
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.check(key)?;
        self.inner.hgetall(key).await
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        self.check_write(key)?;
        self.inner.zadd(key, member, score).await
    }

    async fn zfirst_in_range(&self, key: &str, range: ScoreRange) -> StoreResult<Option<String>> {
        self.check(key)?;
        self.inner.zfirst_in_range(key, range).await
    }

    async fn zrem(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.check_write(key)?;
        self.inner.zrem(key, member).await
    }

    async fn zcard(&self, key: &str) -> StoreResult<usize> {
        self.check(key)?;
        self.inner.zcard(key).await
    }

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        self.check(key)?;
        self.inner.zscore(key, member).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.check_write(key)?;
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        self.check_write(key)?;
        self.inner.del(key).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

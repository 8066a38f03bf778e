//! Configuration management for the swarmcrawl crawler
//!
//! Configuration is static for the lifetime of a process. It is loaded from a
//! TOML file (or defaults), then overridden by `SWARMCRAWL_*` environment
//! variables, then validated. An invalid distribution setup is a fatal
//! startup error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Coordination store configuration
    pub store: StoreConfig,

    /// Page store configuration
    pub page_store: PageStoreConfig,

    /// Crawler configuration
    pub crawler: CrawlerConfig,

    /// URL distribution configuration
    pub distribution: DistributionConfig,

    /// Worker liveness configuration
    pub liveness: LivenessConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Coordination store (Redis) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Redis URL (e.g., redis://127.0.0.1:6379/0)
    pub url: String,

    /// Connection pool size
    pub pool_size: usize,

    /// Key prefix for namespacing
    pub key_prefix: String,
}

/// Page store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageStoreConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Crawler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// URLs pushed by `seed`
    pub seed_urls: Vec<String>,

    /// Origin that defines in-site links
    pub base_url: String,

    /// CSS selector of the element holding the page text
    pub content_selector: String,

    /// User agent string sent with every request
    pub user_agent: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Pause between two tasks in milliseconds
    pub sleep_interval_ms: u64,

    /// Pause when no work is available in milliseconds
    pub idle_backoff_ms: u64,
}

/// One row of the priority table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityRuleConfig {
    /// Priority rank (lower is served first)
    pub rank: u32,

    /// Regular expressions searched anywhere in the URL
    pub patterns: Vec<String>,
}

/// URL distribution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Strategy name: fifo, priority or round_robin
    pub strategy: String,

    /// Number of round-robin shards
    pub node_count: u32,

    /// Number of machine pools splitting the priority range
    pub machine_count: u32,

    /// Index of this machine's pool (0 serves the low-priority band)
    pub machine_index: u32,

    /// Score that splits the priority range between pools
    pub priority_threshold: u32,

    /// Rank given to URLs matching no rule
    pub default_priority: u32,

    /// Ordered priority table
    pub priority_rules: Vec<PriorityRuleConfig>,
}

/// Worker liveness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Lifetime of a heartbeat record in seconds
    pub heartbeat_ttl_secs: u64,

    /// Age after which the monitor reports a heartbeat as unresponsive
    pub stale_after_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::from("redis://127.0.0.1:6379/0"),
            pool_size: 4,
            key_prefix: String::from("swarmcrawl"),
        }
    }
}

impl Default for PageStoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/pages.db"),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seed_urls: Vec::new(),
            base_url: String::from("https://stardewvalleywiki.com"),
            content_selector: String::from("#mw-content-text"),
            user_agent: String::from("Mozilla/5.0"),
            request_timeout_secs: 10,
            sleep_interval_ms: 1000,
            idle_backoff_ms: 5000,
        }
    }
}

impl CrawlerConfig {
    /// Per-request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            strategy: String::from("fifo"),
            node_count: 2,
            machine_count: 1,
            machine_index: 0,
            priority_threshold: 4,
            default_priority: 10,
            priority_rules: Vec::new(),
        }
    }
}

impl DistributionConfig {
    /// Build the runtime strategy described by this section
    pub fn strategy(&self) -> crate::error::Result<crate::distribution::Strategy> {
        crate::distribution::Strategy::from_config(self)
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            heartbeat_ttl_secs: 30,
            stale_after_secs: 20,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from defaults and environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from an optional file, apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let mut config = Self::from_file(path)?;
                config.apply_env();
                config
            }
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `SWARMCRAWL_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("SWARMCRAWL_REDIS_URL").or_else(|_| std::env::var("REDIS_URL")) {
            self.store.url = url;
        }
        if let Some(size) = env_parse("SWARMCRAWL_REDIS_POOL_SIZE") {
            self.store.pool_size = size;
        }
        if let Ok(prefix) = std::env::var("SWARMCRAWL_KEY_PREFIX") {
            self.store.key_prefix = prefix;
        }
        if let Ok(path) = std::env::var("SWARMCRAWL_SQLITE_PATH") {
            self.page_store.sqlite_path = PathBuf::from(path);
        }
        if let Ok(seeds) = std::env::var("SWARMCRAWL_SEED_URLS") {
            self.crawler.seed_urls = seeds
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(base) = std::env::var("SWARMCRAWL_BASE_URL") {
            self.crawler.base_url = base;
        }
        if let Ok(agent) = std::env::var("SWARMCRAWL_USER_AGENT") {
            self.crawler.user_agent = agent;
        }
        if let Some(secs) = env_parse("SWARMCRAWL_REQUEST_TIMEOUT") {
            self.crawler.request_timeout_secs = secs;
        }
        if let Some(ms) = env_parse("SWARMCRAWL_SLEEP_MS") {
            self.crawler.sleep_interval_ms = ms;
        }
        if let Ok(strategy) = std::env::var("SWARMCRAWL_STRATEGY") {
            self.distribution.strategy = strategy;
        }
        if let Some(count) = env_parse("SWARMCRAWL_NODE_COUNT") {
            self.distribution.node_count = count;
        }
        if let Some(count) = env_parse("SWARMCRAWL_MACHINE_COUNT") {
            self.distribution.machine_count = count;
        }
        if let Some(index) = env_parse("SWARMCRAWL_MACHINE_INDEX") {
            self.distribution.machine_index = index;
        }
        if let Some(threshold) = env_parse("SWARMCRAWL_PRIORITY_THRESHOLD") {
            self.distribution.priority_threshold = threshold;
        }
        if let Some(ttl) = env_parse("SWARMCRAWL_HEARTBEAT_TTL") {
            self.liveness.heartbeat_ttl_secs = ttl;
        }
        if let Ok(level) = std::env::var("SWARMCRAWL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SWARMCRAWL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Validate configuration values
    ///
    /// The distribution strategy itself is checked here too, so an unknown
    /// strategy name fails before any worker starts.
    pub fn validate(&self) -> Result<()> {
        if self.store.pool_size == 0 {
            anyhow::bail!("store.pool_size must be greater than 0");
        }

        if self.crawler.request_timeout_secs == 0 {
            anyhow::bail!("crawler.request_timeout_secs must be greater than 0");
        }

        crate::utils::extract_origin(&self.crawler.base_url)
            .with_context(|| format!("crawler.base_url is not a URL: {}", self.crawler.base_url))?;

        if self.liveness.heartbeat_ttl_secs == 0 {
            anyhow::bail!("liveness.heartbeat_ttl_secs must be greater than 0");
        }

        self.distribution
            .strategy()
            .context("Invalid distribution configuration")?;

        Ok(())
    }

    /// Pause between tasks
    #[must_use]
    pub fn sleep_interval(&self) -> Duration {
        Duration::from_millis(self.crawler.sleep_interval_ms)
    }

    /// Pause when idle
    #[must_use]
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.crawler.idle_backoff_ms)
    }

    /// Heartbeat record lifetime
    #[must_use]
    pub fn heartbeat_ttl(&self) -> Duration {
        Duration::from_secs(self.liveness.heartbeat_ttl_secs)
    }

    /// Age after which a heartbeat counts as unresponsive
    #[must_use]
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.liveness.stale_after_secs)
    }
}

//! Page store abstraction
//!
//! Crawled page text is persisted behind [`PageStore`] so the worker loop
//! never depends on a concrete database.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               Worker loop                │
//! └──────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌──────────────────────────────────────────┐
//! │             PageStore trait              │
//! └──────────────────────────────────────────┘
//!              │                   │
//!              ▼                   ▼
//! ┌─────────────────────┐ ┌─────────────────────┐
//! │       SQLite        │ │        Mock         │
//! │   Implementation    │ │   Implementation    │
//! └─────────────────────┘ └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use swarmcrawl::storage::{PageStore, SqlitePageStore, MockPageStore};
//!
//! // Production: use SQLite
//! let pages = SqlitePageStore::new("data/pages.db")?;
//!
//! // Testing: use Mock
//! let mock = MockPageStore::new();
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

// ============================================================================
// Core Types
// ============================================================================

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpsertOutcome {
    /// The page was inserted or replaced
    Stored,
    /// The text was blank and nothing was written
    SkippedEmpty,
}

/// A stored page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredPage {
    pub url: String,
    pub text: String,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Repository Trait
// ============================================================================

/// Persistent page text keyed by URL
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Insert or replace the text of a page
    ///
    /// Blank text is never written.
    async fn upsert(&self, url: &str, text: &str) -> Result<UpsertOutcome>;

    /// Number of stored pages
    async fn count(&self) -> Result<usize>;

    /// Stored page for a URL
    async fn get(&self, url: &str) -> Result<Option<StoredPage>>;
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of PageStore
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqlitePageStore {
    conn: Mutex<Connection>,
}

impl SqlitePageStore {
    /// Open (or create) a page database
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;

        // WAL lets the monitor read while workers write
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite page store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection mutex poisoned"))
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS pages (
                    url TEXT PRIMARY KEY,
                    text TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            "#,
        )
        .context("Failed to create page schema")?;
        Ok(())
    }
}

#[async_trait]
impl PageStore for SqlitePageStore {
    async fn upsert(&self, url: &str, text: &str) -> Result<UpsertOutcome> {
        if is_blank(text) {
            tracing::warn!(url = %url, "Skipping page with empty text");
            return Ok(UpsertOutcome::SkippedEmpty);
        }

        let conn = self.lock()?;
        conn.execute(
            r#"
                INSERT INTO pages (url, text, updated_at) VALUES (?1, ?2, ?3)
                ON CONFLICT(url) DO UPDATE SET text = excluded.text, updated_at = excluded.updated_at
            "#,
            params![url, text, Utc::now().to_rfc3339()],
        )
        .with_context(|| format!("Failed to upsert page {url}"))?;

        Ok(UpsertOutcome::Stored)
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))
            .context("Failed to count pages")?;
        Ok(count as usize)
    }

    async fn get(&self, url: &str) -> Result<Option<StoredPage>> {
        let conn = self.lock()?;
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT url, text, updated_at FROM pages WHERE url = ?1",
                params![url],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .context("Failed to read page")?;

        row.map(|(url, text, updated_at)| {
            let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                .with_context(|| format!("Invalid timestamp for {url}"))?
                .with_timezone(&Utc);
            Ok(StoredPage {
                url,
                text,
                updated_at,
            })
        })
        .transpose()
    }
}

// ============================================================================
// Mock Implementation
// ============================================================================

/// In-memory mock implementation of PageStore
///
/// Useful for testing without database dependencies.
#[derive(Default)]
pub struct MockPageStore {
    pages: RwLock<HashMap<String, StoredPage>>,
}

impl MockPageStore {
    /// Create a new mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of pages
    pub fn len(&self) -> usize {
        self.pages.read().map(|p| p.len()).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored URLs, sorted
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .pages
            .read()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        urls.sort();
        urls
    }
}

#[async_trait]
impl PageStore for MockPageStore {
    async fn upsert(&self, url: &str, text: &str) -> Result<UpsertOutcome> {
        if is_blank(text) {
            tracing::warn!(url = %url, "Skipping page with empty text");
            return Ok(UpsertOutcome::SkippedEmpty);
        }

        let mut pages = self
            .pages
            .write()
            .map_err(|_| anyhow!("Mock page store lock poisoned"))?;
        pages.insert(
            url.to_string(),
            StoredPage {
                url: url.to_string(),
                text: text.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(UpsertOutcome::Stored)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.len())
    }

    async fn get(&self, url: &str) -> Result<Option<StoredPage>> {
        let pages = self
            .pages
            .read()
            .map_err(|_| anyhow!("Mock page store lock poisoned"))?;
        Ok(pages.get(url).cloned())
    }
}

// ============================================================================
// Shared Repository Types
// ============================================================================

/// Thread-safe shared page store
pub type SharedPageStore = Arc<dyn PageStore>;

/// Create a shared SQLite page store
pub fn create_sqlite_page_store(path: impl AsRef<Path>) -> Result<SharedPageStore> {
    let store = SqlitePageStore::new(path)?;
    Ok(Arc::new(store))
}

/// Create a shared mock page store
pub fn create_mock_page_store() -> SharedPageStore {
    Arc::new(MockPageStore::new())
}

// ============================================================================
// Tests
// ============================================================================

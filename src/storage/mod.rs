//! Page persistence
//!
//! SQLite holds the text of every crawled page, keyed by URL.

pub mod repository;

pub use repository::{
    create_mock_page_store, create_sqlite_page_store, MockPageStore, PageStore, SharedPageStore,
    SqlitePageStore, StoredPage, UpsertOutcome,
};

//! Core data structures shared across modules

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque identity of one worker process
///
/// The textual form is what gets stored in the coordination store. The
/// numeric part (the process id by default) selects the round-robin shard a
/// worker serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId {
    name: String,
    number: u64,
}

impl WorkerId {
    /// Create an id from an explicit name and shard-selection number
    pub fn new(name: impl Into<String>, number: u64) -> Self {
        Self {
            name: name.into(),
            number,
        }
    }

    /// Id of the current process: `<hostname>-<pid>`
    pub fn from_process() -> Self {
        let pid = u64::from(std::process::id());
        let host = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "worker".to_string());
        Self::new(format!("{host}-{pid}"), pid)
    }

    /// Parse an operator-supplied id
    ///
    /// The number is the trailing run of digits (`crawler-7` → 7), or a stable
    /// digest of the name when there is none.
    pub fn parse(id: &str) -> Self {
        let digits: String = id
            .chars()
            .rev()
            .take_while(char::is_ascii_digit)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        let number = digits
            .parse::<u64>()
            .unwrap_or_else(|_| crate::distribution::shard::stable_hash(id));
        Self::new(id, number)
    }

    /// The textual id
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The shard-selection number
    pub fn number(&self) -> u64 {
        self.number
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Result of a successful fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedPage {
    /// Extracted page text
    pub text: String,

    /// In-site links discovered on the page
    pub links: BTreeSet<String>,
}

impl FetchedPage {
    /// Create a page result
    pub fn new(text: impl Into<String>, links: impl IntoIterator<Item = String>) -> Self {
        Self {
            text: text.into(),
            links: links.into_iter().collect(),
        }
    }
}

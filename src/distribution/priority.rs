//! Priority ranking and machine partitioning
//!
//! URLs are ranked by the first rule (in ascending rank order) with a
//! pattern matching anywhere in the URL. Lower ranks are served first; URLs
//! matching nothing get the default rank and are served last.

use regex::Regex;

use crate::config::DistributionConfig;
use crate::error::{Error, Result};
use crate::store::ScoreRange;

/// One compiled rank rule
#[derive(Debug, Clone)]
struct PriorityRule {
    rank: u32,
    patterns: Vec<Regex>,
}

/// Ordered rank table
#[derive(Debug, Clone)]
pub struct PriorityRules {
    rules: Vec<PriorityRule>,
    default_rank: u32,
}

impl PriorityRules {
    /// Compile rules from `(rank, patterns)` pairs
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a pattern is not a valid regex.
    pub fn new<I, P, S>(rules: I, default_rank: u32) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, P)>,
        P: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for (rank, patterns) in rules {
            let patterns = patterns
                .into_iter()
                .map(|p| {
                    Regex::new(p.as_ref()).map_err(|e| {
                        Error::config(format!("Invalid priority pattern '{}': {e}", p.as_ref()))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            compiled.push(PriorityRule { rank, patterns });
        }

        // Stable sort keeps config order among equal ranks
        compiled.sort_by_key(|r| r.rank);

        Ok(Self {
            rules: compiled,
            default_rank,
        })
    }

    /// Build the table from the distribution section of the config
    pub fn from_config(config: &DistributionConfig) -> Result<Self> {
        Self::new(
            config
                .priority_rules
                .iter()
                .map(|r| (r.rank, r.patterns.iter())),
            config.default_priority,
        )
    }

    /// Rank of a URL
    pub fn priority(&self, url: &str) -> u32 {
        self.rules
            .iter()
            .find(|rule| rule.patterns.iter().any(|p| p.is_match(url)))
            .map_or(self.default_rank, |rule| rule.rank)
    }

    /// Rank given to URLs that match no rule
    pub fn default_rank(&self) -> u32 {
        self.default_rank
    }

    /// Number of configured rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are configured
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Split of the priority queue between machine pools
///
/// Machine 0 serves scores at or above the threshold; every other machine
/// serves scores below it. A single machine serves everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachinePartition {
    pub machine_count: u32,
    pub machine_index: u32,
    pub threshold: u32,
}

impl Default for MachinePartition {
    fn default() -> Self {
        Self {
            machine_count: 1,
            machine_index: 0,
            threshold: 4,
        }
    }
}

impl MachinePartition {
    /// Validated partition
    pub fn new(machine_count: u32, machine_index: u32, threshold: u32) -> Result<Self> {
        if machine_count == 0 {
            return Err(Error::config("distribution.machine_count must be at least 1"));
        }
        if machine_index >= machine_count {
            return Err(Error::config(format!(
                "distribution.machine_index {machine_index} out of range for {machine_count} machines"
            )));
        }
        Ok(Self {
            machine_count,
            machine_index,
            threshold,
        })
    }

    /// Score band this machine takes from
    pub fn band(&self) -> ScoreRange {
        if self.machine_count <= 1 {
            ScoreRange::unbounded()
        } else if self.machine_index == 0 {
            ScoreRange::at_least(f64::from(self.threshold))
        } else {
            ScoreRange::below(f64::from(self.threshold))
        }
    }
}

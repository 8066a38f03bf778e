//! Handles on every shared structure, bound to one store and keyspace

use std::time::Duration;

use crate::config::Config;
use crate::distribution::{DistributionPolicy, Strategy};
use crate::error::Result;
use crate::failures::FailureQueue;
use crate::frontier::Frontier;
use crate::liveness::LivenessRegistry;
use crate::status::StatusTracker;
use crate::store::{Keyspace, SharedStore};

/// Frontier, status, liveness and failure handles sharing one store
#[derive(Clone)]
pub struct Cluster {
    pub store: SharedStore,
    pub keys: Keyspace,
    pub frontier: Frontier,
    pub status: StatusTracker,
    pub liveness: LivenessRegistry,
    pub failures: FailureQueue,
}

impl Cluster {
    pub fn new(store: SharedStore, keys: Keyspace, strategy: Strategy, heartbeat_ttl: Duration) -> Self {
        let policy = DistributionPolicy::new(store.clone(), keys.clone(), strategy);
        Self {
            frontier: Frontier::new(store.clone(), &keys, policy),
            status: StatusTracker::new(store.clone(), &keys),
            liveness: LivenessRegistry::new(store.clone(), keys.clone(), heartbeat_ttl),
            failures: FailureQueue::new(store.clone(), &keys),
            store,
            keys,
        }
    }

    /// Build from configuration; fails on an invalid distribution section
    pub fn from_config(store: SharedStore, config: &Config) -> Result<Self> {
        Ok(Self::new(
            store,
            Keyspace::new(config.store.key_prefix.clone()),
            config.distribution.strategy()?,
            config.heartbeat_ttl(),
        ))
    }
}

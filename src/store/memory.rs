//! In-process coordination store
//!
//! Implements the same single-command semantics as Redis behind one mutex.
//! Used by tests and by single-process runs; it cannot coordinate separate
//! worker processes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{CoordinationStore, ScoreRange, StoreResult};
use crate::utils::error::StoreError;

#[derive(Debug, Clone)]
enum Value {
    Str {
        value: String,
        expires_at: Option<Instant>,
    },
    List(VecDeque<String>),
    Set(HashSet<String>),
    Hash(HashMap<String, String>),
    ZSet(HashMap<String, f64>),
}

impl Value {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self, Value::Str { expires_at: Some(at), .. } if *at <= now)
    }
}

/// In-memory store with Redis-like semantics
pub struct MemoryStore {
    data: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|v| !v.is_expired(now)).count()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every key
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        // A poisoned lock only means another test thread panicked mid-command.
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` on the value at `key`, dropping it first if expired
    fn with_entry<T>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&mut Value>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut data = self.lock();
        purge_expired(&mut data, key);
        let result = f(data.get_mut(key));

        // Redis deletes empty aggregates
        let empty = match data.get(key) {
            Some(Value::List(l)) => l.is_empty(),
            Some(Value::Set(s)) => s.is_empty(),
            Some(Value::Hash(h)) => h.is_empty(),
            Some(Value::ZSet(z)) => z.is_empty(),
            _ => false,
        };
        if empty {
            data.remove(key);
        }
        result
    }

    fn with_list<T>(
        &self,
        key: &str,
        create: bool,
        f: impl FnOnce(&mut VecDeque<String>) -> T,
    ) -> StoreResult<Option<T>> {
        let mut data = self.lock();
        purge_expired(&mut data, key);
        if create && !data.contains_key(key) {
            data.insert(key.to_string(), Value::List(VecDeque::new()));
        }
        let result = match data.get_mut(key) {
            Some(Value::List(list)) => Ok(Some(f(list))),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => Ok(None),
        };
        if matches!(data.get(key), Some(Value::List(l)) if l.is_empty()) {
            data.remove(key);
        }
        result
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType(key.to_string())
}

fn purge_expired(data: &mut HashMap<String, Value>, key: &str) {
    if data.get(key).is_some_and(|v| v.is_expired(Instant::now())) {
        data.remove(key);
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()> {
        self.with_list(key, true, |list| list.push_front(value.to_string()))?;
        Ok(())
    }

    async fn rpop(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.with_list(key, false, |list| list.pop_back())?.flatten())
    }

    async fn llen(&self, key: &str) -> StoreResult<usize> {
        Ok(self.with_list(key, false, |list| list.len())?.unwrap_or(0))
    }

    async fn lrange_all(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .with_list(key, false, |list| list.iter().cloned().collect())?
            .unwrap_or_default())
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut data = self.lock();
        purge_expired(&mut data, key);
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(HashSet::new()));
        match entry {
            Value::Set(set) => Ok(set.insert(member.to_string())),
            _ => Err(wrong_type(key)),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.with_entry(key, |value| match value {
            Some(Value::Set(set)) => Ok(set.remove(member)),
            Some(_) => Err(wrong_type(key)),
            None => Ok(false),
        })
    }

    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.with_entry(key, |value| match value {
            Some(Value::Set(set)) => Ok(set.contains(member)),
            Some(_) => Err(wrong_type(key)),
            None => Ok(false),
        })
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.with_entry(key, |value| match value {
            Some(Value::Set(set)) => {
                let mut members: Vec<String> = set.iter().cloned().collect();
                members.sort();
                Ok(members)
            }
            Some(_) => Err(wrong_type(key)),
            None => Ok(Vec::new()),
        })
    }

    async fn scard(&self, key: &str) -> StoreResult<usize> {
        self.with_entry(key, |value| match value {
            Some(Value::Set(set)) => Ok(set.len()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(0),
        })
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.hset_multiple(key, &[(field, value)]).await
    }

    async fn hset_multiple(&self, key: &str, fields: &[(&str, &str)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut data = self.lock();
        purge_expired(&mut data, key);
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(HashMap::new()));
        match entry {
            Value::Hash(hash) => {
                for (field, value) in fields {
                    hash.insert((*field).to_string(), (*value).to_string());
                }
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.with_entry(key, |value| match value {
            Some(Value::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        })
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.with_entry(key, |value| match value {
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(HashMap::new()),
        })
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        let mut data = self.lock();
        purge_expired(&mut data, key);
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Value::ZSet(HashMap::new()));
        match entry {
            Value::ZSet(zset) => {
                zset.insert(member.to_string(), score);
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn zfirst_in_range(&self, key: &str, range: ScoreRange) -> StoreResult<Option<String>> {
        self.with_entry(key, |value| match value {
            Some(Value::ZSet(zset)) => Ok(zset
                .iter()
                .filter(|(_, score)| range.contains(**score))
                .min_by(|(a_member, a_score), (b_member, b_score)| {
                    a_score
                        .total_cmp(b_score)
                        .then_with(|| a_member.cmp(b_member))
                })
                .map(|(member, _)| member.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        })
    }

    async fn zrem(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.with_entry(key, |value| match value {
            Some(Value::ZSet(zset)) => Ok(zset.remove(member).is_some()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(false),
        })
    }

    async fn zcard(&self, key: &str) -> StoreResult<usize> {
        self.with_entry(key, |value| match value {
            Some(Value::ZSet(zset)) => Ok(zset.len()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(0),
        })
    }

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        self.with_entry(key, |value| match value {
            Some(Value::ZSet(zset)) => Ok(zset.get(member).copied()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        })
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.lock().insert(
            key.to_string(),
            Value::Str {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_entry(key, |value| match value {
            Some(Value::Str { value, .. }) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        })
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        let mut data = self.lock();
        let existed = data
            .remove(key)
            .is_some_and(|v| !v.is_expired(Instant::now()));
        Ok(existed)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

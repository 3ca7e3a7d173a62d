// Copyright © 2026 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::pattern::glob_match;
use crate::cache::store::{CacheStore, ScanPage, StoreKind};
use crate::cache::OpContext;
use crate::types::{CoreError, Result};

#[derive(Debug, Default)]
struct StoreState {
    values: HashMap<String, String>,
    expirations: HashMap<String, Instant>,
    hashes: HashMap<String, HashMap<String, String>>,
}

impl StoreState {
    fn is_expired(&self, key: &str, now: Instant) -> bool {
        self.expirations.get(key).is_some_and(|at| now >= *at)
    }

    fn contains_live(&self, key: &str, now: Instant) -> bool {
        (self.values.contains_key(key) || self.hashes.contains_key(key))
            && !self.is_expired(key, now)
    }

    fn remove(&mut self, key: &str) -> bool {
        let had_value = self.values.remove(key).is_some();
        let had_hash = self.hashes.remove(key).is_some();
        self.expirations.remove(key);
        had_value || had_hash
    }

    /// Drops `key` if its expiration has passed; returns whether it did.
    fn purge_if_expired(&mut self, key: &str, now: Instant) -> bool {
        let purged = self.is_expired(key, now) && self.remove(key);
        if purged {
            debug!(key = key, "Purged expired key");
        }
        purged
    }

    fn set_expiration(&mut self, key: &str, deadline: Option<Instant>) {
        match deadline {
            Some(at) => {
                self.expirations.insert(key.to_string(), at);
            }
            None => {
                self.expirations.remove(key);
            }
        }
    }
}

/// Expiration instant for `ttl`, `None` when the key should never expire.
/// A TTL past the clock's range is rejected the way Redis rejects it.
fn deadline(ttl: Duration, now: Instant) -> Result<Option<Instant>> {
    if ttl.is_zero() {
        return Ok(None);
    }
    now.checked_add(ttl)
        .map(Some)
        .ok_or_else(|| CoreError::InvalidValue("invalid expire time".to_string()))
}

/// In-process store used when Redis is unreachable at startup.
///
/// One read-write lock covers the scalar map, the expiration map and the hash
/// namespace. Expired keys are purged lazily by the next operation that
/// touches them; there is no background sweep.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held, expired-but-unpurged ones included.
    pub fn len(&self) -> usize {
        let state = self.state.read();
        state.values.len() + state.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_if_expired(&self, key: &str) {
        // A writer may have replaced the key since the read lock was dropped.
        self.state.write().purge_if_expired(key, Instant::now());
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, _ctx: &OpContext, key: &str) -> Result<Option<String>> {
        {
            let state = self.state.read();
            let now = Instant::now();
            if !state.is_expired(key, now) {
                if let Some(value) = state.values.get(key) {
                    return Ok(Some(value.clone()));
                }
                if state.hashes.contains_key(key) {
                    return Err(CoreError::WrongType(key.to_string()));
                }
                return Ok(None);
            }
        }

        self.purge_if_expired(key);
        Ok(None)
    }

    async fn set(&self, _ctx: &OpContext, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let expires_at = deadline(ttl, now)?;

        let mut state = self.state.write();
        state.hashes.remove(key);
        state.values.insert(key.to_string(), value.to_string());
        state.set_expiration(key, expires_at);
        Ok(())
    }

    async fn del(&self, _ctx: &OpContext, keys: &[String]) -> Result<u64> {
        let mut state = self.state.write();
        let now = Instant::now();
        let mut deleted = 0;
        for key in keys {
            let live = state.contains_live(key, now);
            state.remove(key);
            if live {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn scan(
        &self,
        _ctx: &OpContext,
        cursor: u64,
        pattern: &str,
        _count: u64,
    ) -> Result<ScanPage> {
        // Every match is returned on the first page, so no other cursor is ever issued.
        if cursor != 0 {
            return Ok(ScanPage::default());
        }

        let state = self.state.read();
        let now = Instant::now();
        let mut keys: Vec<String> = state
            .values
            .keys()
            .chain(state.hashes.keys())
            .filter(|key| !state.is_expired(key, now) && glob_match(pattern, key))
            .cloned()
            .collect();
        keys.sort_unstable();
        keys.dedup();

        Ok(ScanPage { keys, cursor: 0 })
    }

    async fn set_nx(
        &self,
        _ctx: &OpContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool> {
        let now = Instant::now();
        let expires_at = deadline(ttl, now)?;

        let mut state = self.state.write();
        if state.contains_live(key, now) {
            return Ok(false);
        }

        state.remove(key);
        state.values.insert(key.to_string(), value.to_string());
        state.set_expiration(key, expires_at);
        Ok(true)
    }

    async fn hincr_by(&self, _ctx: &OpContext, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut state = self.state.write();
        state.purge_if_expired(key, Instant::now());

        if state.values.contains_key(key) {
            return Err(CoreError::WrongType(key.to_string()));
        }

        let hash = state.hashes.entry(key.to_string()).or_default();
        let current = match hash.get(field) {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                CoreError::InvalidValue(format!("hash field '{}' is not an integer", field))
            })?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| CoreError::InvalidValue("increment would overflow".to_string()))?;

        hash.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    async fn hget_all(&self, _ctx: &OpContext, key: &str) -> Result<HashMap<String, String>> {
        {
            let state = self.state.read();
            let now = Instant::now();
            if !state.is_expired(key, now) {
                if let Some(hash) = state.hashes.get(key) {
                    return Ok(hash.clone());
                }
                if state.values.contains_key(key) {
                    return Err(CoreError::WrongType(key.to_string()));
                }
                return Ok(HashMap::new());
            }
        }

        self.purge_if_expired(key);
        Ok(HashMap::new())
    }

    async fn expire(&self, _ctx: &OpContext, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let expires_at = deadline(ttl, now)?;

        let mut state = self.state.write();
        if !state.contains_live(key, now) {
            state.purge_if_expired(key, now);
            return Ok(false);
        }

        match expires_at {
            Some(at) => {
                state.expirations.insert(key.to_string(), at);
            }
            None => {
                state.remove(key);
            }
        }
        Ok(true)
    }

    async fn ping(&self, _ctx: &OpContext) -> Result<()> {
        Ok(())
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }
}

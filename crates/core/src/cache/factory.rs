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

use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{Cache, MemoryStore, RedisStore};
use crate::config::{BackendPreference, CacheConfig, Config, RedisConfig};

/// 后端选择状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    Uninitialized,
    ProbingRemote,
    RemoteActive,
    FallbackActive,
}

impl SelectorState {
    pub fn is_selected(&self) -> bool {
        matches!(self, SelectorState::RemoteActive | SelectorState::FallbackActive)
    }
}

/// Picks the backing store once per process.
///
/// The first [`CacheFactory::build`] probes Redis. If the probe fails the
/// in-process store is used for the rest of the factory's life; there is no
/// reconnect.
pub struct CacheFactory {
    redis: RedisConfig,
    cache: CacheConfig,
    state: SelectorState,
    selected: Option<Cache>,
}

impl CacheFactory {
    pub fn new(config: &Config) -> Self {
        Self::from_parts(config.redis.clone(), config.cache.clone())
    }

    pub fn from_parts(redis: RedisConfig, cache: CacheConfig) -> Self {
        Self {
            redis,
            cache,
            state: SelectorState::Uninitialized,
            selected: None,
        }
    }

    pub fn state(&self) -> SelectorState {
        self.state
    }

    /// Returns the selected cache, probing Redis on the first call.
    pub async fn build(&mut self) -> Cache {
        if let Some(cache) = &self.selected {
            return cache.clone();
        }

        let cache = match self.cache.backend {
            BackendPreference::Memory => {
                info!("In-memory cache backend configured, skipping Redis probe");
                self.state = SelectorState::FallbackActive;
                Cache::new(Arc::new(MemoryStore::new()))
            }
            BackendPreference::Redis => self.probe().await,
        }
        .with_scan_count(self.cache.scan_count);

        self.selected = Some(cache.clone());
        cache
    }

    async fn probe(&mut self) -> Cache {
        self.state = SelectorState::ProbingRemote;

        match RedisStore::connect(&self.redis).await {
            Ok(store) => {
                info!(addr = %self.redis.addr, db = self.redis.db, "Using Redis cache backend");
                self.state = SelectorState::RemoteActive;
                Cache::new(Arc::new(store))
            }
            Err(e) => {
                warn!(
                    addr = %self.redis.addr,
                    error = %e,
                    "Redis unavailable, falling back to in-memory cache; \
                     state will not be shared across instances"
                );
                self.state = SelectorState::FallbackActive;
                Cache::new(Arc::new(MemoryStore::new()))
            }
        }
    }
}

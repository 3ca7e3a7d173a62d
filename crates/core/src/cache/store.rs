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
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::cache::OpContext;
use crate::types::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Redis,
    Memory,
}

impl StoreKind {
    /// Whether every replica of the backend sees the same keys.
    pub fn is_shared(&self) -> bool {
        matches!(self, StoreKind::Redis)
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Redis => write!(f, "redis"),
            StoreKind::Memory => write!(f, "memory"),
        }
    }
}

/// One page of a cursor-based scan. A `cursor` of zero ends the iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub keys: Vec<String>,
    pub cursor: u64,
}

impl ScanPage {
    pub fn is_last(&self) -> bool {
        self.cursor == 0
    }
}

/// Primitive commands every backing store provides.
///
/// A `ttl` of [`Duration::ZERO`] on `set`/`set_nx` means "never expires".
/// Composite operations (get-or-set, locks, prefix eviction) live in
/// [`crate::cache::primitives`] and are written once against this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, ctx: &OpContext, key: &str) -> Result<Option<String>>;

    async fn set(&self, ctx: &OpContext, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Returns how many of `keys` existed.
    async fn del(&self, ctx: &OpContext, keys: &[String]) -> Result<u64>;

    async fn scan(&self, ctx: &OpContext, cursor: u64, pattern: &str, count: u64)
        -> Result<ScanPage>;

    /// Sets `key` only when it is absent or expired; returns whether it did.
    async fn set_nx(&self, ctx: &OpContext, key: &str, value: &str, ttl: Duration)
        -> Result<bool>;

    async fn hincr_by(&self, ctx: &OpContext, key: &str, field: &str, delta: i64) -> Result<i64>;

    async fn hget_all(&self, ctx: &OpContext, key: &str) -> Result<HashMap<String, String>>;

    /// Replaces the expiration of an existing key; returns whether it existed.
    async fn expire(&self, ctx: &OpContext, key: &str, ttl: Duration) -> Result<bool>;

    async fn ping(&self, ctx: &OpContext) -> Result<()>;

    fn kind(&self) -> StoreKind;
}

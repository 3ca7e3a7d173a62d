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

use futures::FutureExt;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::cache::primitives;
use crate::cache::store::{CacheStore, ScanPage, StoreKind};
use crate::cache::{MemoryStore, OpContext};
use crate::types::Result;

const DEFAULT_SCAN_COUNT: u64 = 100;

/// Upper bound for lock release when the caller's context has no deadline.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle every caller uses to reach the cache.
///
/// Cloning is cheap and all clones share one backing store. Which store that
/// is gets decided once by [`crate::cache::CacheFactory`]; callers never branch
/// on it.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    scan_count: u64,
    metrics: Arc<CacheMetrics>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("kind", &self.store.kind())
            .field("scan_count", &self.scan_count)
            .finish()
    }
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            scan_count: DEFAULT_SCAN_COUNT,
            metrics: Arc::new(CacheMetrics::default()),
        }
    }

    /// A cache backed by a fresh in-process store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// COUNT hint used by [`Cache::delete_keys_with_prefix`].
    pub fn with_scan_count(mut self, scan_count: u64) -> Self {
        self.scan_count = scan_count.max(1);
        self
    }

    pub fn kind(&self) -> StoreKind {
        self.store.kind()
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            total_requests: self.metrics.total_requests.load(Ordering::Relaxed),
            hits: self.metrics.hits.load(Ordering::Relaxed),
            misses: self.metrics.misses.load(Ordering::Relaxed),
            errors: self.metrics.errors.load(Ordering::Relaxed),
        }
    }

    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        self.metrics.total_requests.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.metrics.errors.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    pub async fn get(&self, ctx: &OpContext, key: &str) -> Result<Option<String>> {
        let result = self.observe(self.store.get(ctx, key).await);
        if let Ok(value) = &result {
            let counter = if value.is_some() {
                &self.metrics.hits
            } else {
                &self.metrics.misses
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Stores the `Display` form of `value`. A zero `ttl` never expires.
    pub async fn set(
        &self,
        ctx: &OpContext,
        key: &str,
        value: impl Display,
        ttl: Duration,
    ) -> Result<()> {
        let value = value.to_string();
        self.observe(self.store.set(ctx, key, &value, ttl).await)
    }

    pub async fn del<K: AsRef<str>>(&self, ctx: &OpContext, keys: &[K]) -> Result<u64> {
        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        self.observe(self.store.del(ctx, &keys).await)
    }

    pub async fn scan(
        &self,
        ctx: &OpContext,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<ScanPage> {
        self.observe(self.store.scan(ctx, cursor, pattern, count).await)
    }

    pub async fn set_nx(
        &self,
        ctx: &OpContext,
        key: &str,
        value: impl Display,
        ttl: Duration,
    ) -> Result<bool> {
        let value = value.to_string();
        self.observe(self.store.set_nx(ctx, key, &value, ttl).await)
    }

    pub async fn get_or_set(
        &self,
        ctx: &OpContext,
        key: &str,
        value: impl Display,
        ttl: Duration,
    ) -> Result<String> {
        let value = value.to_string();
        self.observe(primitives::get_or_set(self.store.as_ref(), ctx, key, &value, ttl).await)
    }

    /// Evicts every key starting with `prefix`; returns how many were deleted.
    pub async fn delete_keys_with_prefix(&self, ctx: &OpContext, prefix: &str) -> Result<u64> {
        self.observe(
            primitives::delete_keys_with_prefix(self.store.as_ref(), ctx, prefix, self.scan_count)
                .await,
        )
    }

    pub async fn acquire_lock(&self, ctx: &OpContext, key: &str) -> Result<bool> {
        self.observe(primitives::acquire_lock(self.store.as_ref(), ctx, key).await)
    }

    pub async fn release_lock(&self, ctx: &OpContext, key: &str) -> Result<bool> {
        self.observe(primitives::release_lock(self.store.as_ref(), ctx, key).await)
    }

    pub async fn hincr_by(&self, ctx: &OpContext, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.observe(self.store.hincr_by(ctx, key, field, delta).await)
    }

    pub async fn hget_all(&self, ctx: &OpContext, key: &str) -> Result<HashMap<String, String>> {
        self.observe(self.store.hget_all(ctx, key).await)
    }

    pub async fn expire(&self, ctx: &OpContext, key: &str, ttl: Duration) -> Result<bool> {
        self.observe(self.store.expire(ctx, key, ttl).await)
    }

    pub async fn ping(&self, ctx: &OpContext) -> Result<()> {
        self.observe(self.store.ping(ctx).await)
    }

    /// Runs `work` while holding the lock for `key`.
    ///
    /// Returns `Ok(None)` without running `work` when the lock is taken. The
    /// lock is released after `work` returns or panics; a panic is resumed
    /// once the release has been attempted. If the returned future is dropped
    /// mid-flight the token stays until its lease runs out.
    pub async fn with_lock<F, T>(&self, ctx: &OpContext, key: &str, work: F) -> Result<Option<T>>
    where
        F: Future<Output = T>,
    {
        if !self.acquire_lock(ctx, key).await? {
            return Ok(None);
        }

        let outcome = AssertUnwindSafe(work).catch_unwind().await;

        if let Err(e) = self.release_lock(&release_context(ctx), key).await {
            warn!(
                key = key,
                error = %e,
                "Failed to release lock, it will expire with its lease"
            );
        }

        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Takes the lock for `key` and hands back a guard that releases it.
    pub async fn try_lock(&self, ctx: &OpContext, key: &str) -> Result<Option<LockGuard>> {
        if !self.acquire_lock(ctx, key).await? {
            return Ok(None);
        }

        Ok(Some(LockGuard {
            cache: self.clone(),
            key: key.to_string(),
            release_timeout: ctx.deadline().unwrap_or(RELEASE_TIMEOUT),
            released: false,
        }))
    }
}

/// Release must still happen when the caller's context was cancelled.
fn release_context(ctx: &OpContext) -> OpContext {
    OpContext::with_timeout(ctx.deadline().unwrap_or(RELEASE_TIMEOUT))
}

/// Held advisory lock.
///
/// Prefer [`LockGuard::release`]. Dropping an unreleased guard spawns the
/// release onto the current tokio runtime; without a runtime the token is left
/// to expire.
#[derive(Debug)]
pub struct LockGuard {
    cache: Cache,
    key: String,
    release_timeout: Duration,
    released: bool,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn release(mut self) -> Result<bool> {
        self.released = true;
        let ctx = OpContext::with_timeout(self.release_timeout);
        self.cache.release_lock(&ctx, &self.key).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let cache = self.cache.clone();
        let key = std::mem::take(&mut self.key);
        let ctx = OpContext::with_timeout(self.release_timeout);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = cache.release_lock(&ctx, &key).await {
                        warn!(key = %key, error = %e, "Deferred lock release failed");
                    }
                });
            }
            Err(_) => {
                warn!(key = %key, "No runtime to release lock, leaving it to expire");
            }
        }
    }
}

#[derive(Debug, Default)]
struct CacheMetrics {
    total_requests: AtomicUsize,
    hits: AtomicUsize,
    misses: AtomicUsize,
    errors: AtomicUsize,
}

/// 缓存指标快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub total_requests: usize,
    pub hits: usize,
    pub misses: usize,
    pub errors: usize,
}

impl CacheMetricsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn error_rate(&self) -> f64 {
        let total = self.total_requests;
        if total == 0 {
            0.0
        } else {
            self.errors as f64 / total as f64
        }
    }
}
